use feedback_service::{
    models::{
        ListServiceFeedbackQuery, ListUiFeedbackQuery, NewServiceFeedback, NewUiFeedback,
        UiFeedbackCategory,
    },
    repository::{FeedbackRepository, PgFeedbackRepository},
};
use sqlx::{PgPool, postgres::PgPoolOptions};

async fn maybe_pool() -> Option<PgPool> {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;

    PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .ok()
}

#[tokio::test]
async fn postgres_repository_crud_flow() {
    let Some(pool) = maybe_pool().await else {
        eprintln!(
            "Skipping postgres_repository_crud_flow: TEST_DATABASE_URL/DATABASE_URL is not set or database is unreachable."
        );
        return;
    };

    let repo = PgFeedbackRepository::new(pool.clone());
    repo.init().await.expect("migrations should run");

    sqlx::query("TRUNCATE TABLE ui_feedback, service_feedback")
        .execute(&pool)
        .await
        .expect("truncate should succeed");

    let created = repo
        .create_ui(NewUiFeedback {
            category: UiFeedbackCategory::Bug,
            rating: 2,
            page: "/checkout".to_string(),
            message: "Pay button does nothing 100% of the time".to_string(),
            email: None,
            user_agent: Some("integration-test".to_string()),
        })
        .await
        .expect("create should succeed");

    let fetched = repo
        .get_ui(created.id)
        .await
        .expect("get should succeed")
        .expect("feedback should exist");
    assert_eq!(fetched.message, created.message);

    let listed = repo
        .list_ui(ListUiFeedbackQuery {
            category: Some(UiFeedbackCategory::Bug),
            search: Some("100%".to_string()),
            ..ListUiFeedbackQuery::default()
        })
        .await
        .expect("list should succeed");
    assert_eq!(listed.total, 1);

    repo.create_service(NewServiceFeedback {
        service_name: "Support".to_string(),
        overall_rating: 4,
        responsiveness_rating: 5,
        quality_rating: 4,
        would_recommend: true,
        comments: Some("Fast turnaround".to_string()),
        email: Some("a@b.io".to_string()),
    })
    .await
    .expect("create should succeed");

    let services = repo
        .list_service(ListServiceFeedbackQuery {
            service_name: Some("SUPPORT".to_string()),
            ..ListServiceFeedbackQuery::default()
        })
        .await
        .expect("list should succeed");
    assert_eq!(services.total, 1);

    let by_comment = repo
        .list_service(ListServiceFeedbackQuery {
            search: Some("TURNAROUND".to_string()),
            ..ListServiceFeedbackQuery::default()
        })
        .await
        .expect("list should succeed");
    assert_eq!(by_comment.total, 1);

    let summary = repo.summary().await.expect("summary should succeed");
    assert_eq!(summary.ui.total, 1);
    assert_eq!(summary.ui.average_rating, Some(2.0));
    assert_eq!(summary.service.would_recommend, 1);
}
