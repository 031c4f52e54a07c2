use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::StoreResult,
    models::{
        CategoryCount, FeedbackSummary, ListServiceFeedbackQuery, ListUiFeedbackQuery,
        NewServiceFeedback, NewUiFeedback, Page, ServiceFeedback, ServiceFeedbackSummary,
        SortOrder, UiFeedback, UiFeedbackCategory, UiFeedbackSummary,
    },
};

const UI_COLUMNS: &str = "id, category, rating, page, message, email, user_agent, created_at";
const SERVICE_COLUMNS: &str = "id, service_name, overall_rating, responsiveness_rating, \
     quality_rating, would_recommend, comments, email, created_at";

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn init(&self) -> StoreResult<()>;
    async fn create_ui(&self, feedback: NewUiFeedback) -> StoreResult<UiFeedback>;
    async fn list_ui(&self, query: ListUiFeedbackQuery) -> StoreResult<Page<UiFeedback>>;
    async fn get_ui(&self, id: Uuid) -> StoreResult<Option<UiFeedback>>;
    async fn create_service(&self, feedback: NewServiceFeedback) -> StoreResult<ServiceFeedback>;
    async fn list_service(
        &self,
        query: ListServiceFeedbackQuery,
    ) -> StoreResult<Page<ServiceFeedback>>;
    async fn get_service(&self, id: Uuid) -> StoreResult<Option<ServiceFeedback>>;
    async fn summary(&self) -> StoreResult<FeedbackSummary>;
}

#[derive(Clone)]
pub struct PgFeedbackRepository {
    pool: PgPool,
}

impl PgFeedbackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn sort_order(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, has_where: &mut bool) {
    if *has_where {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_where = true;
    }
}

fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_ui_filters<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    has_where: &mut bool,
    query: &'a ListUiFeedbackQuery,
) {
    if let Some(category) = query.category {
        push_clause(builder, has_where);
        builder.push("category = ").push_bind(category);
    }

    if let Some(min_rating) = query.min_rating {
        push_clause(builder, has_where);
        builder.push("rating >= ").push_bind(min_rating);
    }

    if let Some(max_rating) = query.max_rating {
        push_clause(builder, has_where);
        builder.push("rating <= ").push_bind(max_rating);
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        push_clause(builder, has_where);
        builder
            .push("(page ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR message ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(from) = query.from {
        push_clause(builder, has_where);
        builder.push("created_at >= ").push_bind(from);
    }

    if let Some(to) = query.to {
        push_clause(builder, has_where);
        builder.push("created_at <= ").push_bind(to);
    }
}

fn push_service_filters<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    has_where: &mut bool,
    query: &'a ListServiceFeedbackQuery,
) {
    if let Some(name) = query.service_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        push_clause(builder, has_where);
        builder
            .push("LOWER(service_name) = LOWER(")
            .push_bind(name)
            .push(")");
    }

    if let Some(would_recommend) = query.would_recommend {
        push_clause(builder, has_where);
        builder.push("would_recommend = ").push_bind(would_recommend);
    }

    if let Some(min_rating) = query.min_rating {
        push_clause(builder, has_where);
        builder.push("overall_rating >= ").push_bind(min_rating);
    }

    if let Some(max_rating) = query.max_rating {
        push_clause(builder, has_where);
        builder.push("overall_rating <= ").push_bind(max_rating);
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        push_clause(builder, has_where);
        builder
            .push("(service_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR COALESCE(comments, '') ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(from) = query.from {
        push_clause(builder, has_where);
        builder.push("created_at >= ").push_bind(from);
    }

    if let Some(to) = query.to {
        push_clause(builder, has_where);
        builder.push("created_at <= ").push_bind(to);
    }
}

fn offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(per_page)
}

#[async_trait]
impl FeedbackRepository for PgFeedbackRepository {
    async fn init(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn create_ui(&self, feedback: NewUiFeedback) -> StoreResult<UiFeedback> {
        let sql = format!(
            "INSERT INTO ui_feedback (id, category, rating, page, message, email, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {UI_COLUMNS}"
        );

        let created = sqlx::query_as::<_, UiFeedback>(&sql)
            .bind(Uuid::new_v4())
            .bind(feedback.category)
            .bind(feedback.rating)
            .bind(feedback.page)
            .bind(feedback.message)
            .bind(feedback.email)
            .bind(feedback.user_agent)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn list_ui(&self, query: ListUiFeedbackQuery) -> StoreResult<Page<UiFeedback>> {
        let mut count_builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*)::BIGINT FROM ui_feedback");
        let mut has_where = false;
        push_ui_filters(&mut count_builder, &mut has_where, &query);
        let (total,): (i64,) = count_builder.build_query_as().fetch_one(&self.pool).await?;

        let mut select_builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {UI_COLUMNS} FROM ui_feedback"));
        let mut has_where = false;
        push_ui_filters(&mut select_builder, &mut has_where, &query);
        select_builder
            .push(" ORDER BY created_at ")
            .push(sort_order(query.order))
            .push(", id ")
            .push(sort_order(query.order))
            .push(" LIMIT ")
            .push_bind(i64::from(query.per_page))
            .push(" OFFSET ")
            .push_bind(offset(query.page, query.per_page));

        let items = select_builder
            .build_query_as::<UiFeedback>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(
            items,
            query.page,
            query.per_page,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    async fn get_ui(&self, id: Uuid) -> StoreResult<Option<UiFeedback>> {
        let sql = format!("SELECT {UI_COLUMNS} FROM ui_feedback WHERE id = $1");
        let found = sqlx::query_as::<_, UiFeedback>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found)
    }

    async fn create_service(&self, feedback: NewServiceFeedback) -> StoreResult<ServiceFeedback> {
        let sql = format!(
            "INSERT INTO service_feedback (id, service_name, overall_rating, \
             responsiveness_rating, quality_rating, would_recommend, comments, email) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {SERVICE_COLUMNS}"
        );

        let created = sqlx::query_as::<_, ServiceFeedback>(&sql)
            .bind(Uuid::new_v4())
            .bind(feedback.service_name)
            .bind(feedback.overall_rating)
            .bind(feedback.responsiveness_rating)
            .bind(feedback.quality_rating)
            .bind(feedback.would_recommend)
            .bind(feedback.comments)
            .bind(feedback.email)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn list_service(
        &self,
        query: ListServiceFeedbackQuery,
    ) -> StoreResult<Page<ServiceFeedback>> {
        let mut count_builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*)::BIGINT FROM service_feedback");
        let mut has_where = false;
        push_service_filters(&mut count_builder, &mut has_where, &query);
        let (total,): (i64,) = count_builder.build_query_as().fetch_one(&self.pool).await?;

        let mut select_builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SERVICE_COLUMNS} FROM service_feedback"
        ));
        let mut has_where = false;
        push_service_filters(&mut select_builder, &mut has_where, &query);
        select_builder
            .push(" ORDER BY created_at ")
            .push(sort_order(query.order))
            .push(", id ")
            .push(sort_order(query.order))
            .push(" LIMIT ")
            .push_bind(i64::from(query.per_page))
            .push(" OFFSET ")
            .push_bind(offset(query.page, query.per_page));

        let items = select_builder
            .build_query_as::<ServiceFeedback>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(
            items,
            query.page,
            query.per_page,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    async fn get_service(&self, id: Uuid) -> StoreResult<Option<ServiceFeedback>> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM service_feedback WHERE id = $1");
        let found = sqlx::query_as::<_, ServiceFeedback>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found)
    }

    async fn summary(&self) -> StoreResult<FeedbackSummary> {
        let (ui_total, ui_average): (i64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*)::BIGINT, AVG(rating)::FLOAT8 FROM ui_feedback",
        )
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<(UiFeedbackCategory, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*)::BIGINT FROM ui_feedback GROUP BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        let (service_total, service_average, recommend): (i64, Option<f64>, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*)::BIGINT,
                    AVG(overall_rating)::FLOAT8,
                    (COUNT(*) FILTER (WHERE would_recommend))::BIGINT
                FROM service_feedback
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let counts = rows
            .into_iter()
            .map(|(category, count)| (category, u64::try_from(count).unwrap_or(0)))
            .collect::<HashMap<_, _>>();

        Ok(FeedbackSummary {
            ui: UiFeedbackSummary {
                total: u64::try_from(ui_total).unwrap_or(0),
                average_rating: ui_average,
                by_category: category_counts(&counts),
            },
            service: ServiceFeedbackSummary {
                total: u64::try_from(service_total).unwrap_or(0),
                average_overall_rating: service_average,
                would_recommend: u64::try_from(recommend).unwrap_or(0),
            },
        })
    }
}

/// Counts for every category in declaration order, zero-filled.
fn category_counts(counts: &HashMap<UiFeedbackCategory, u64>) -> Vec<CategoryCount> {
    UiFeedbackCategory::ALL
        .into_iter()
        .map(|category| CategoryCount {
            category,
            count: counts.get(&category).copied().unwrap_or(0),
        })
        .collect()
}

#[derive(Default)]
pub struct InMemoryFeedbackRepository {
    ui: RwLock<HashMap<Uuid, UiFeedback>>,
    service: RwLock<HashMap<Uuid, ServiceFeedback>>,
}

impl InMemoryFeedbackRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn normalized_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn paginate<T>(mut items: Vec<T>, page: u32, per_page: u32) -> Page<T> {
    let total = items.len() as u64;
    let start = (page.saturating_sub(1) as usize).saturating_mul(per_page as usize);
    let window = if start >= items.len() {
        Vec::new()
    } else {
        let end = start.saturating_add(per_page as usize).min(items.len());
        items.drain(start..end).collect()
    };
    Page::new(window, page, per_page, total)
}

fn by_created(order: SortOrder, a: (DateTime<Utc>, Uuid), b: (DateTime<Utc>, Uuid)) -> Ordering {
    let ord = a.cmp(&b);
    match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    }
}

fn filter_ui(items: Vec<UiFeedback>, query: &ListUiFeedbackQuery) -> Page<UiFeedback> {
    let search = normalized_search(query.search.as_deref());

    let mut filtered = items
        .into_iter()
        .filter(|item| query.category.is_none_or(|category| item.category == category))
        .filter(|item| query.min_rating.is_none_or(|min| item.rating >= min))
        .filter(|item| query.max_rating.is_none_or(|max| item.rating <= max))
        .filter(|item| query.from.is_none_or(|from| item.created_at >= from))
        .filter(|item| query.to.is_none_or(|to| item.created_at <= to))
        .filter(|item| {
            search.as_deref().is_none_or(|needle| {
                contains_ci(&item.page, needle) || contains_ci(&item.message, needle)
            })
        })
        .collect::<Vec<_>>();

    filtered.sort_by(|a, b| by_created(query.order, (a.created_at, a.id), (b.created_at, b.id)));
    paginate(filtered, query.page, query.per_page)
}

fn filter_service(
    items: Vec<ServiceFeedback>,
    query: &ListServiceFeedbackQuery,
) -> Page<ServiceFeedback> {
    let search = normalized_search(query.search.as_deref());
    let service_name = normalized_search(query.service_name.as_deref());

    let mut filtered = items
        .into_iter()
        .filter(|item| {
            service_name
                .as_deref()
                .is_none_or(|name| item.service_name.to_lowercase() == name)
        })
        .filter(|item| {
            query
                .would_recommend
                .is_none_or(|recommend| item.would_recommend == recommend)
        })
        .filter(|item| query.min_rating.is_none_or(|min| item.overall_rating >= min))
        .filter(|item| query.max_rating.is_none_or(|max| item.overall_rating <= max))
        .filter(|item| query.from.is_none_or(|from| item.created_at >= from))
        .filter(|item| query.to.is_none_or(|to| item.created_at <= to))
        .filter(|item| {
            search.as_deref().is_none_or(|needle| {
                contains_ci(&item.service_name, needle)
                    || item
                        .comments
                        .as_deref()
                        .is_some_and(|comments| contains_ci(comments, needle))
            })
        })
        .collect::<Vec<_>>();

    filtered.sort_by(|a, b| by_created(query.order, (a.created_at, a.id), (b.created_at, b.id)));
    paginate(filtered, query.page, query.per_page)
}

fn average(values: impl Iterator<Item = i16>) -> Option<f64> {
    let (sum, count) = values.fold((0i64, 0u64), |(sum, count), value| {
        (sum + i64::from(value), count + 1)
    });
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn init(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_ui(&self, feedback: NewUiFeedback) -> StoreResult<UiFeedback> {
        let record = UiFeedback {
            id: Uuid::new_v4(),
            category: feedback.category,
            rating: feedback.rating,
            page: feedback.page,
            message: feedback.message,
            email: feedback.email,
            user_agent: feedback.user_agent,
            created_at: Utc::now(),
        };

        self.ui.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_ui(&self, query: ListUiFeedbackQuery) -> StoreResult<Page<UiFeedback>> {
        let items = self.ui.read().await.values().cloned().collect::<Vec<_>>();
        Ok(filter_ui(items, &query))
    }

    async fn get_ui(&self, id: Uuid) -> StoreResult<Option<UiFeedback>> {
        Ok(self.ui.read().await.get(&id).cloned())
    }

    async fn create_service(&self, feedback: NewServiceFeedback) -> StoreResult<ServiceFeedback> {
        let record = ServiceFeedback {
            id: Uuid::new_v4(),
            service_name: feedback.service_name,
            overall_rating: feedback.overall_rating,
            responsiveness_rating: feedback.responsiveness_rating,
            quality_rating: feedback.quality_rating,
            would_recommend: feedback.would_recommend,
            comments: feedback.comments,
            email: feedback.email,
            created_at: Utc::now(),
        };

        self.service.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_service(
        &self,
        query: ListServiceFeedbackQuery,
    ) -> StoreResult<Page<ServiceFeedback>> {
        let items = self.service.read().await.values().cloned().collect::<Vec<_>>();
        Ok(filter_service(items, &query))
    }

    async fn get_service(&self, id: Uuid) -> StoreResult<Option<ServiceFeedback>> {
        Ok(self.service.read().await.get(&id).cloned())
    }

    async fn summary(&self) -> StoreResult<FeedbackSummary> {
        let ui = self.ui.read().await;
        let service = self.service.read().await;

        let mut counts = HashMap::new();
        for item in ui.values() {
            *counts.entry(item.category).or_insert(0u64) += 1;
        }

        Ok(FeedbackSummary {
            ui: UiFeedbackSummary {
                total: ui.len() as u64,
                average_rating: average(ui.values().map(|item| item.rating)),
                by_category: category_counts(&counts),
            },
            service: ServiceFeedbackSummary {
                total: service.len() as u64,
                average_overall_rating: average(service.values().map(|item| item.overall_rating)),
                would_recommend: service.values().filter(|item| item.would_recommend).count()
                    as u64,
            },
        })
    }
}
