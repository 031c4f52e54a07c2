use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        create_service_feedback, create_ui_feedback, feedback_summary, get_service_feedback,
        get_ui_feedback, healthcheck, list_service_feedback, list_ui_feedback,
    },
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route(
            "/api/v1/feedback/ui",
            post(create_ui_feedback).get(list_ui_feedback),
        )
        .route("/api/v1/feedback/ui/:id", get(get_ui_feedback))
        .route(
            "/api/v1/feedback/service",
            post(create_service_feedback).get(list_service_feedback),
        )
        .route("/api/v1/feedback/service/:id", get(get_service_feedback))
        .route("/api/v1/feedback/summary", get(feedback_summary))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
