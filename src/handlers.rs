use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        ApiMessage, ApiResponse, CreateServiceFeedbackRequest, CreateUiFeedbackRequest,
        FeedbackSummary, ListServiceFeedbackQuery, ListUiFeedbackQuery, Page, ServiceFeedback,
        UiFeedback,
    },
    state::AppState,
    validation::{
        validate_service_feedback, validate_service_query, validate_ui_feedback,
        validate_ui_query,
    },
};

pub async fn healthcheck() -> Json<ApiResponse<ApiMessage>> {
    Json(ApiResponse {
        data: ApiMessage {
            message: "ok".to_string(),
        },
    })
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::invalid_field("body", rejection.body_text()))
}

fn query<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::invalid_field("query", rejection.body_text()))
}

fn path_id(path: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::invalid_field("id", "must be a valid UUID"))
}

pub async fn create_ui_feedback(
    State(state): State<AppState>,
    payload: Result<Json<CreateUiFeedbackRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<UiFeedback>>)> {
    let request = body(payload)?;
    let feedback = validate_ui_feedback(&request).map_err(AppError::validation)?;

    let created = state
        .retry
        .run(|| state.repo.create_ui(feedback.clone()))
        .await?;

    info!(id = %created.id, category = created.category.as_str(), "ui feedback stored");
    Ok((StatusCode::CREATED, Json(ApiResponse { data: created })))
}

pub async fn list_ui_feedback(
    State(state): State<AppState>,
    params: Result<Query<ListUiFeedbackQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<Page<UiFeedback>>>> {
    let params = query(params)?;
    validate_ui_query(&params).map_err(AppError::validation)?;

    let page = state
        .retry
        .run(|| state.repo.list_ui(params.clone()))
        .await?;

    Ok(Json(ApiResponse { data: page }))
}

pub async fn get_ui_feedback(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ApiResponse<UiFeedback>>> {
    let id = path_id(path)?;

    let feedback = state
        .retry
        .run(|| state.repo.get_ui(id))
        .await?
        .ok_or_else(|| AppError::not_found("ui feedback not found"))?;

    Ok(Json(ApiResponse { data: feedback }))
}

pub async fn create_service_feedback(
    State(state): State<AppState>,
    payload: Result<Json<CreateServiceFeedbackRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<ServiceFeedback>>)> {
    let request = body(payload)?;
    let feedback = validate_service_feedback(&request).map_err(AppError::validation)?;

    let created = state
        .retry
        .run(|| state.repo.create_service(feedback.clone()))
        .await?;

    info!(
        id = %created.id,
        service = %created.service_name,
        "service feedback stored"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse { data: created })))
}

pub async fn list_service_feedback(
    State(state): State<AppState>,
    params: Result<Query<ListServiceFeedbackQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<Page<ServiceFeedback>>>> {
    let params = query(params)?;
    validate_service_query(&params).map_err(AppError::validation)?;

    let page = state
        .retry
        .run(|| state.repo.list_service(params.clone()))
        .await?;

    Ok(Json(ApiResponse { data: page }))
}

pub async fn get_service_feedback(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ApiResponse<ServiceFeedback>>> {
    let id = path_id(path)?;

    let feedback = state
        .retry
        .run(|| state.repo.get_service(id))
        .await?
        .ok_or_else(|| AppError::not_found("service feedback not found"))?;

    Ok(Json(ApiResponse { data: feedback }))
}

pub async fn feedback_summary(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<FeedbackSummary>>> {
    let summary = state.retry.run(|| state.repo.summary()).await?;
    Ok(Json(ApiResponse { data: summary }))
}
