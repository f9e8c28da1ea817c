use super::common::{created_response, success_response, validate_input, PaginatedResponse, PaginationParams};
use crate::{
    entities::manufacturing::work_center::WorkCenterStatus,
    errors::ApiError,
    handlers::AppState,
    services::work_centers::{CreateWorkCenter, UpdateWorkCenter, WorkCenterView},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub fn work_center_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_work_center).get(list_work_centers))
        .route("/:id", get(get_work_center).put(update_work_center))
        .route("/:id/status", put(update_work_center_status))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkCenterFilter {
    pub status: Option<WorkCenterStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateWorkCenterStatusRequest {
    pub status: WorkCenterStatus,
}

#[utoipa::path(
    post,
    path = "/api/v1/work-centers",
    request_body = CreateWorkCenter,
    responses(
        (status = 201, description = "Work center created", body = WorkCenterView),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "work-centers"
)]
pub async fn create_work_center(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkCenter>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(state.services.work_centers.create(payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-centers",
    params(PaginationParams, WorkCenterFilter),
    responses(
        (status = 200, description = "Paginated work centers", body = PaginatedResponse<WorkCenterView>)
    ),
    tag = "work-centers"
)]
pub async fn list_work_centers(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<WorkCenterFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (items, total) = state
        .services
        .work_centers
        .list(page, per_page, filter.status)
        .await?;
    Ok(success_response(PaginatedResponse::new(items, page, per_page, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-centers/{id}",
    params(("id" = Uuid, Path, description = "Work center ID")),
    responses(
        (status = 200, description = "Work center details", body = WorkCenterView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-centers"
)]
pub async fn get_work_center(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.work_centers.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/work-centers/{id}",
    params(("id" = Uuid, Path, description = "Work center ID")),
    request_body = UpdateWorkCenter,
    responses(
        (status = 200, description = "Work center updated", body = WorkCenterView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-centers"
)]
pub async fn update_work_center(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWorkCenter>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    Ok(success_response(
        state.services.work_centers.update(id, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/work-centers/{id}/status",
    params(("id" = Uuid, Path, description = "Work center ID")),
    request_body = UpdateWorkCenterStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = WorkCenterView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-centers"
)]
pub async fn update_work_center_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWorkCenterStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state
            .services
            .work_centers
            .update_status(id, payload.status)
            .await?,
    ))
}
