use super::common::{created_response, success_response, validate_input, PaginatedResponse, PaginationParams};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::work_orders::{
        AddComment, CommentView, CompleteWorkOrder, WorkOrderDetail, WorkOrderFilter, WorkOrderView,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

pub fn work_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_work_orders))
        .route("/:id", get(get_work_order))
        .route("/:id/start", post(start_work_order))
        .route("/:id/pause", post(pause_work_order))
        .route("/:id/complete", post(complete_work_order))
        .route("/:id/cancel", post(cancel_work_order))
        .route("/:id/comments", post(add_work_order_comment))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders",
    params(PaginationParams, WorkOrderFilter),
    responses(
        (status = 200, description = "List work orders",
            body = PaginatedResponse<WorkOrderView>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 404, description = "Unknown work center", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn list_work_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<WorkOrderFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (items, total) = state
        .services
        .work_orders
        .list(filter, page, per_page)
        .await?;
    Ok(success_response(PaginatedResponse::new(items, page, per_page, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}",
    params(("id" = Uuid, Path, description = "Work order ID")),
    responses(
        (status = 200, description = "Work order details", body = WorkOrderDetail,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn get_work_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.work_orders.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/start",
    params(("id" = Uuid, Path, description = "Work order ID")),
    responses(
        (status = 200, description = "Work order running", body = WorkOrderView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Wrong state or earlier operation still open", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn start_work_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.work_orders.start(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/pause",
    params(("id" = Uuid, Path, description = "Work order ID")),
    responses(
        (status = 200, description = "Work order paused", body = WorkOrderView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Work order is not running", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn pause_work_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.work_orders.pause(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/complete",
    params(("id" = Uuid, Path, description = "Work order ID")),
    request_body = CompleteWorkOrder,
    responses(
        (status = 200, description = "Work order completed", body = WorkOrderView),
        (status = 400, description = "Quality check missing or failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Work order is not running", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn complete_work_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<CompleteWorkOrder>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    validate_input(&payload)?;
    Ok(success_response(
        state.services.work_orders.complete(id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Work order ID")),
    responses(
        (status = 200, description = "Work order cancelled", body = WorkOrderView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Work order already finished", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn cancel_work_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.work_orders.cancel(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/comments",
    params(("id" = Uuid, Path, description = "Work order ID")),
    request_body = AddComment,
    responses(
        (status = 201, description = "Comment added", body = CommentView),
        (status = 400, description = "Empty comment", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn add_work_order_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddComment>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(
        state.services.work_orders.add_comment(id, payload).await?,
    ))
}
