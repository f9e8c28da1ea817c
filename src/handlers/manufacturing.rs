use super::common::{created_response, success_response, validate_input, PaginatedResponse, PaginationParams};
use crate::{
    entities::manufacturing::manufacturing_order::MoStatus,
    errors::ApiError,
    handlers::AppState,
    services::manufacturing::{
        CreateManufacturingOrder, ManufacturingOrderDetail, ManufacturingOrderFilter,
        ManufacturingOrderView, ManufacturingStats,
    },
    services::work_orders::WorkOrderView,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for manufacturing order endpoints
pub fn manufacturing_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_manufacturing_order).get(list_manufacturing_orders))
        .route("/stats", get(manufacturing_stats))
        .route("/:id", get(get_manufacturing_order))
        .route("/:id/work-orders", post(generate_work_orders))
        .route("/:id/reserve", post(reserve_materials))
        .route("/:id/complete", post(complete_manufacturing_order))
        .route("/:id/status", put(update_manufacturing_order_status))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: MoStatus,
}

#[utoipa::path(
    post,
    path = "/api/v1/manufacturing-orders",
    request_body = CreateManufacturingOrder,
    responses(
        (status = 201, description = "Draft order created", body = ManufacturingOrderDetail),
        (status = 400, description = "Invalid quantity or dates", body = crate::errors::ErrorResponse),
        (status = 404, description = "BOM not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "BOM is not active", body = crate::errors::ErrorResponse)
    ),
    tag = "manufacturing-orders"
)]
pub async fn create_manufacturing_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateManufacturingOrder>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let order = state.services.manufacturing.create_from_bom(payload).await?;
    info!(mo_id = %order.order.id, reference = %order.order.reference, "Manufacturing order created via API");
    Ok(created_response(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/manufacturing-orders",
    params(PaginationParams, ManufacturingOrderFilter),
    responses(
        (status = 200, description = "Paginated manufacturing orders", body = PaginatedResponse<ManufacturingOrderView>)
    ),
    tag = "manufacturing-orders"
)]
pub async fn list_manufacturing_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ManufacturingOrderFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (items, total) = state
        .services
        .manufacturing
        .list(filter, page, per_page)
        .await?;
    Ok(success_response(PaginatedResponse::new(items, page, per_page, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/manufacturing-orders/stats",
    responses(
        (status = 200, description = "Order counts, overdue orders and mean progress", body = ManufacturingStats)
    ),
    tag = "manufacturing-orders"
)]
pub async fn manufacturing_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.manufacturing.stats().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/manufacturing-orders/{id}",
    params(("id" = Uuid, Path, description = "Manufacturing order ID")),
    responses(
        (status = 200, description = "Order with components and work orders", body = ManufacturingOrderDetail),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "manufacturing-orders"
)]
pub async fn get_manufacturing_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.manufacturing.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/manufacturing-orders/{id}/work-orders",
    params(("id" = Uuid, Path, description = "Manufacturing order ID")),
    responses(
        (status = 201, description = "Work orders generated from the routing", body = [WorkOrderView]),
        (status = 400, description = "BOM has no operations", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order closed or work orders already exist", body = crate::errors::ErrorResponse)
    ),
    tag = "manufacturing-orders"
)]
pub async fn generate_work_orders(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(created_response(
        state.services.manufacturing.generate_work_orders(id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/manufacturing-orders/{id}/reserve",
    params(("id" = Uuid, Path, description = "Manufacturing order ID")),
    responses(
        (status = 200, description = "All components reserved", body = ManufacturingOrderView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already reserved or closed", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock; nothing was reserved", body = crate::errors::ErrorResponse)
    ),
    tag = "manufacturing-orders"
)]
pub async fn reserve_materials(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.manufacturing.reserve_materials(id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/manufacturing-orders/{id}/complete",
    params(("id" = Uuid, Path, description = "Manufacturing order ID")),
    responses(
        (status = 200, description = "Order done; components consumed and product received", body = ManufacturingOrderView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Work orders open or materials not reserved", body = crate::errors::ErrorResponse)
    ),
    tag = "manufacturing-orders"
)]
pub async fn complete_manufacturing_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.manufacturing.complete(id).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/manufacturing-orders/{id}/status",
    params(("id" = Uuid, Path, description = "Manufacturing order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ManufacturingOrderView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "manufacturing-orders"
)]
pub async fn update_manufacturing_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state
            .services
            .manufacturing
            .update_status(id, payload.status)
            .await?,
    ))
}
