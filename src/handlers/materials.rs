use super::common::{created_response, success_response, validate_input, PaginatedResponse, PaginationParams};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::materials::{AdjustStock, CreateMaterial, MaterialView, UpdateMaterial},
    services::stock_ledger::{LowStockAlert, StockTransactionResult},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

/// Creates the router for material endpoints
pub fn material_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_material).get(list_materials))
        .route("/low-stock", get(low_stock_materials))
        .route("/:id", get(get_material).put(update_material))
        .route("/:id/adjust", post(adjust_stock))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MaterialSearch {
    /// Matches code or name
    pub search: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/materials",
    request_body = CreateMaterial,
    responses(
        (status = 201, description = "Material created", body = MaterialView),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn create_material(
    State(state): State<AppState>,
    Json(payload): Json<CreateMaterial>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let material = state.services.materials.create(payload).await?;
    info!(material_id = %material.id, "Material created via API");
    Ok(created_response(material))
}

#[utoipa::path(
    get,
    path = "/api/v1/materials",
    params(PaginationParams, MaterialSearch),
    responses(
        (status = 200, description = "Paginated materials", body = PaginatedResponse<MaterialView>)
    ),
    tag = "materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(search): Query<MaterialSearch>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (items, total) = state
        .services
        .materials
        .list(page, per_page, search.search)
        .await?;
    Ok(success_response(PaginatedResponse::new(items, page, per_page, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/materials/{id}",
    params(("id" = Uuid, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Material details", body = MaterialView),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.materials.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/materials/{id}",
    params(("id" = Uuid, Path, description = "Material ID")),
    request_body = UpdateMaterial,
    responses(
        (status = 200, description = "Material updated", body = MaterialView),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn update_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMaterial>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    Ok(success_response(state.services.materials.update(id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/materials/{id}/adjust",
    params(("id" = Uuid, Path, description = "Material ID")),
    request_body = AdjustStock,
    responses(
        (status = 200, description = "Stock adjusted", body = StockTransactionResult),
        (status = 400, description = "Zero delta", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough available stock", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustStock>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    Ok(success_response(state.services.materials.adjust(id, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/materials/low-stock",
    responses(
        (status = 200, description = "Materials at or below reorder level", body = [LowStockAlert])
    ),
    tag = "materials"
)]
pub async fn low_stock_materials(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.stock_ledger.low_stock().await?))
}
