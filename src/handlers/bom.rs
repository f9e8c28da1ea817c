use super::common::{created_response, success_response, validate_input, PaginatedResponse, PaginationParams};
use crate::{
    entities::manufacturing::bom::BomStatus,
    errors::ApiError,
    handlers::AppState,
    services::billofmaterials::{BomDetail, BomSummary, CreateBomInput},
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

/// Creates the router for BOM endpoints
pub fn bom_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_bom).get(list_boms))
        .route("/:id", get(get_bom))
        .route("/:id/approve", post(approve_bom))
        .route("/:id/obsolete", post(obsolete_bom))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BomFilter {
    pub product_id: Option<Uuid>,
    pub status: Option<BomStatus>,
}

/// Create a new Draft BOM revision
#[utoipa::path(
    post,
    path = "/api/v1/boms",
    request_body = CreateBomInput,
    responses(
        (status = 201, description = "BOM created", body = BomDetail),
        (status = 400, description = "Invalid components or routing", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product, material or work center", body = crate::errors::ErrorResponse)
    ),
    tag = "boms"
)]
pub async fn create_bom(
    State(state): State<AppState>,
    Json(payload): Json<CreateBomInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let bom = state.services.bill_of_materials.create_bom(payload).await?;
    info!(bom_id = %bom.bom.id, version = bom.bom.version, "BOM created");
    Ok(created_response(bom))
}

#[utoipa::path(
    get,
    path = "/api/v1/boms",
    params(PaginationParams, BomFilter),
    responses(
        (status = 200, description = "Paginated BOMs", body = PaginatedResponse<BomSummary>)
    ),
    tag = "boms"
)]
pub async fn list_boms(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<BomFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (items, total) = state
        .services
        .bill_of_materials
        .list_boms(page, per_page, filter.product_id, filter.status)
        .await?;
    Ok(success_response(PaginatedResponse::new(items, page, per_page, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/boms/{id}",
    params(("id" = Uuid, Path, description = "BOM ID")),
    responses(
        (status = 200, description = "BOM with components and operations", body = BomDetail),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "boms"
)]
pub async fn get_bom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.bill_of_materials.get_bom(id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/boms/{id}/approve",
    params(("id" = Uuid, Path, description = "BOM ID")),
    responses(
        (status = 200, description = "BOM is now active", body = BomSummary),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Not a draft, or product already has an active BOM", body = crate::errors::ErrorResponse)
    ),
    tag = "boms"
)]
pub async fn approve_bom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.bill_of_materials.approve(id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/boms/{id}/obsolete",
    params(("id" = Uuid, Path, description = "BOM ID")),
    responses(
        (status = 200, description = "BOM retired", body = BomSummary),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "BOM is not active", body = crate::errors::ErrorResponse)
    ),
    tag = "boms"
)]
pub async fn obsolete_bom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.bill_of_materials.mark_obsolete(id).await?,
    ))
}
