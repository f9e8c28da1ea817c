use super::common::{created_response, success_response, validate_input, PaginatedResponse, PaginationParams};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::stock_ledger::{
        BalanceReport, LedgerEntryView, LedgerFilter, LowStockAlert, ReconciliationReport,
        StockMovement, StockTransactionResult,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use uuid::Uuid;

pub fn stock_ledger_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_entries).post(record_transaction))
        .route("/low-stock", get(low_stock))
        .route("/reconcile", get(reconcile))
        .route("/materials/:id", get(list_material_entries))
        .route("/materials/:id/balance", get(material_balance))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock-ledger",
    params(PaginationParams, LedgerFilter),
    responses(
        (status = 200, description = "Ledger entries in append order", body = PaginatedResponse<LedgerEntryView>)
    ),
    tag = "stock-ledger"
)]
pub async fn list_entries(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<LedgerFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (items, total) = state
        .services
        .stock_ledger
        .list(filter, page, per_page)
        .await?;
    Ok(success_response(PaginatedResponse::new(items, page, per_page, total)))
}

/// Apply a single stock movement
#[utoipa::path(
    post,
    path = "/api/v1/stock-ledger",
    request_body = StockMovement,
    responses(
        (status = 201, description = "Movement applied and recorded", body = StockTransactionResult),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Release exceeds reservation or update raced", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough available stock", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-ledger"
)]
pub async fn record_transaction(
    State(state): State<AppState>,
    Json(payload): Json<StockMovement>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(
        state
            .services
            .stock_ledger
            .record_transaction(payload)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock-ledger/materials/{id}",
    params(("id" = Uuid, Path, description = "Material ID"), PaginationParams),
    responses(
        (status = 200, description = "Movements of one material", body = PaginatedResponse<LedgerEntryView>),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-ledger"
)]
pub async fn list_material_entries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (items, total) = state
        .services
        .stock_ledger
        .list_by_material(id, page, per_page)
        .await?;
    Ok(success_response(PaginatedResponse::new(items, page, per_page, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock-ledger/materials/{id}/balance",
    params(("id" = Uuid, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Replayed balance next to the live one", body = BalanceReport),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-ledger"
)]
pub async fn material_balance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.stock_ledger.balance_for(id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock-ledger/low-stock",
    responses(
        (status = 200, description = "Materials at or below reorder level", body = [LowStockAlert])
    ),
    tag = "stock-ledger"
)]
pub async fn low_stock(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.stock_ledger.low_stock().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock-ledger/reconcile",
    responses(
        (status = 200, description = "Per-material replay compared with live balances", body = ReconciliationReport)
    ),
    tag = "stock-ledger"
)]
pub async fn reconcile(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.stock_ledger.reconcile().await?))
}
