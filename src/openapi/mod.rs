use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shopfloor API",
        version = "0.1.0",
        description = r#"
# Shopfloor Manufacturing API

Plans and executes production against a live stock ledger.

## Features

- **Bills of Materials**: Versioned recipes with components and routing
- **Manufacturing Orders**: Reserve, execute and complete production runs
- **Work Orders**: Start, pause and complete routing operations with quality checks
- **Stock Ledger**: Append-only movements with replay and reconciliation

## Error Handling

Failures share one body shape:

```json
{
  "error": "Unprocessable Entity",
  "code": "insufficient_stock",
  "message": "Insufficient stock: STEEL-01 requires 50 but only 30 available",
  "request_id": "9b0c...",
  "timestamp": "2026-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `per_page` (clamped to the configured maximum).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "materials", description = "Material master data and stock adjustments"),
        (name = "work-centers", description = "Work center management"),
        (name = "boms", description = "Bill of materials management"),
        (name = "manufacturing-orders", description = "Manufacturing order lifecycle"),
        (name = "work-orders", description = "Shop-floor work order execution"),
        (name = "stock-ledger", description = "Stock movements, balances and reconciliation")
    ),
    paths(
        // Materials
        crate::handlers::materials::create_material,
        crate::handlers::materials::list_materials,
        crate::handlers::materials::get_material,
        crate::handlers::materials::update_material,
        crate::handlers::materials::adjust_stock,
        crate::handlers::materials::low_stock_materials,

        // Work centers
        crate::handlers::work_centers::create_work_center,
        crate::handlers::work_centers::list_work_centers,
        crate::handlers::work_centers::get_work_center,
        crate::handlers::work_centers::update_work_center,
        crate::handlers::work_centers::update_work_center_status,

        // BOMs
        crate::handlers::bom::create_bom,
        crate::handlers::bom::list_boms,
        crate::handlers::bom::get_bom,
        crate::handlers::bom::approve_bom,
        crate::handlers::bom::obsolete_bom,

        // Manufacturing orders
        crate::handlers::manufacturing::create_manufacturing_order,
        crate::handlers::manufacturing::list_manufacturing_orders,
        crate::handlers::manufacturing::manufacturing_stats,
        crate::handlers::manufacturing::get_manufacturing_order,
        crate::handlers::manufacturing::generate_work_orders,
        crate::handlers::manufacturing::reserve_materials,
        crate::handlers::manufacturing::complete_manufacturing_order,
        crate::handlers::manufacturing::update_manufacturing_order_status,

        // Work orders
        crate::handlers::work_orders::list_work_orders,
        crate::handlers::work_orders::get_work_order,
        crate::handlers::work_orders::start_work_order,
        crate::handlers::work_orders::pause_work_order,
        crate::handlers::work_orders::complete_work_order,
        crate::handlers::work_orders::cancel_work_order,
        crate::handlers::work_orders::add_work_order_comment,

        // Stock ledger
        crate::handlers::stock_ledger::list_entries,
        crate::handlers::stock_ledger::record_transaction,
        crate::handlers::stock_ledger::list_material_entries,
        crate::handlers::stock_ledger::material_balance,
        crate::handlers::stock_ledger::low_stock,
        crate::handlers::stock_ledger::reconcile,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::entities::manufacturing::stock_ledger_entry::MovementType,
            crate::entities::manufacturing::stock_ledger_entry::ReferenceType,
            crate::entities::manufacturing::bom::BomStatus,
            crate::entities::manufacturing::manufacturing_order::MoStatus,
            crate::entities::manufacturing::work_order::WorkOrderStatus,
            crate::entities::manufacturing::work_center::WorkCenterStatus,
        )
    )
)]
pub struct ApiDocV1;
