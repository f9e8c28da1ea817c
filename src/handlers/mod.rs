pub mod bom;
pub mod common;
pub mod manufacturing;
pub mod materials;
pub mod stock_ledger;
pub mod work_centers;
pub mod work_orders;

use crate::events::EventSender;
use crate::db::DbPool;
use crate::services::{
    billofmaterials::BillOfMaterialsService, manufacturing::ManufacturingService,
    materials::MaterialService, stock_ledger::StockLedgerService,
    work_centers::WorkCenterService, work_orders::WorkOrderService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub materials: Arc<MaterialService>,
    pub work_centers: Arc<WorkCenterService>,
    pub stock_ledger: Arc<StockLedgerService>,
    pub bill_of_materials: Arc<BillOfMaterialsService>,
    pub manufacturing: Arc<ManufacturingService>,
    pub work_orders: Arc<WorkOrderService>,
}

impl AppServices {
    /// Builds every service over one pool and event channel
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, max_retries: u32) -> Self {
        Self {
            materials: Arc::new(MaterialService::new(
                db_pool.clone(),
                event_sender.clone(),
                max_retries,
            )),
            work_centers: Arc::new(WorkCenterService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            stock_ledger: Arc::new(StockLedgerService::new(
                db_pool.clone(),
                event_sender.clone(),
                max_retries,
            )),
            bill_of_materials: Arc::new(BillOfMaterialsService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            manufacturing: Arc::new(ManufacturingService::new(
                db_pool.clone(),
                event_sender.clone(),
                max_retries,
            )),
            work_orders: Arc::new(WorkOrderService::new(db_pool, event_sender)),
        }
    }
}
