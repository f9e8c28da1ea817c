pub mod bom;
pub mod bom_component;
pub mod bom_operation;
pub mod manufacturing_order;
pub mod material;
pub mod mo_component;
pub mod stock_ledger_entry;
pub mod work_center;
pub mod work_order;
pub mod work_order_comment;
