pub mod manufacturing;

pub use manufacturing::{
    bom, bom_component, bom_operation, manufacturing_order, material, mo_component,
    stock_ledger_entry, work_center, work_order, work_order_comment,
};
