// Inventory
pub mod materials;
pub mod stock_ledger;

// Engineering data
pub mod billofmaterials;
pub mod work_centers;

// Production
pub mod manufacturing;
pub mod work_orders;
