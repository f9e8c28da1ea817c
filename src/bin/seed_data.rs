//! Seed data script - populates the database with a small demo factory
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - raw materials and a finished product with opening stock
//! - two work centers
//! - an active BOM with a two-step routing
//! - one confirmed manufacturing order with generated work orders

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use shopfloor_api::{
    config, db,
    events::{process_events, EventSender},
    handlers::AppServices,
    services::{
        billofmaterials::{BomComponentInput, BomOperationInput, CreateBomInput},
        manufacturing::CreateManufacturingOrder,
        materials::{CreateMaterial, MaterialView},
        work_centers::CreateWorkCenter,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== Shopfloor API Seed Data ===");

    let cfg = config::load_config()?;
    info!("Connecting to database: {}", cfg.database_url());
    let pool = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&pool).await?;
    let pool = Arc::new(pool);

    let (tx, rx) = mpsc::channel(cfg.event_channel_capacity);
    let events = tokio::spawn(process_events(rx));
    let services = AppServices::new(
        pool.clone(),
        Arc::new(EventSender::new(tx)),
        cfg.inventory_max_retries,
    );

    info!("Creating materials...");
    let steel = create_material(&services, "STEEL-SHEET", "Steel sheet 2mm", "kg", 500).await?;
    let bolts = create_material(&services, "BOLT-M6", "Bolt M6x20", "pcs", 2_000).await?;
    let paint = create_material(&services, "PAINT-GRY", "Powder coat, grey", "kg", 40).await?;
    let cabinet = create_material(&services, "CAB-100", "Tool cabinet", "pcs", 0).await?;

    info!("Creating work centers...");
    let press = services
        .work_centers
        .create(CreateWorkCenter {
            code: "PRESS-1".into(),
            name: "Press line".into(),
            cost_per_hour: dec!(85),
            capacity_per_hour: dec!(12),
        })
        .await?;
    let paint_booth = services
        .work_centers
        .create(CreateWorkCenter {
            code: "PAINT-1".into(),
            name: "Paint booth".into(),
            cost_per_hour: dec!(60),
            capacity_per_hour: dec!(8),
        })
        .await?;

    info!("Creating BOM...");
    let bom = services
        .bill_of_materials
        .create_bom(CreateBomInput {
            product_id: cabinet.id,
            name: None,
            notes: Some("Demo cabinet".into()),
            components: vec![
                component(steel.id, dec!(12.5)),
                component(bolts.id, dec!(24)),
                component(paint.id, dec!(0.8)),
            ],
            operations: vec![
                BomOperationInput {
                    sequence: 10,
                    name: "Cut and bend".into(),
                    work_center_id: press.id,
                    duration_minutes: 45,
                    setup_minutes: 15,
                    teardown_minutes: 5,
                    quality_check_required: false,
                },
                BomOperationInput {
                    sequence: 20,
                    name: "Coat".into(),
                    work_center_id: paint_booth.id,
                    duration_minutes: 30,
                    setup_minutes: 10,
                    teardown_minutes: 10,
                    quality_check_required: true,
                },
            ],
        })
        .await?;
    services.bill_of_materials.approve(bom.bom.id).await?;
    info!("  BOM {} v{} estimated at {}", bom.bom.name, bom.bom.version, bom.bom.estimated_cost);

    info!("Creating manufacturing order...");
    let order = services
        .manufacturing
        .create_from_bom(CreateManufacturingOrder {
            bom_id: bom.bom.id,
            quantity: dec!(10),
            scheduled_start: None,
            due_date: Utc::now() + Duration::days(7),
            assignee: Some("line-lead".into()),
        })
        .await?;
    let work_orders = services
        .manufacturing
        .generate_work_orders(order.order.id)
        .await?;
    services.manufacturing.reserve_materials(order.order.id).await?;
    info!(
        "  {} with {} work orders, materials reserved",
        order.order.reference,
        work_orders.len()
    );

    drop(services);
    events.await?;

    info!("=== Seed Data Complete ===");
    info!("Try these API calls:");
    info!("  curl http://localhost:{}/api/v1/manufacturing-orders", cfg.port);
    info!("  curl http://localhost:{}/api/v1/stock-ledger/reconcile", cfg.port);

    Ok(())
}

fn component(material_id: uuid::Uuid, quantity: rust_decimal::Decimal) -> BomComponentInput {
    BomComponentInput {
        material_id,
        quantity,
        unit: None,
        waste_percent: dec!(0),
        unit_cost: None,
    }
}

async fn create_material(
    services: &AppServices,
    code: &str,
    name: &str,
    unit: &str,
    on_hand: i64,
) -> anyhow::Result<MaterialView> {
    let material = services
        .materials
        .create(CreateMaterial {
            code: code.into(),
            name: name.into(),
            unit: unit.into(),
            initial_on_hand: on_hand.into(),
            reorder_level: dec!(10),
            average_cost: dec!(1.5),
        })
        .await?;
    info!("  {} ({} {})", material.code, material.on_hand, material.unit);
    Ok(material)
}
