mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use shopfloor_api::{
    entities::manufacturing::{
        manufacturing_order::MoStatus,
        stock_ledger_entry::{MovementType, ReferenceType},
    },
    errors::ServiceError,
    services::{
        materials::{AdjustStock, CreateMaterial, UpdateMaterial},
        stock_ledger::{LedgerFilter, StockMovement},
    },
};
use uuid::Uuid;

#[tokio::test]
async fn opening_balance_is_on_the_ledger() {
    let app = TestApp::new().await;
    let steel = app.seed_material("STEEL", dec!(75), dec!(2)).await;
    let empty = app.seed_material("EMPTY", dec!(0), dec!(2)).await;

    let (entries, total) = app
        .services()
        .stock_ledger
        .list_by_material(steel.id, 1, 10)
        .await
        .expect("entries");
    assert_eq!(total, 1);
    assert_eq!(entries[0].movement_type, MovementType::In);
    assert_eq!(entries[0].reference_type, ReferenceType::OpeningBalance);
    assert_eq!(entries[0].quantity, dec!(75));

    let (_, none) = app
        .services()
        .stock_ledger
        .list_by_material(empty.id, 1, 10)
        .await
        .expect("entries");
    assert_eq!(none, 0);
}

#[tokio::test]
async fn manual_movements_update_balances_and_versions() {
    let app = TestApp::new().await;
    let bolts = app.seed_material("BOLT", dec!(100), dec!(0.1)).await;
    let ledger = &app.services().stock_ledger;

    let reserved = ledger
        .record_transaction(StockMovement::new(
            bolts.id,
            MovementType::Reserve,
            dec!(40),
            "PICK-1",
            ReferenceType::Manual,
        ))
        .await
        .expect("reserve");
    assert_eq!(reserved.material.reserved, dec!(40));
    assert_eq!(reserved.material.available, dec!(60));
    assert_eq!(reserved.material.version, bolts.version + 1);
    assert_eq!(reserved.entry.reference, "PICK-1");

    let released = ledger
        .record_transaction(
            StockMovement::new(
                bolts.id,
                MovementType::Release,
                dec!(15),
                "PICK-1",
                ReferenceType::Manual,
            )
            .with_note("partial pick"),
        )
        .await
        .expect("release");
    assert_eq!(released.material.reserved, dec!(25));
    assert_eq!(released.entry.note.as_deref(), Some("partial pick"));

    let consumed = ledger
        .record_transaction(StockMovement::new(
            bolts.id,
            MovementType::Out,
            dec!(60),
            "SCRAP-9",
            ReferenceType::Manual,
        ))
        .await
        .expect("out");
    assert_eq!(consumed.material.on_hand, dec!(40));
    assert_eq!(consumed.material.available, dec!(15));

    let balance = ledger.balance_for(bolts.id).await.expect("balance");
    assert!(balance.in_sync);
    assert_eq!(balance.entry_count, 4);
    assert_eq!(balance.ledger.on_hand, dec!(40));
    assert_eq!(balance.ledger.reserved, dec!(25));
}

#[tokio::test]
async fn invalid_movements_leave_no_trace() {
    let app = TestApp::new().await;
    let nuts = app.seed_material("NUT", dec!(10), dec!(0.05)).await;
    let ledger = &app.services().stock_ledger;

    assert_matches!(
        ledger
            .record_transaction(StockMovement::new(
                nuts.id,
                MovementType::Out,
                dec!(11),
                "OUT-1",
                ReferenceType::Manual,
            ))
            .await,
        Err(ServiceError::InsufficientStock(msg)) if msg.contains("NUT")
    );
    assert_matches!(
        ledger
            .record_transaction(StockMovement::new(
                nuts.id,
                MovementType::Release,
                dec!(1),
                "REL-1",
                ReferenceType::Manual,
            ))
            .await,
        Err(ServiceError::InvalidState(_))
    );
    assert_matches!(
        ledger
            .record_transaction(StockMovement::new(
                nuts.id,
                MovementType::In,
                dec!(0),
                "IN-0",
                ReferenceType::Manual,
            ))
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        ledger
            .record_transaction(StockMovement::new(
                Uuid::new_v4(),
                MovementType::In,
                dec!(1),
                "IN-1",
                ReferenceType::Manual,
            ))
            .await,
        Err(ServiceError::NotFound(_))
    );

    let material = app.services().materials.get(nuts.id).await.expect("nuts");
    assert_eq!(material.on_hand, dec!(10));
    assert_eq!(material.version, nuts.version);
    let balance = ledger.balance_for(nuts.id).await.expect("balance");
    assert_eq!(balance.entry_count, 1);
}

#[tokio::test]
async fn adjustments_are_signed_movements() {
    let app = TestApp::new().await;
    let glue = app.seed_material("GLUE", dec!(5), dec!(4)).await;
    let materials = &app.services().materials;

    let received = materials
        .adjust(
            glue.id,
            AdjustStock {
                delta: dec!(7.5),
                reason: Some("cycle count".into()),
            },
        )
        .await
        .expect("positive adjustment");
    assert_eq!(received.entry.movement_type, MovementType::In);
    assert_eq!(received.entry.reference_type, ReferenceType::Adjustment);
    assert!(received.entry.reference.starts_with("ADJ-"));
    assert_eq!(received.material.on_hand, dec!(12.5));

    let written_off = materials
        .adjust(
            glue.id,
            AdjustStock {
                delta: dec!(-2.5),
                reason: None,
            },
        )
        .await
        .expect("negative adjustment");
    assert_eq!(written_off.entry.movement_type, MovementType::Out);
    assert_eq!(written_off.entry.quantity, dec!(2.5));
    assert_eq!(written_off.material.on_hand, dec!(10));

    assert_matches!(
        materials
            .adjust(glue.id, AdjustStock { delta: dec!(0), reason: None })
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        materials
            .adjust(glue.id, AdjustStock { delta: dec!(-11), reason: None })
            .await,
        Err(ServiceError::InsufficientStock(_))
    );
}

#[tokio::test]
async fn material_master_data_rules() {
    let app = TestApp::new().await;
    let wire = app.seed_material("WIRE", dec!(10), dec!(1)).await;
    let materials = &app.services().materials;

    assert_matches!(
        materials
            .create(CreateMaterial {
                code: "WIRE".into(),
                name: "Duplicate".into(),
                unit: "m".into(),
                initial_on_hand: dec!(0),
                reorder_level: dec!(0),
                average_cost: dec!(0),
            })
            .await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        materials
            .create(CreateMaterial {
                code: "NEG".into(),
                name: "Negative".into(),
                unit: "m".into(),
                initial_on_hand: dec!(-1),
                reorder_level: dec!(0),
                average_cost: dec!(0),
            })
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let updated = materials
        .update(
            wire.id,
            UpdateMaterial {
                name: Some("Copper wire".into()),
                reorder_level: Some(dec!(20)),
                ..Default::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.name, "Copper wire");
    assert_eq!(updated.on_hand, dec!(10));
    assert!(updated.low_stock);

    let (found, total) = materials
        .list(1, 10, Some("WIR".into()))
        .await
        .expect("search");
    assert_eq!(total, 1);
    assert_eq!(found[0].id, wire.id);
}

#[tokio::test]
async fn low_stock_report_uses_available_quantity() {
    let app = TestApp::new().await;
    let materials = &app.services().materials;
    let tape = materials
        .create(CreateMaterial {
            code: "TAPE".into(),
            name: "Tape".into(),
            unit: "roll".into(),
            initial_on_hand: dec!(30),
            reorder_level: dec!(10),
            average_cost: dec!(1),
        })
        .await
        .expect("tape");
    materials
        .create(CreateMaterial {
            code: "FOAM".into(),
            name: "Foam".into(),
            unit: "sheet".into(),
            initial_on_hand: dec!(100),
            reorder_level: dec!(10),
            average_cost: dec!(1),
        })
        .await
        .expect("foam");

    let ledger = &app.services().stock_ledger;
    assert!(ledger.low_stock().await.expect("report").is_empty());

    ledger
        .record_transaction(StockMovement::new(
            tape.id,
            MovementType::Reserve,
            dec!(25),
            "HOLD-1",
            ReferenceType::Manual,
        ))
        .await
        .expect("reserve tape");

    let alerts = ledger.low_stock().await.expect("report");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].code, "TAPE");
    assert_eq!(alerts[0].on_hand, dec!(30));
    assert_eq!(alerts[0].available, dec!(5));
    assert_eq!(alerts[0].shortfall, dec!(5));
}

#[tokio::test]
async fn cancelling_a_reserved_order_releases_stock() {
    let app = TestApp::new().await;
    let factory = app.seed_factory(dec!(100)).await;
    let order = app.seed_order(factory.bom.bom.id, dec!(10)).await;
    let services = app.services();

    services
        .manufacturing
        .reserve_materials(order.order.id)
        .await
        .expect("reserve");
    let cancelled = services
        .manufacturing
        .update_status(order.order.id, MoStatus::Cancelled)
        .await
        .expect("cancel");
    assert!(!cancelled.materials_reserved);

    let steel = services.materials.get(factory.steel.id).await.expect("steel");
    assert_eq!(steel.on_hand, dec!(100));
    assert_eq!(steel.reserved, dec!(0));

    let (releases, _) = services
        .stock_ledger
        .list(
            LedgerFilter {
                movement_type: Some(MovementType::Release),
                reference: Some(order.order.reference.clone()),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .expect("releases");
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].quantity, dec!(50));
    assert_eq!(releases[0].reference_type, ReferenceType::ManufacturingOrder);
    assert_eq!(releases[0].note.as_deref(), Some("order cancelled"));
}

#[tokio::test]
async fn reconcile_reports_no_drift_after_a_full_run() {
    let app = TestApp::new().await;
    let factory = app.seed_factory(dec!(200)).await;
    let services = app.services();

    let kept = app.seed_order(factory.bom.bom.id, dec!(4)).await;
    let dropped = app.seed_order(factory.bom.bom.id, dec!(6)).await;
    for order in [&kept, &dropped] {
        services
            .manufacturing
            .reserve_materials(order.order.id)
            .await
            .expect("reserve");
    }
    services
        .manufacturing
        .update_status(dropped.order.id, MoStatus::Cancelled)
        .await
        .expect("cancel");

    let wos = services
        .manufacturing
        .generate_work_orders(kept.order.id)
        .await
        .expect("generate");
    for wo in &wos {
        services.work_orders.start(wo.id).await.expect("start");
        services
            .work_orders
            .complete(wo.id, Default::default())
            .await
            .expect("complete");
    }
    services
        .manufacturing
        .complete(kept.order.id)
        .await
        .expect("complete order");

    let report = services.stock_ledger.reconcile().await.expect("reconcile");
    assert_eq!(report.materials_checked, 2);
    assert!(report.in_sync);
    assert!(report.drifted.is_empty());

    let steel = services
        .stock_ledger
        .balance_for(factory.steel.id)
        .await
        .expect("steel balance");
    assert_eq!(steel.live.on_hand, dec!(180));
    assert_eq!(steel.live.reserved, dec!(0));
    assert_eq!(steel.ledger, steel.live);
}
