mod common;

use assert_matches::assert_matches;
use common::{bom_input, TestApp};
use futures::future::join;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, SqlErr};
use shopfloor_api::{
    entities::manufacturing::bom::{self, BomStatus, Entity as BomEntity},
    errors::ServiceError,
};
use uuid::Uuid;

#[tokio::test]
async fn create_bom_defaults_name_units_and_costs() {
    let app = TestApp::new().await;
    let product = app.seed_material("CHAIR", dec!(0), dec!(0)).await;
    let legs = app.seed_material("LEG", dec!(100), dec!(2)).await;
    let seat = app.seed_material("SEAT", dec!(20), dec!(7.5)).await;
    let saw = app.seed_work_center("SAW").await;

    let mut input = bom_input(
        product.id,
        &[(legs.id, dec!(4)), (seat.id, dec!(1))],
        &[(10, saw.id, false), (20, saw.id, true)],
    );
    input.components[1].unit_cost = Some(dec!(9));

    let bom = app
        .services()
        .bill_of_materials
        .create_bom(input)
        .await
        .expect("create bom");

    assert_eq!(bom.bom.version, 1);
    assert_eq!(bom.bom.name, "CHAIR BOM v1");
    assert_eq!(bom.bom.status, BomStatus::Draft);
    assert!(bom.bom.approved_at.is_none());
    // 4 x 2 (material average) + 1 x 9 (explicit)
    assert_eq!(bom.bom.estimated_cost, dec!(17));

    assert_eq!(bom.components.len(), 2);
    assert_eq!(bom.components[0].unit, "pcs");
    assert_eq!(bom.components[0].unit_cost, dec!(2));
    assert_eq!(bom.components[0].line_cost, dec!(8));
    assert_eq!(bom.components[0].position, 1);
    assert_eq!(bom.components[1].position, 2);

    assert_eq!(bom.operations.len(), 2);
    assert!(bom.operations[1].quality_check_required);

    let fetched = app
        .services()
        .bill_of_materials
        .get_bom(bom.bom.id)
        .await
        .expect("get bom");
    assert_eq!(fetched.bom.estimated_cost, dec!(17));
    assert_eq!(fetched.operations[0].sequence, 10);
}

#[tokio::test]
async fn revisions_are_numbered_per_product() {
    let app = TestApp::new().await;
    let product = app.seed_material("TABLE", dec!(0), dec!(0)).await;
    let other = app.seed_material("STOOL", dec!(0), dec!(0)).await;
    let wood = app.seed_material("WOOD", dec!(50), dec!(3)).await;
    let boms = &app.services().bill_of_materials;

    let v1 = boms
        .create_bom(bom_input(product.id, &[(wood.id, dec!(2))], &[]))
        .await
        .expect("v1");
    let v2 = boms
        .create_bom(bom_input(product.id, &[(wood.id, dec!(3))], &[]))
        .await
        .expect("v2");
    let stool = boms
        .create_bom(bom_input(other.id, &[(wood.id, dec!(1))], &[]))
        .await
        .expect("stool v1");

    assert_eq!(v1.bom.version, 1);
    assert_eq!(v2.bom.version, 2);
    assert_eq!(stool.bom.version, 1);

    let (listed, total) = boms
        .list_boms(1, 10, Some(product.id), None)
        .await
        .expect("list");
    assert_eq!(total, 2);
    assert_eq!(listed[0].version, 2, "newest revision first");
}

#[tokio::test]
async fn only_one_active_revision_per_product() {
    let app = TestApp::new().await;
    let product = app.seed_material("LAMP", dec!(0), dec!(0)).await;
    let bulb = app.seed_material("BULB", dec!(10), dec!(1)).await;
    let boms = &app.services().bill_of_materials;

    let v1 = boms
        .create_bom(bom_input(product.id, &[(bulb.id, dec!(1))], &[]))
        .await
        .expect("v1");
    let v2 = boms
        .create_bom(bom_input(product.id, &[(bulb.id, dec!(2))], &[]))
        .await
        .expect("v2");

    let approved = boms.approve(v1.bom.id).await.expect("approve v1");
    assert_eq!(approved.status, BomStatus::Active);
    assert!(approved.approved_at.is_some());

    assert_matches!(boms.approve(v2.bom.id).await, Err(ServiceError::Conflict(_)));
    assert_matches!(boms.approve(v1.bom.id).await, Err(ServiceError::InvalidState(_)));

    let obsolete = boms.mark_obsolete(v1.bom.id).await.expect("obsolete v1");
    assert_eq!(obsolete.status, BomStatus::Obsolete);
    assert_matches!(boms.mark_obsolete(v1.bom.id).await, Err(ServiceError::InvalidState(_)));

    boms.approve(v2.bom.id).await.expect("approve v2 once v1 retired");

    let (active, total) = boms
        .list_boms(1, 10, Some(product.id), Some(BomStatus::Active))
        .await
        .expect("list active");
    assert_eq!(total, 1);
    assert_eq!(active[0].id, v2.bom.id);
}

#[tokio::test]
async fn database_refuses_a_second_active_revision() {
    let app = TestApp::new().await;
    let product = app.seed_material("DESK", dec!(0), dec!(0)).await;
    let board = app.seed_material("BOARD", dec!(10), dec!(15)).await;
    let boms = &app.services().bill_of_materials;

    let v1 = boms
        .create_bom(bom_input(product.id, &[(board.id, dec!(1))], &[]))
        .await
        .expect("v1");
    let v2 = boms
        .create_bom(bom_input(product.id, &[(board.id, dec!(2))], &[]))
        .await
        .expect("v2");
    boms.approve(v1.bom.id).await.expect("approve v1");

    // a writer that skipped the service-level check still cannot activate v2
    let row = BomEntity::find_by_id(v2.bom.id)
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("v2 row");
    let mut forced: bom::ActiveModel = row.into();
    forced.status = Set(BomStatus::Active);
    let err = forced.update(&*app.state.db).await.expect_err("unique index");
    assert_matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)));

    let v2_now = boms.get_bom(v2.bom.id).await.expect("v2");
    assert_eq!(v2_now.bom.status, BomStatus::Draft);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_approvals_activate_one_revision() {
    let app = TestApp::on_disk(4).await;
    let product = app.seed_material("SHELF", dec!(0), dec!(0)).await;
    let plank = app.seed_material("PLANK", dec!(10), dec!(4)).await;
    let boms = app.services().bill_of_materials.clone();

    let v1 = boms
        .create_bom(bom_input(product.id, &[(plank.id, dec!(3))], &[]))
        .await
        .expect("v1");
    let v2 = boms
        .create_bom(bom_input(product.id, &[(plank.id, dec!(4))], &[]))
        .await
        .expect("v2");

    let (first, second) = join(boms.approve(v1.bom.id), boms.approve(v2.bom.id)).await;
    let approved = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert!(approved <= 1, "both revisions were activated");
    for result in [&first, &second] {
        if let Err(e) = result {
            assert_eq!(e.code(), "conflict", "unexpected error: {}", e);
        }
    }

    let (_, active) = boms
        .list_boms(1, 10, Some(product.id), Some(BomStatus::Active))
        .await
        .expect("list active");
    assert_eq!(active, approved as u64);
}

#[tokio::test]
async fn draft_boms_cannot_be_obsoleted() {
    let app = TestApp::new().await;
    let product = app.seed_material("FAN", dec!(0), dec!(0)).await;
    let blade = app.seed_material("BLADE", dec!(10), dec!(1)).await;
    let bom = app
        .services()
        .bill_of_materials
        .create_bom(bom_input(product.id, &[(blade.id, dec!(3))], &[]))
        .await
        .expect("create");

    assert_matches!(
        app.services().bill_of_materials.mark_obsolete(bom.bom.id).await,
        Err(ServiceError::InvalidState(_))
    );
}

#[tokio::test]
async fn structural_errors_are_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_material("DESK", dec!(0), dec!(0)).await;
    let top = app.seed_material("TOP", dec!(10), dec!(20)).await;
    let cnc = app.seed_work_center("CNC").await;
    let boms = &app.services().bill_of_materials;

    let self_referencing = bom_input(product.id, &[(product.id, dec!(1))], &[]);
    assert_matches!(
        boms.create_bom(self_referencing).await,
        Err(ServiceError::ValidationError(msg)) if msg.contains("itself")
    );

    let duplicated = bom_input(product.id, &[(top.id, dec!(1)), (top.id, dec!(2))], &[]);
    assert_matches!(boms.create_bom(duplicated).await, Err(ServiceError::ValidationError(_)));

    let zero_quantity = bom_input(product.id, &[(top.id, dec!(0))], &[]);
    assert_matches!(boms.create_bom(zero_quantity).await, Err(ServiceError::ValidationError(_)));

    let mut wasteful = bom_input(product.id, &[(top.id, dec!(1))], &[]);
    wasteful.components[0].waste_percent = dec!(120);
    assert_matches!(boms.create_bom(wasteful).await, Err(ServiceError::ValidationError(_)));

    let out_of_order = bom_input(
        product.id,
        &[(top.id, dec!(1))],
        &[(20, cnc.id, false), (10, cnc.id, false)],
    );
    assert_matches!(boms.create_bom(out_of_order).await, Err(ServiceError::ValidationError(_)));

    let (_, total) = boms.list_boms(1, 10, None, None).await.expect("list");
    assert_eq!(total, 0, "rejected payloads leave nothing behind");
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let app = TestApp::new().await;
    let product = app.seed_material("BOX", dec!(0), dec!(0)).await;
    let boms = &app.services().bill_of_materials;

    let missing_material = bom_input(product.id, &[(Uuid::new_v4(), dec!(1))], &[]);
    assert_matches!(boms.create_bom(missing_material).await, Err(ServiceError::NotFound(_)));

    let cardboard = app.seed_material("CARD", dec!(10), dec!(1)).await;
    let missing_center = bom_input(
        product.id,
        &[(cardboard.id, dec!(1))],
        &[(10, Uuid::new_v4(), false)],
    );
    assert_matches!(boms.create_bom(missing_center).await, Err(ServiceError::NotFound(_)));

    assert_matches!(boms.get_bom(Uuid::new_v4()).await, Err(ServiceError::NotFound(_)));
}
