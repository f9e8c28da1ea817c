mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}

fn id(value: &Value) -> String {
    value["id"].as_str().expect("id").to_string()
}

async fn post(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
    app.request_json(Method::POST, uri, Some(body)).await
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    app.request_json(Method::GET, uri, None).await
}

#[tokio::test]
async fn health_status_and_openapi_are_served() {
    let app = TestApp::new().await;

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");

    let (status, body) = get(&app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "shopfloor-api");
    assert_eq!(body["data"]["environment"], "test");

    let (status, body) = get(&app, "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/manufacturing-orders/{id}/complete"].is_object());
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/materials", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn full_production_run_over_http() {
    let app = TestApp::new().await;

    let (status, product) = post(
        &app,
        "/api/v1/materials",
        json!({ "code": "GEAR", "name": "Gearbox", "unit": "pcs" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", product);
    let product_id = id(&product["data"]);

    let (status, steel) = post(
        &app,
        "/api/v1/materials",
        json!({
            "code": "STEEL",
            "name": "Steel bar",
            "unit": "kg",
            "initial_on_hand": "100",
            "reorder_level": "10",
            "average_cost": "2"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let steel_id = id(&steel["data"]);
    assert_eq!(decimal(&steel["data"]["available"]), dec!(100));

    let (status, center) = post(
        &app,
        "/api/v1/work-centers",
        json!({ "code": "MILL", "name": "Mill", "cost_per_hour": "80", "capacity_per_hour": "4" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let center_id = id(&center["data"]);

    let (status, bom) = post(
        &app,
        "/api/v1/boms",
        json!({
            "product_id": product_id,
            "components": [{ "material_id": steel_id, "quantity": "5" }],
            "operations": [
                { "sequence": 10, "name": "Rough", "work_center_id": center_id, "duration_minutes": 20 },
                { "sequence": 20, "name": "Finish", "work_center_id": center_id, "duration_minutes": 40,
                  "quality_check_required": true }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", bom);
    let bom_id = id(&bom["data"]);
    assert_eq!(bom["data"]["status"], "draft");
    assert_eq!(decimal(&bom["data"]["estimated_cost"]), dec!(10));

    let (status, _) = post(&app, &format!("/api/v1/boms/{}/approve", bom_id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, order) = post(
        &app,
        "/api/v1/manufacturing-orders",
        json!({
            "bom_id": bom_id,
            "quantity": "10",
            "due_date": (Utc::now() + Duration::days(5)).to_rfc3339(),
            "assignee": "cell-2"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", order);
    let mo_id = id(&order["data"]);
    assert_eq!(order["data"]["status"], "draft");
    assert_eq!(decimal(&order["data"]["component_cost"]), dec!(100));
    assert_eq!(decimal(&order["data"]["components"][0]["required_quantity"]), dec!(50));

    let (status, work_orders) = post(
        &app,
        &format!("/api/v1/manufacturing-orders/{}/work-orders", mo_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let wo_ids: Vec<String> = work_orders["data"]
        .as_array()
        .expect("work orders")
        .iter()
        .map(id)
        .collect();
    assert_eq!(wo_ids.len(), 2);

    let (status, reserved) = post(
        &app,
        &format!("/api/v1/manufacturing-orders/{}/reserve", mo_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reserved["data"]["status"], "confirmed");
    assert_eq!(reserved["data"]["materials_reserved"], true);

    let (status, _) = post(&app, &format!("/api/v1/work-orders/{}/start", wo_ids[0]), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let response = app
        .request(Method::POST, &format!("/api/v1/work-orders/{}/complete", wo_ids[0]), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK, "complete without a body");

    let (_, detail) = get(&app, &format!("/api/v1/manufacturing-orders/{}", mo_id)).await;
    assert_eq!(detail["data"]["progress"], 50);
    assert_eq!(detail["data"]["status"], "in_progress");
    assert_eq!(detail["data"]["work_orders"].as_array().map(Vec::len), Some(2));

    let (status, _) = post(&app, &format!("/api/v1/work-orders/{}/start", wo_ids[1]), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post(
        &app,
        &format!("/api/v1/work-orders/{}/complete", wo_ids[1]),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = post(
        &app,
        &format!("/api/v1/work-orders/{}/complete", wo_ids[1]),
        json!({
            "real_duration_minutes": 38,
            "quality_check": { "passed": true, "inspector": "qa-2" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["quality_check"]["passed"], true);

    let (status, done) = post(
        &app,
        &format!("/api/v1/manufacturing-orders/{}/complete", mo_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", done);
    assert_eq!(done["data"]["status"], "done");

    let (_, product) = get(&app, &format!("/api/v1/materials/{}", product_id)).await;
    assert_eq!(decimal(&product["data"]["on_hand"]), dec!(10));
    let (_, steel) = get(&app, &format!("/api/v1/materials/{}", steel_id)).await;
    assert_eq!(decimal(&steel["data"]["on_hand"]), dec!(50));
    assert_eq!(decimal(&steel["data"]["reserved"]), dec!(0));

    let (status, report) = get(&app, "/api/v1/stock-ledger/reconcile").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["data"]["in_sync"], true);

    let (_, stats) = get(&app, "/api/v1/manufacturing-orders/stats").await;
    assert_eq!(stats["data"]["total"], 1);
    assert_eq!(stats["data"]["by_status"]["done"], 1);
}

#[tokio::test]
async fn error_responses_share_one_shape() {
    let app = TestApp::new().await;
    let factory = app.seed_factory(dec!(30)).await;
    let order = app.seed_order(factory.bom.bom.id, dec!(10)).await;

    let (status, body) = post(
        &app,
        &format!("/api/v1/manufacturing-orders/{}/reserve", order.order.id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "insufficient_stock");
    assert!(body["message"].as_str().unwrap_or_default().contains("STEEL"));
    assert!(body["request_id"].is_string());

    let (status, body) = get(
        &app,
        "/api/v1/manufacturing-orders/00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, body) = app
        .request_json(
            Method::PUT,
            &format!("/api/v1/manufacturing-orders/{}/status", order.order.id),
            Some(json!({ "status": "done" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_state");

    let (status, body) = post(
        &app,
        "/api/v1/materials",
        json!({ "code": "", "name": "Nameless", "unit": "pcs" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = post(
        &app,
        "/api/v1/materials",
        json!({ "code": "STEEL", "name": "Again", "unit": "kg" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn ledger_endpoints_record_and_report() {
    let app = TestApp::new().await;
    let oil = app.seed_material("OIL", dec!(12), dec!(6)).await;

    let (status, body) = post(
        &app,
        "/api/v1/stock-ledger",
        json!({
            "material_id": oil.id,
            "movement_type": "OUT",
            "quantity": "4",
            "reference": "MAINT-7",
            "note": "machine service"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["entry"]["movement_type"], "OUT");
    assert_eq!(body["data"]["entry"]["reference_type"], "manual");
    assert_eq!(decimal(&body["data"]["material"]["on_hand"]), dec!(8));

    let (status, body) = post(
        &app,
        "/api/v1/stock-ledger",
        json!({
            "material_id": oil.id,
            "movement_type": "OUT",
            "quantity": "40",
            "reference": "MAINT-8"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "insufficient_stock");

    let (status, body) = post(
        &app,
        "/api/v1/stock-ledger",
        json!({
            "material_id": oil.id,
            "movement_type": "IN",
            "quantity": Decimal::MAX.to_string(),
            "reference": "DELIVERY-1"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["code"], "validation_error");

    let (status, page) = get(
        &app,
        &format!("/api/v1/stock-ledger/materials/{}?per_page=1&page=2", oil.id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], 2);
    assert_eq!(page["data"]["total_pages"], 2);
    assert_eq!(page["data"]["items"][0]["reference"], "MAINT-7");

    let (status, filtered) = get(&app, "/api/v1/stock-ledger?movement_type=OUT").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(filtered["data"]["total"], 1);

    let (status, balance) = get(
        &app,
        &format!("/api/v1/stock-ledger/materials/{}/balance", oil.id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["data"]["in_sync"], true);
    assert_eq!(balance["data"]["entry_count"], 2);

    let (status, adjusted) = post(
        &app,
        &format!("/api/v1/materials/{}/adjust", oil.id),
        json!({ "delta": "-8", "reason": "spill" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", adjusted);

    let (status, alerts) = get(&app, "/api/v1/stock-ledger/low-stock").await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = alerts["data"]
        .as_array()
        .expect("alerts")
        .iter()
        .filter_map(|a| a["code"].as_str())
        .collect();
    assert_eq!(codes, vec!["OIL"]);
}

#[tokio::test]
async fn work_center_status_and_listing() {
    let app = TestApp::new().await;
    let oven = app.seed_work_center("OVEN").await;
    app.seed_work_center("KILN").await;

    let (status, body) = app
        .request_json(
            Method::PUT,
            &format!("/api/v1/work-centers/{}/status", oven.id),
            Some(json!({ "status": "maintenance" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "maintenance");

    let (status, list) = get(&app, "/api/v1/work-centers?status=maintenance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"]["total"], 1);
    assert_eq!(list["data"]["items"][0]["code"], "OVEN");
}
