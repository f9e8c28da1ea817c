#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use shopfloor_api::{
    config::AppConfig,
    db::{self, DbConfig},
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        billofmaterials::{BomComponentInput, BomDetail, BomOperationInput, CreateBomInput},
        manufacturing::{CreateManufacturingOrder, ManufacturingOrderDetail},
        materials::{CreateMaterial, MaterialView},
        work_centers::{CreateWorkCenter, WorkCenterView},
    },
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: Option<TempDir>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_database(DbConfig::in_memory_sqlite(), None).await
    }

    /// Application over a SQLite file with several pooled connections, so
    /// transactions genuinely interleave.
    pub async fn on_disk(max_connections: u32) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let db_cfg = DbConfig::sqlite_file(&dir.path().join("shopfloor.db"), max_connections);
        Self::with_database(db_cfg, Some(dir)).await
    }

    async fn with_database(db_cfg: DbConfig, db_dir: Option<TempDir>) -> Self {
        let cfg = AppConfig::new(
            db_cfg.url.clone(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = shopfloor_api::app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Send a request through the full middleware stack.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and decodes the JSON body.
    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is json")
        };
        (status, json)
    }

    pub async fn seed_material(&self, code: &str, on_hand: Decimal, unit_cost: Decimal) -> MaterialView {
        self.services()
            .materials
            .create(CreateMaterial {
                code: code.to_string(),
                name: format!("Material {}", code),
                unit: "pcs".to_string(),
                initial_on_hand: on_hand,
                reorder_level: Decimal::ZERO,
                average_cost: unit_cost,
            })
            .await
            .expect("seed material")
    }

    pub async fn seed_work_center(&self, code: &str) -> WorkCenterView {
        self.services()
            .work_centers
            .create(CreateWorkCenter {
                code: code.to_string(),
                name: format!("Work center {}", code),
                cost_per_hour: Decimal::from(50),
                capacity_per_hour: Decimal::from(10),
            })
            .await
            .expect("seed work center")
    }

    /// Creates and approves a BOM; operations are `(sequence, work center, quality check)`.
    pub async fn seed_active_bom(
        &self,
        product_id: Uuid,
        components: &[(Uuid, Decimal)],
        operations: &[(i32, Uuid, bool)],
    ) -> BomDetail {
        let bom = self
            .services()
            .bill_of_materials
            .create_bom(bom_input(product_id, components, operations))
            .await
            .expect("seed bom");
        self.services()
            .bill_of_materials
            .approve(bom.bom.id)
            .await
            .expect("approve seeded bom");
        bom
    }

    pub async fn seed_order(&self, bom_id: Uuid, quantity: Decimal) -> ManufacturingOrderDetail {
        self.services()
            .manufacturing
            .create_from_bom(CreateManufacturingOrder {
                bom_id,
                quantity,
                scheduled_start: None,
                due_date: Utc::now() + Duration::days(7),
                assignee: None,
            })
            .await
            .expect("seed manufacturing order")
    }

    /// Product with one component (5 per unit at cost 2) and a two-step routing.
    pub async fn seed_factory(&self, component_on_hand: Decimal) -> Factory {
        let product = self.seed_material("WIDGET", Decimal::ZERO, Decimal::ZERO).await;
        let steel = self
            .seed_material("STEEL", component_on_hand, Decimal::from(2))
            .await;
        let press = self.seed_work_center("PRESS").await;
        let bom = self
            .seed_active_bom(
                product.id,
                &[(steel.id, Decimal::from(5))],
                &[(10, press.id, false), (20, press.id, false)],
            )
            .await;

        Factory {
            product,
            steel,
            press,
            bom,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub struct Factory {
    pub product: MaterialView,
    pub steel: MaterialView,
    pub press: WorkCenterView,
    pub bom: BomDetail,
}

pub fn bom_input(
    product_id: Uuid,
    components: &[(Uuid, Decimal)],
    operations: &[(i32, Uuid, bool)],
) -> CreateBomInput {
    CreateBomInput {
        product_id,
        name: None,
        notes: None,
        components: components
            .iter()
            .map(|(material_id, quantity)| BomComponentInput {
                material_id: *material_id,
                quantity: *quantity,
                unit: None,
                waste_percent: Decimal::ZERO,
                unit_cost: None,
            })
            .collect(),
        operations: operations
            .iter()
            .map(|(sequence, work_center_id, qc)| BomOperationInput {
                sequence: *sequence,
                name: format!("Operation {}", sequence),
                work_center_id: *work_center_id,
                duration_minutes: 30,
                setup_minutes: 0,
                teardown_minutes: 0,
                quality_check_required: *qc,
            })
            .collect(),
    }
}
