use crate::{
    db::DbPool,
    entities::manufacturing::{
        bom::BomStatus,
        bom_component::{self, Entity as BomComponentEntity},
        bom_operation::{self, Entity as BomOperationEntity},
        manufacturing_order::{self, Entity as ManufacturingOrderEntity, MoStatus},
        material::{self, Entity as MaterialEntity},
        mo_component::{self, Entity as MoComponentEntity},
        stock_ledger_entry::{self, MovementType, ReferenceType},
        work_order::{self, Entity as WorkOrderEntity, WorkOrderStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        billofmaterials::find_bom,
        stock_ledger::{
            apply_movement, apply_movement_to, ensure_storable, retry_on_conflict,
            StockLedgerService, StockMovement,
        },
        work_orders::WorkOrderView,
    },
};
use chrono::{DateTime, Datelike, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Component requirement for a whole order.
pub fn required_quantity(
    quantity_per_unit: Decimal,
    order_quantity: Decimal,
) -> Result<Decimal, ServiceError> {
    let required = quantity_per_unit.checked_mul(order_quantity).ok_or_else(|| {
        ServiceError::ValidationError(format!(
            "{} x {} overflows the component requirement",
            quantity_per_unit, order_quantity
        ))
    })?;
    ensure_storable(required, "component requirement")
}

/// Completed share of `total` as a whole percentage, rounded half up.
pub fn progress_percent(completed: u64, total: u64) -> i32 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((200 * completed + total) / (2 * total)) as i32
}

pub fn format_reference(year: i32, sequence: u64) -> String {
    format!("MO-{}-{:04}", year, sequence)
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateManufacturingOrder {
    pub bom_id: Uuid,
    pub quantity: Decimal,
    /// Defaults to now
    pub scheduled_start: Option<DateTime<Utc>>,
    pub due_date: DateTime<Utc>,
    #[validate(length(min = 1, max = 255))]
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ManufacturingOrderFilter {
    pub status: Option<MoStatus>,
    pub assignee: Option<String>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManufacturingOrderView {
    pub id: Uuid,
    pub reference: String,
    pub bom_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub status: MoStatus,
    pub progress: i32,
    pub assignee: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub materials_reserved: bool,
    pub overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<manufacturing_order::Model> for ManufacturingOrderView {
    fn from(model: manufacturing_order::Model) -> Self {
        Self {
            overdue: model.is_overdue(Utc::now()),
            id: model.id,
            reference: model.reference,
            bom_id: model.bom_id,
            product_id: model.product_id,
            quantity: model.quantity,
            status: model.status,
            progress: model.progress,
            assignee: model.assignee,
            scheduled_start: model.scheduled_start,
            due_date: model.due_date,
            actual_start: model.actual_start,
            actual_end: model.actual_end,
            materials_reserved: model.materials_reserved,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MoComponentView {
    pub id: Uuid,
    pub material_id: Uuid,
    pub quantity_per_unit: Decimal,
    pub required_quantity: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

impl From<mo_component::Model> for MoComponentView {
    fn from(model: mo_component::Model) -> Self {
        Self {
            total_cost: model.total_cost(),
            id: model.id,
            material_id: model.material_id,
            quantity_per_unit: model.quantity_per_unit,
            required_quantity: model.required_quantity,
            unit: model.unit,
            unit_cost: model.unit_cost,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManufacturingOrderDetail {
    #[serde(flatten)]
    pub order: ManufacturingOrderView,
    pub components: Vec<MoComponentView>,
    pub work_orders: Vec<WorkOrderView>,
    pub component_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManufacturingStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub overdue: u64,
    /// Mean progress across all orders, two decimals
    pub average_progress: Decimal,
}

type AppliedMovements = Vec<(material::Model, stock_ledger_entry::Model)>;

/// Service for manufacturing orders and their material flow
#[derive(Clone)]
pub struct ManufacturingService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    ledger: StockLedgerService,
    max_retries: u32,
}

impl ManufacturingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, max_retries: u32) -> Self {
        let ledger = StockLedgerService::new(db_pool.clone(), event_sender.clone(), max_retries);
        Self {
            db_pool,
            event_sender,
            ledger,
            max_retries,
        }
    }

    /// Creates a Draft order from an Active BOM, snapshotting its component requirements
    #[instrument(skip(self, input), fields(bom_id = %input.bom_id, quantity = %input.quantity))]
    pub async fn create_from_bom(
        &self,
        input: CreateManufacturingOrder,
    ) -> Result<ManufacturingOrderDetail, ServiceError> {
        input.validate()?;
        if input.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }
        ensure_storable(input.quantity, "quantity")?;
        let scheduled_start = input.scheduled_start.unwrap_or_else(Utc::now);
        if input.due_date < scheduled_start {
            return Err(ServiceError::ValidationError(
                "due date cannot be before the scheduled start".to_string(),
            ));
        }

        let (order, components) =
            retry_on_conflict(self.max_retries, "create_manufacturing_order", || {
                self.try_create(&input, scheduled_start)
            })
            .await?;

        counter!("shopfloor.manufacturing_orders.created", 1);
        info!(mo_id = %order.id, reference = %order.reference, "Manufacturing order created");
        self.event_sender
            .send_or_log(Event::ManufacturingOrderCreated(order.id))
            .await;

        Ok(Self::detail(order, components, Vec::new()))
    }

    async fn try_create(
        &self,
        input: &CreateManufacturingOrder,
        scheduled_start: DateTime<Utc>,
    ) -> Result<(manufacturing_order::Model, Vec<mo_component::Model>), ServiceError> {
        let txn = self.db_pool.begin().await?;

        let bom = find_bom(&txn, input.bom_id).await?;
        if bom.status != BomStatus::Active {
            return Err(ServiceError::InvalidState(format!(
                "BOM {} is {}; only active BOMs can be manufactured",
                bom.id, bom.status
            )));
        }

        let bom_components = BomComponentEntity::find()
            .filter(bom_component::Column::BomId.eq(bom.id))
            .order_by_asc(bom_component::Column::Position)
            .all(&txn)
            .await?;

        let year = Utc::now().year();
        let prefix = format!("MO-{}-", year);
        let issued = ManufacturingOrderEntity::find()
            .filter(manufacturing_order::Column::Reference.starts_with(&prefix))
            .count(&txn)
            .await?;
        let reference = format_reference(year, issued + 1);

        let inserted = manufacturing_order::ActiveModel {
            reference: Set(reference),
            bom_id: Set(bom.id),
            product_id: Set(bom.product_id),
            quantity: Set(input.quantity),
            status: Set(MoStatus::Draft),
            progress: Set(0),
            assignee: Set(input.assignee.clone()),
            scheduled_start: Set(scheduled_start),
            due_date: Set(input.due_date),
            actual_start: Set(None),
            actual_end: Set(None),
            materials_reserved: Set(false),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        let order = match inserted {
            Ok(order) => order,
            // another request took the same reference number
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(ServiceError::ConcurrentModification(bom.id));
            }
            Err(e) => return Err(e.into()),
        };

        let mut components = Vec::with_capacity(bom_components.len());
        for line in bom_components {
            let row = mo_component::ActiveModel {
                manufacturing_order_id: Set(order.id),
                material_id: Set(line.material_id),
                quantity_per_unit: Set(line.quantity),
                required_quantity: Set(required_quantity(line.quantity, order.quantity)?),
                unit: Set(line.unit),
                unit_cost: Set(line.unit_cost),
                position: Set(line.position),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            components.push(row);
        }

        txn.commit().await?;
        Ok((order, components))
    }

    /// Creates one Pending work order per BOM operation, in sequence order
    #[instrument(skip(self))]
    pub async fn generate_work_orders(&self, mo_id: Uuid) -> Result<Vec<WorkOrderView>, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = find_order(&txn, mo_id).await?;

        if order.status.is_terminal() {
            return Err(ServiceError::InvalidState(format!(
                "manufacturing order {} is {}",
                order.reference, order.status
            )));
        }

        let existing = WorkOrderEntity::find()
            .filter(work_order::Column::ManufacturingOrderId.eq(mo_id))
            .count(&txn)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "manufacturing order {} already has {} work orders",
                order.reference, existing
            )));
        }

        let operations = BomOperationEntity::find()
            .filter(bom_operation::Column::BomId.eq(order.bom_id))
            .order_by_asc(bom_operation::Column::Sequence)
            .all(&txn)
            .await?;
        if operations.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "BOM {} has no operations to generate work orders from",
                order.bom_id
            )));
        }

        // locks the order row so a concurrent cancel or second generation waits on us
        let claimed = ManufacturingOrderEntity::update_many()
            .col_expr(manufacturing_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(manufacturing_order::Column::Id.eq(mo_id))
            .filter(manufacturing_order::Column::Status.eq(order.status))
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "manufacturing order {} changed while generating work orders",
                order.reference
            )));
        }

        let mut created = Vec::with_capacity(operations.len());
        for (idx, operation) in operations.into_iter().enumerate() {
            let wo = work_order::ActiveModel {
                reference: Set(format!("{}-WO{:02}", order.reference, idx + 1)),
                manufacturing_order_id: Set(order.id),
                operation_name: Set(operation.name),
                work_center_id: Set(operation.work_center_id),
                sequence: Set(operation.sequence),
                expected_duration_minutes: Set(operation.duration_minutes),
                real_duration_minutes: Set(None),
                status: Set(WorkOrderStatus::Pending),
                quality_check_required: Set(operation.quality_check_required),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(format!(
                    "work orders for {} were generated concurrently",
                    order.reference
                )),
                _ => e.into(),
            })?;
            created.push(wo);
        }

        txn.commit().await?;

        info!(mo_id = %mo_id, count = created.len(), "Work orders generated");
        self.event_sender
            .send_or_log(Event::WorkOrdersGenerated {
                mo_id,
                count: created.len(),
            })
            .await;

        Ok(created.into_iter().map(Into::into).collect())
    }

    /// Reserves every component requirement, all or nothing
    #[instrument(skip(self))]
    pub async fn reserve_materials(&self, mo_id: Uuid) -> Result<ManufacturingOrderView, ServiceError> {
        let (order, applied, previous) =
            retry_on_conflict(self.max_retries, "reserve_materials", || self.try_reserve(mo_id))
                .await?;

        counter!("shopfloor.manufacturing_orders.reserved", 1);
        info!(mo_id = %mo_id, components = applied.len(), "Materials reserved");
        for (material, entry) in &applied {
            self.ledger.notify_movement(material, entry).await;
        }
        self.event_sender
            .send_or_log(Event::MaterialsReserved(mo_id))
            .await;
        self.notify_status(mo_id, previous, order.status).await;

        Ok(order.into())
    }

    async fn try_reserve(
        &self,
        mo_id: Uuid,
    ) -> Result<(manufacturing_order::Model, AppliedMovements, MoStatus), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = find_order(&txn, mo_id).await?;

        if order.materials_reserved {
            return Err(ServiceError::Conflict(format!(
                "materials for {} are already reserved",
                order.reference
            )));
        }
        if order.status.is_terminal() {
            return Err(ServiceError::InvalidState(format!(
                "manufacturing order {} is {}",
                order.reference, order.status
            )));
        }

        let components = order_components(&txn, mo_id).await?;

        let mut shortages = Vec::new();
        let mut checked = Vec::with_capacity(components.len());
        for component in &components {
            let material = MaterialEntity::find_by_id(component.material_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Material", component.material_id))?;
            if material.available() < component.required_quantity {
                shortages.push(format!(
                    "{} requires {} but only {} available",
                    material.code,
                    component.required_quantity,
                    material.available()
                ));
            }
            checked.push(material);
        }
        if !shortages.is_empty() {
            warn!(mo_id = %mo_id, "Reservation refused: {}", shortages.join("; "));
            return Err(ServiceError::InsufficientStock(shortages.join("; ")));
        }

        // swap against the rows the availability check saw
        let mut applied = Vec::with_capacity(components.len());
        for (component, material) in components.iter().zip(checked) {
            let movement = StockMovement::new(
                component.material_id,
                MovementType::Reserve,
                component.required_quantity,
                order.reference.clone(),
                ReferenceType::ManufacturingOrder,
            );
            applied.push(apply_movement_to(&txn, material, &movement).await?);
        }

        let next_status = if order.status == MoStatus::Draft {
            MoStatus::Confirmed
        } else {
            order.status
        };
        let now = Utc::now();
        let result = ManufacturingOrderEntity::update_many()
            .col_expr(manufacturing_order::Column::MaterialsReserved, Expr::value(true))
            .col_expr(manufacturing_order::Column::Status, Expr::value(next_status))
            .col_expr(manufacturing_order::Column::UpdatedAt, Expr::value(now))
            .filter(manufacturing_order::Column::Id.eq(mo_id))
            .filter(manufacturing_order::Column::MaterialsReserved.eq(false))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(mo_id));
        }

        txn.commit().await?;

        let previous = order.status;
        let updated = manufacturing_order::Model {
            materials_reserved: true,
            status: next_status,
            updated_at: now,
            ..order
        };
        Ok((updated, applied, previous))
    }

    /// Consumes the reservation, receives the finished goods and closes the order
    #[instrument(skip(self))]
    pub async fn complete(&self, mo_id: Uuid) -> Result<ManufacturingOrderView, ServiceError> {
        let (order, applied, previous) =
            retry_on_conflict(self.max_retries, "complete_manufacturing_order", || {
                self.try_complete(mo_id)
            })
            .await?;

        counter!("shopfloor.manufacturing_orders.completed", 1);
        info!(mo_id = %mo_id, reference = %order.reference, "Manufacturing order completed");
        for (material, entry) in &applied {
            self.ledger.notify_movement(material, entry).await;
        }
        self.notify_status(mo_id, previous, MoStatus::Done).await;
        self.event_sender
            .send_or_log(Event::ManufacturingOrderCompleted(mo_id))
            .await;

        Ok(order.into())
    }

    async fn try_complete(
        &self,
        mo_id: Uuid,
    ) -> Result<(manufacturing_order::Model, AppliedMovements, MoStatus), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = find_order(&txn, mo_id).await?;

        if !order.status.can_complete() {
            return Err(ServiceError::InvalidState(format!(
                "manufacturing order {} is {} and cannot be completed",
                order.reference, order.status
            )));
        }

        let work_orders = WorkOrderEntity::find()
            .filter(work_order::Column::ManufacturingOrderId.eq(mo_id))
            .all(&txn)
            .await?;
        if work_orders.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "manufacturing order {} has no work orders",
                order.reference
            )));
        }
        let open: Vec<&str> = work_orders
            .iter()
            .filter(|wo| wo.status != WorkOrderStatus::Completed)
            .map(|wo| wo.reference.as_str())
            .collect();
        if !open.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "work orders not completed: {}",
                open.join(", ")
            )));
        }

        let components = order_components(&txn, mo_id).await?;
        if !components.is_empty() && !order.materials_reserved {
            return Err(ServiceError::InvalidState(format!(
                "materials for {} must be reserved before completion",
                order.reference
            )));
        }

        let mut applied = Vec::with_capacity(components.len() * 2 + 1);
        for component in &components {
            for movement_type in [MovementType::Release, MovementType::Out] {
                let movement = StockMovement::new(
                    component.material_id,
                    movement_type,
                    component.required_quantity,
                    order.reference.clone(),
                    ReferenceType::ManufacturingOrder,
                );
                applied.push(apply_movement(&txn, &movement).await?);
            }
        }
        let receipt = StockMovement::new(
            order.product_id,
            MovementType::In,
            order.quantity,
            order.reference.clone(),
            ReferenceType::ManufacturingOrder,
        );
        applied.push(apply_movement(&txn, &receipt).await?);

        let now = Utc::now();
        let result = ManufacturingOrderEntity::update_many()
            .col_expr(manufacturing_order::Column::Status, Expr::value(MoStatus::Done))
            .col_expr(manufacturing_order::Column::Progress, Expr::value(100))
            .col_expr(manufacturing_order::Column::ActualEnd, Expr::value(Some(now)))
            .col_expr(manufacturing_order::Column::UpdatedAt, Expr::value(now))
            .filter(manufacturing_order::Column::Id.eq(mo_id))
            .filter(manufacturing_order::Column::Status.eq(order.status))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(mo_id));
        }

        txn.commit().await?;

        let previous = order.status;
        let updated = manufacturing_order::Model {
            status: MoStatus::Done,
            progress: 100,
            actual_end: Some(now),
            updated_at: now,
            ..order
        };
        Ok((updated, applied, previous))
    }

    /// Explicit status change; cancelling releases reserved stock and cancels open work orders
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        mo_id: Uuid,
        status: MoStatus,
    ) -> Result<ManufacturingOrderView, ServiceError> {
        if status == MoStatus::Done {
            return Err(ServiceError::InvalidState(
                "orders reach done only through completion".to_string(),
            ));
        }

        let (order, applied, previous) =
            retry_on_conflict(self.max_retries, "update_manufacturing_order_status", || {
                self.try_update_status(mo_id, status)
            })
            .await?;

        for (material, entry) in &applied {
            self.ledger.notify_movement(material, entry).await;
        }
        self.notify_status(mo_id, previous, order.status).await;

        Ok(order.into())
    }

    async fn try_update_status(
        &self,
        mo_id: Uuid,
        status: MoStatus,
    ) -> Result<(manufacturing_order::Model, AppliedMovements, MoStatus), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = find_order(&txn, mo_id).await?;

        if !order.status.can_transition_to(status) {
            return Err(ServiceError::InvalidState(format!(
                "cannot move manufacturing order {} from {} to {}",
                order.reference, order.status, status
            )));
        }

        let mut applied = Vec::new();
        let mut reserved = order.materials_reserved;
        let mut actual_start = order.actual_start;
        let now = Utc::now();

        match status {
            MoStatus::Cancelled => {
                if order.materials_reserved {
                    for component in order_components(&txn, mo_id).await? {
                        let movement = StockMovement::new(
                            component.material_id,
                            MovementType::Release,
                            component.required_quantity,
                            order.reference.clone(),
                            ReferenceType::ManufacturingOrder,
                        )
                        .with_note("order cancelled");
                        applied.push(apply_movement(&txn, &movement).await?);
                    }
                    reserved = false;
                }
                cancel_open_work_orders(&txn, mo_id, now).await?;
            }
            MoStatus::InProgress if actual_start.is_none() => actual_start = Some(now),
            _ => {}
        }

        let result = ManufacturingOrderEntity::update_many()
            .col_expr(manufacturing_order::Column::Status, Expr::value(status))
            .col_expr(manufacturing_order::Column::MaterialsReserved, Expr::value(reserved))
            .col_expr(manufacturing_order::Column::ActualStart, Expr::value(actual_start))
            .col_expr(manufacturing_order::Column::UpdatedAt, Expr::value(now))
            .filter(manufacturing_order::Column::Id.eq(mo_id))
            .filter(manufacturing_order::Column::Status.eq(order.status))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(mo_id));
        }

        txn.commit().await?;

        let previous = order.status;
        let updated = manufacturing_order::Model {
            status,
            materials_reserved: reserved,
            actual_start,
            updated_at: now,
            ..order
        };
        Ok((updated, applied, previous))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, mo_id: Uuid) -> Result<ManufacturingOrderDetail, ServiceError> {
        let db = &*self.db_pool;
        let order = find_order(db, mo_id).await?;
        let components = order_components(db, mo_id).await?;
        let work_orders = WorkOrderEntity::find()
            .filter(work_order::Column::ManufacturingOrderId.eq(mo_id))
            .order_by_asc(work_order::Column::Sequence)
            .all(db)
            .await?;

        Ok(Self::detail(order, components, work_orders))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ManufacturingOrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ManufacturingOrderView>, u64), ServiceError> {
        let mut query = ManufacturingOrderEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(manufacturing_order::Column::Status.eq(status));
        }
        if let Some(assignee) = filter.assignee {
            query = query.filter(manufacturing_order::Column::Assignee.eq(assignee));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(manufacturing_order::Column::ProductId.eq(product_id));
        }

        let paginator = query
            .order_by_desc(manufacturing_order::Column::CreatedAt)
            .order_by_desc(manufacturing_order::Column::Reference)
            .paginate(&*self.db_pool, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.max(1) - 1).await?;

        Ok((orders.into_iter().map(Into::into).collect(), total))
    }

    /// Counts per status, overdue orders and mean progress
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<ManufacturingStats, ServiceError> {
        let orders = ManufacturingOrderEntity::find().all(&*self.db_pool).await?;
        let now = Utc::now();

        let mut by_status = BTreeMap::new();
        let mut overdue = 0;
        let mut progress_sum = Decimal::ZERO;
        for order in &orders {
            *by_status.entry(order.status.to_string()).or_insert(0) += 1;
            if order.is_overdue(now) {
                overdue += 1;
            }
            progress_sum += Decimal::from(order.progress);
        }

        let total = orders.len() as u64;
        let average_progress = if total == 0 {
            Decimal::ZERO
        } else {
            (progress_sum / Decimal::from(total)).round_dp(2)
        };

        Ok(ManufacturingStats {
            total,
            by_status,
            overdue,
            average_progress,
        })
    }

    async fn notify_status(&self, mo_id: Uuid, old: MoStatus, new: MoStatus) {
        if old == new {
            return;
        }
        self.event_sender
            .send_or_log(Event::ManufacturingOrderStatusChanged {
                mo_id,
                old_status: old.to_string(),
                new_status: new.to_string(),
            })
            .await;
    }

    fn detail(
        order: manufacturing_order::Model,
        components: Vec<mo_component::Model>,
        work_orders: Vec<work_order::Model>,
    ) -> ManufacturingOrderDetail {
        let component_cost = components.iter().map(|c| c.total_cost()).sum();
        ManufacturingOrderDetail {
            order: order.into(),
            components: components.into_iter().map(Into::into).collect(),
            work_orders: work_orders.into_iter().map(Into::into).collect(),
            component_cost,
        }
    }
}

pub(crate) async fn find_order<C: ConnectionTrait>(
    conn: &C,
    mo_id: Uuid,
) -> Result<manufacturing_order::Model, ServiceError> {
    ManufacturingOrderEntity::find_by_id(mo_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Manufacturing order", mo_id))
}

async fn order_components<C: ConnectionTrait>(
    conn: &C,
    mo_id: Uuid,
) -> Result<Vec<mo_component::Model>, ServiceError> {
    Ok(MoComponentEntity::find()
        .filter(mo_component::Column::ManufacturingOrderId.eq(mo_id))
        .order_by_asc(mo_component::Column::Position)
        .all(conn)
        .await?)
}

async fn cancel_open_work_orders(
    txn: &DatabaseTransaction,
    mo_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64, ServiceError> {
    let result = WorkOrderEntity::update_many()
        .col_expr(work_order::Column::Status, Expr::value(WorkOrderStatus::Cancelled))
        .col_expr(work_order::Column::UpdatedAt, Expr::value(now))
        .filter(work_order::Column::ManufacturingOrderId.eq(mo_id))
        .filter(work_order::Column::Status.is_in([
            WorkOrderStatus::Pending,
            WorkOrderStatus::InProgress,
            WorkOrderStatus::Paused,
        ]))
        .exec(txn)
        .await?;
    Ok(result.rows_affected)
}

/// Re-derives progress from the order's work orders.
///
/// Runs inside the caller's transaction. Once every work order is completed an
/// In Progress order moves to To Close.
pub(crate) async fn recompute_progress<C: ConnectionTrait>(
    conn: &C,
    mo_id: Uuid,
) -> Result<(manufacturing_order::Model, MoStatus), ServiceError> {
    let order = find_order(conn, mo_id).await?;
    let work_orders = WorkOrderEntity::find()
        .filter(work_order::Column::ManufacturingOrderId.eq(mo_id))
        .all(conn)
        .await?;

    let total = work_orders.len() as u64;
    let completed = work_orders
        .iter()
        .filter(|wo| wo.status == WorkOrderStatus::Completed)
        .count() as u64;
    let progress = progress_percent(completed, total);

    let previous = order.status;
    let status = if total > 0 && completed == total && order.status == MoStatus::InProgress {
        MoStatus::ToClose
    } else {
        order.status
    };

    if progress == order.progress && status == order.status {
        return Ok((order, previous));
    }

    let mut active: manufacturing_order::ActiveModel = order.into();
    active.progress = Set(progress);
    active.status = Set(status);
    let updated = active.update(conn).await?;
    Ok((updated, previous))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn required_quantity_scales_with_order() {
        assert_eq!(required_quantity(dec!(5), dec!(10)).unwrap(), dec!(50));
        assert_eq!(required_quantity(dec!(0.25), dec!(8)).unwrap(), dec!(2));
    }

    #[test]
    fn oversized_requirements_are_rejected() {
        assert_matches!(
            required_quantity(dec!(1000), Decimal::MAX),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            required_quantity(dec!(1000), dec!(10000000000)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn progress_rounds_half_up() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(1, 2), 50);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
    }

    #[test]
    fn reference_is_zero_padded() {
        assert_eq!(format_reference(2026, 1), "MO-2026-0001");
        assert_eq!(format_reference(2026, 12345), "MO-2026-12345");
    }
}
