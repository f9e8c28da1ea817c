use crate::{
    db::DbPool,
    entities::manufacturing::{
        bom::{self, BomStatus, Entity as BomEntity},
        bom_component::{self, Entity as BomComponentEntity},
        bom_operation::{self, Entity as BomOperationEntity},
        material::{self, Entity as MaterialEntity},
        work_center::Entity as WorkCenterEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock_ledger::ensure_storable,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Summary view returned when listing BOMs
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BomSummary {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub version: i32,
    pub status: BomStatus,
    pub estimated_cost: Decimal,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<bom::Model> for BomSummary {
    fn from(model: bom::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            name: model.name,
            version: model.version,
            status: model.status,
            estimated_cost: model.estimated_cost,
            approved_at: model.approved_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BomComponentView {
    pub id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub unit: String,
    pub waste_percent: Decimal,
    pub unit_cost: Decimal,
    pub line_cost: Decimal,
    pub position: i32,
}

impl From<bom_component::Model> for BomComponentView {
    fn from(model: bom_component::Model) -> Self {
        Self {
            line_cost: model.line_cost(),
            id: model.id,
            material_id: model.material_id,
            quantity: model.quantity,
            unit: model.unit,
            waste_percent: model.waste_percent,
            unit_cost: model.unit_cost,
            position: model.position,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BomOperationView {
    pub id: Uuid,
    pub sequence: i32,
    pub name: String,
    pub work_center_id: Uuid,
    pub duration_minutes: i32,
    pub setup_minutes: i32,
    pub teardown_minutes: i32,
    pub quality_check_required: bool,
}

impl From<bom_operation::Model> for BomOperationView {
    fn from(model: bom_operation::Model) -> Self {
        Self {
            id: model.id,
            sequence: model.sequence,
            name: model.name,
            work_center_id: model.work_center_id,
            duration_minutes: model.duration_minutes,
            setup_minutes: model.setup_minutes,
            teardown_minutes: model.teardown_minutes,
            quality_check_required: model.quality_check_required,
        }
    }
}

/// Detailed BOM view including components and routing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BomDetail {
    #[serde(flatten)]
    pub bom: BomSummary,
    pub notes: Option<String>,
    pub components: Vec<BomComponentView>,
    pub operations: Vec<BomOperationView>,
}

/// Input payload for creating a BOM
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBomInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate]
    pub components: Vec<BomComponentInput>,
    #[serde(default)]
    #[validate]
    pub operations: Vec<BomOperationInput>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BomComponentInput {
    pub material_id: Uuid,
    pub quantity: Decimal,
    /// Defaults to the material's stocking unit
    #[validate(length(min = 1, max = 32))]
    pub unit: Option<String>,
    #[serde(default)]
    pub waste_percent: Decimal,
    /// Defaults to the material's average cost
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BomOperationInput {
    pub sequence: i32,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub work_center_id: Uuid,
    pub duration_minutes: i32,
    #[serde(default)]
    pub setup_minutes: i32,
    #[serde(default)]
    pub teardown_minutes: i32,
    #[serde(default)]
    pub quality_check_required: bool,
}

/// `Σ quantity × unit_cost` over the component lines.
pub fn estimated_cost<'a, I>(lines: I) -> Result<Decimal, ServiceError>
where
    I: IntoIterator<Item = (&'a Decimal, &'a Decimal)>,
{
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |total, (quantity, unit_cost)| {
            quantity
                .checked_mul(*unit_cost)
                .and_then(|line| total.checked_add(line))
        })
        .ok_or_else(|| ServiceError::ValidationError("estimated cost overflows".to_string()))
}

/// Checks the parts of a BOM payload that need no database lookup.
pub fn validate_structure(input: &CreateBomInput) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for component in &input.components {
        if component.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "component {} quantity must be positive",
                component.material_id
            )));
        }
        ensure_storable(component.quantity, "component quantity")?;
        if let Some(unit_cost) = component.unit_cost {
            ensure_storable(unit_cost, "unit_cost")?;
        }
        if component.waste_percent < Decimal::ZERO || component.waste_percent > Decimal::ONE_HUNDRED
        {
            return Err(ServiceError::ValidationError(
                "waste_percent must be between 0 and 100".to_string(),
            ));
        }
        if component.unit_cost.is_some_and(|c| c < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "unit_cost cannot be negative".to_string(),
            ));
        }
        if component.material_id == input.product_id {
            return Err(ServiceError::ValidationError(
                "a product cannot be a component of itself".to_string(),
            ));
        }
        if !seen.insert(component.material_id) {
            return Err(ServiceError::ValidationError(format!(
                "material {} listed more than once",
                component.material_id
            )));
        }
    }

    let mut previous: Option<i32> = None;
    for operation in &input.operations {
        if operation.sequence <= 0 {
            return Err(ServiceError::ValidationError(
                "operation sequence must be positive".to_string(),
            ));
        }
        if previous.is_some_and(|p| operation.sequence <= p) {
            return Err(ServiceError::ValidationError(format!(
                "operation sequences must be unique and strictly increasing (got {} after {})",
                operation.sequence,
                previous.unwrap_or_default()
            )));
        }
        if operation.duration_minutes < 0
            || operation.setup_minutes < 0
            || operation.teardown_minutes < 0
        {
            return Err(ServiceError::ValidationError(format!(
                "operation {} durations cannot be negative",
                operation.sequence
            )));
        }
        previous = Some(operation.sequence);
    }

    Ok(())
}

/// Service for managing Bills of Materials
#[derive(Clone)]
pub struct BillOfMaterialsService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl BillOfMaterialsService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    fn connection(&self) -> &DbPool {
        &self.db_pool
    }

    /// Creates a Draft BOM revision for a product along with its components and routing
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn create_bom(&self, input: CreateBomInput) -> Result<BomDetail, ServiceError> {
        input.validate()?;
        validate_structure(&input)?;

        let txn = self.connection().begin().await?;

        let product = find_material(&txn, input.product_id).await?;

        let mut lines = Vec::with_capacity(input.components.len());
        for component in &input.components {
            let material = find_material(&txn, component.material_id).await?;
            lines.push((component, material));
        }

        for operation in &input.operations {
            WorkCenterEntity::find_by_id(operation.work_center_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Work center", operation.work_center_id))?;
        }

        let resolved: Vec<(Decimal, Decimal)> = lines
            .iter()
            .map(|(c, m)| (c.quantity, c.unit_cost.unwrap_or(m.average_cost)))
            .collect();
        let cost = estimated_cost(resolved.iter().map(|(q, c)| (q, c)))?;

        let previous_versions = BomEntity::find()
            .filter(bom::Column::ProductId.eq(product.id))
            .count(&txn)
            .await?;
        let version = i32::try_from(previous_versions + 1)
            .map_err(|_| ServiceError::InternalError("BOM version overflow".to_string()))?;

        let bom = bom::ActiveModel {
            product_id: Set(product.id),
            name: Set(input
                .name
                .clone()
                .unwrap_or_else(|| format!("{} BOM v{}", product.code, version))),
            version: Set(version),
            status: Set(BomStatus::Draft),
            estimated_cost: Set(cost),
            notes: Set(input.notes.clone()),
            approved_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(format!(
                "revision {} of product {} was created concurrently",
                version, product.id
            )),
            _ => e.into(),
        })?;

        let mut components = Vec::with_capacity(lines.len());
        for (position, ((component, material), (quantity, unit_cost))) in
            lines.iter().zip(resolved).enumerate()
        {
            let row = bom_component::ActiveModel {
                bom_id: Set(bom.id),
                material_id: Set(material.id),
                quantity: Set(quantity),
                unit: Set(component.unit.clone().unwrap_or_else(|| material.unit.clone())),
                waste_percent: Set(component.waste_percent),
                unit_cost: Set(unit_cost),
                position: Set(position as i32 + 1),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            components.push(row);
        }

        let mut operations = Vec::with_capacity(input.operations.len());
        for operation in &input.operations {
            let row = bom_operation::ActiveModel {
                bom_id: Set(bom.id),
                sequence: Set(operation.sequence),
                name: Set(operation.name.clone()),
                work_center_id: Set(operation.work_center_id),
                duration_minutes: Set(operation.duration_minutes),
                setup_minutes: Set(operation.setup_minutes),
                teardown_minutes: Set(operation.teardown_minutes),
                quality_check_required: Set(operation.quality_check_required),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            operations.push(row);
        }

        txn.commit().await?;

        info!(bom_id = %bom.id, version, estimated_cost = %cost, "BOM created");
        self.event_sender.send_or_log(Event::BomCreated(bom.id)).await;

        Ok(Self::detail(bom, components, operations))
    }

    /// Draft → Active; a product may only have one Active revision at a time
    #[instrument(skip(self))]
    pub async fn approve(&self, bom_id: Uuid) -> Result<BomSummary, ServiceError> {
        let txn = self.connection().begin().await?;
        let bom = find_bom(&txn, bom_id).await?;

        if !bom.status.can_transition_to(BomStatus::Active) {
            return Err(ServiceError::InvalidState(format!(
                "BOM {} is {} and cannot be approved",
                bom_id, bom.status
            )));
        }

        let active = BomEntity::find()
            .filter(bom::Column::ProductId.eq(bom.product_id))
            .filter(bom::Column::Status.eq(BomStatus::Active))
            .one(&txn)
            .await?;
        if let Some(active) = active {
            return Err(ServiceError::Conflict(format!(
                "product {} already has active BOM {} (v{})",
                bom.product_id, active.id, active.version
            )));
        }

        let previous = bom.status;
        let activated = BomEntity::update_many()
            .col_expr(bom::Column::Status, Expr::value(BomStatus::Active))
            .col_expr(bom::Column::ApprovedAt, Expr::value(Some(Utc::now())))
            .col_expr(bom::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(bom::Column::Id.eq(bom_id))
            .filter(bom::Column::Status.eq(previous))
            .exec(&txn)
            .await;
        match activated {
            Ok(result) if result.rows_affected == 0 => {
                return Err(ServiceError::Conflict(format!(
                    "BOM {} changed while it was being approved",
                    bom_id
                )));
            }
            Ok(_) => {}
            // another revision of the product was activated first
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(ServiceError::Conflict(format!(
                    "product {} already has an active BOM",
                    bom.product_id
                )));
            }
            Err(e) => return Err(e.into()),
        }
        let updated = find_bom(&txn, bom_id).await?;

        txn.commit().await?;

        info!(bom_id = %bom_id, "BOM approved");
        self.event_sender.send_or_log(Event::BomApproved(bom_id)).await;

        Ok(updated.into())
    }

    /// Active → Obsolete
    #[instrument(skip(self))]
    pub async fn mark_obsolete(&self, bom_id: Uuid) -> Result<BomSummary, ServiceError> {
        let db = self.connection();
        let bom = find_bom(db, bom_id).await?;

        if !bom.status.can_transition_to(BomStatus::Obsolete) {
            return Err(ServiceError::InvalidState(format!(
                "only active BOMs can be made obsolete; BOM {} is {}",
                bom_id, bom.status
            )));
        }

        let result = BomEntity::update_many()
            .col_expr(bom::Column::Status, Expr::value(BomStatus::Obsolete))
            .col_expr(bom::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(bom::Column::Id.eq(bom_id))
            .filter(bom::Column::Status.eq(bom.status))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "BOM {} changed while it was being made obsolete",
                bom_id
            )));
        }
        let updated = find_bom(db, bom_id).await?;

        info!(bom_id = %bom_id, "BOM marked obsolete");
        self.event_sender.send_or_log(Event::BomObsoleted(bom_id)).await;

        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn get_bom(&self, bom_id: Uuid) -> Result<BomDetail, ServiceError> {
        let db = self.connection();
        let bom = find_bom(db, bom_id).await?;

        let components = BomComponentEntity::find()
            .filter(bom_component::Column::BomId.eq(bom_id))
            .order_by_asc(bom_component::Column::Position)
            .all(db)
            .await?;
        let operations = BomOperationEntity::find()
            .filter(bom_operation::Column::BomId.eq(bom_id))
            .order_by_asc(bom_operation::Column::Sequence)
            .all(db)
            .await?;

        Ok(Self::detail(bom, components, operations))
    }

    /// Lists BOMs with optional product and status filters
    #[instrument(skip(self))]
    pub async fn list_boms(
        &self,
        page: u64,
        per_page: u64,
        product_id: Option<Uuid>,
        status: Option<BomStatus>,
    ) -> Result<(Vec<BomSummary>, u64), ServiceError> {
        let mut query = BomEntity::find();
        if let Some(product_id) = product_id {
            query = query.filter(bom::Column::ProductId.eq(product_id));
        }
        if let Some(status) = status {
            query = query.filter(bom::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_asc(bom::Column::ProductId)
            .order_by_desc(bom::Column::Version)
            .paginate(self.connection(), per_page.max(1));
        let total = paginator.num_items().await?;
        let boms = paginator.fetch_page(page.max(1) - 1).await?;

        Ok((boms.into_iter().map(Into::into).collect(), total))
    }

    fn detail(
        bom: bom::Model,
        components: Vec<bom_component::Model>,
        operations: Vec<bom_operation::Model>,
    ) -> BomDetail {
        BomDetail {
            notes: bom.notes.clone(),
            bom: bom.into(),
            components: components.into_iter().map(Into::into).collect(),
            operations: operations.into_iter().map(Into::into).collect(),
        }
    }
}

pub(crate) async fn find_bom<C: ConnectionTrait>(
    conn: &C,
    bom_id: Uuid,
) -> Result<bom::Model, ServiceError> {
    BomEntity::find_by_id(bom_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("BOM", bom_id))
}

async fn find_material<C: ConnectionTrait>(
    conn: &C,
    material_id: Uuid,
) -> Result<material::Model, ServiceError> {
    MaterialEntity::find_by_id(material_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Material", material_id))
}
