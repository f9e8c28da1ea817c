use crate::{
    db::DbPool,
    entities::manufacturing::{
        material::{self, Entity as MaterialEntity},
        stock_ledger_entry::{MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock_ledger::{
        apply_movement, ensure_storable, record, retry_on_conflict, StockLedgerService, StockMovement,
        StockTransactionResult,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMaterial {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub unit: String,
    #[serde(default)]
    pub initial_on_hand: Decimal,
    #[serde(default)]
    pub reorder_level: Decimal,
    #[serde(default)]
    pub average_cost: Decimal,
}

/// Descriptive fields only; stock levels move through the ledger.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMaterial {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub unit: Option<String>,
    pub reorder_level: Option<Decimal>,
    pub average_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AdjustStock {
    /// Signed delta: positive receives stock, negative consumes it
    pub delta: Decimal,
    #[validate(length(min = 1, max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialView {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub on_hand: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
    pub reorder_level: Decimal,
    pub average_cost: Decimal,
    pub low_stock: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<material::Model> for MaterialView {
    fn from(model: material::Model) -> Self {
        Self {
            available: model.available(),
            low_stock: model.is_low_stock(),
            id: model.id,
            code: model.code,
            name: model.name,
            unit: model.unit,
            on_hand: model.on_hand,
            reserved: model.reserved,
            reorder_level: model.reorder_level,
            average_cost: model.average_cost,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Material catalogue and direct stock adjustments
#[derive(Clone)]
pub struct MaterialService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    ledger: StockLedgerService,
    max_retries: u32,
}

impl MaterialService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, max_retries: u32) -> Self {
        let ledger = StockLedgerService::new(db_pool.clone(), event_sender.clone(), max_retries);
        Self {
            db_pool,
            event_sender,
            ledger,
            max_retries,
        }
    }

    /// Creates a material; a non-zero opening balance is booked as an IN entry.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: CreateMaterial) -> Result<MaterialView, ServiceError> {
        input.validate()?;
        if input.initial_on_hand < Decimal::ZERO
            || input.reorder_level < Decimal::ZERO
            || input.average_cost < Decimal::ZERO
        {
            return Err(ServiceError::ValidationError(
                "stock levels and costs cannot be negative".to_string(),
            ));
        }
        ensure_storable(input.initial_on_hand, "initial_on_hand")?;
        ensure_storable(input.reorder_level, "reorder_level")?;
        ensure_storable(input.average_cost, "average_cost")?;

        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let duplicate = MaterialEntity::find()
            .filter(material::Column::Code.eq(input.code.clone()))
            .one(&txn)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "material code {} already exists",
                input.code
            )));
        }

        let model = material::ActiveModel {
            code: Set(input.code.clone()),
            name: Set(input.name),
            unit: Set(input.unit),
            on_hand: Set(input.initial_on_hand),
            reserved: Set(Decimal::ZERO),
            reorder_level: Set(input.reorder_level),
            average_cost: Set(input.average_cost),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if input.initial_on_hand > Decimal::ZERO {
            record(
                &txn,
                &StockMovement::new(
                    model.id,
                    MovementType::In,
                    input.initial_on_hand,
                    model.code.clone(),
                    ReferenceType::OpeningBalance,
                ),
            )
            .await?;
        }

        txn.commit().await?;

        info!(material_id = %model.id, code = %model.code, "Material created");
        self.event_sender
            .send_or_log(Event::MaterialCreated(model.id))
            .await;

        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<MaterialView, ServiceError> {
        Ok(self.find(id).await?.into())
    }

    async fn find(&self, id: Uuid) -> Result<material::Model, ServiceError> {
        MaterialEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", id))
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateMaterial) -> Result<MaterialView, ServiceError> {
        input.validate()?;
        if input.reorder_level.is_some_and(|v| v < Decimal::ZERO)
            || input.average_cost.is_some_and(|v| v < Decimal::ZERO)
        {
            return Err(ServiceError::ValidationError(
                "reorder level and average cost cannot be negative".to_string(),
            ));
        }
        for value in [input.reorder_level, input.average_cost].into_iter().flatten() {
            ensure_storable(value, "material field")?;
        }

        let existing = self.find(id).await?;
        let mut active: material::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(unit) = input.unit {
            active.unit = Set(unit);
        }
        if let Some(level) = input.reorder_level {
            active.reorder_level = Set(level);
        }
        if let Some(cost) = input.average_cost {
            active.average_cost = Set(cost);
        }

        let updated = active.update(&*self.db_pool).await?;
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
        search: Option<String>,
    ) -> Result<(Vec<MaterialView>, u64), ServiceError> {
        let mut query = MaterialEntity::find();
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            query = query.filter(
                material::Column::Code
                    .contains(term.trim())
                    .or(material::Column::Name.contains(term.trim())),
            );
        }

        let paginator = query
            .order_by_asc(material::Column::Code)
            .paginate(&*self.db_pool, per_page.max(1));
        let total = paginator.num_items().await?;
        let materials = paginator.fetch_page(page.max(1) - 1).await?;

        Ok((materials.into_iter().map(Into::into).collect(), total))
    }

    /// Books a signed stock correction as a single IN or OUT movement.
    #[instrument(skip(self, input), fields(delta = %input.delta))]
    pub async fn adjust(
        &self,
        id: Uuid,
        input: AdjustStock,
    ) -> Result<StockTransactionResult, ServiceError> {
        input.validate()?;
        if input.delta.is_zero() {
            return Err(ServiceError::ValidationError(
                "adjustment delta must not be zero".to_string(),
            ));
        }

        let (movement_type, quantity) = if input.delta > Decimal::ZERO {
            (MovementType::In, input.delta)
        } else {
            (MovementType::Out, -input.delta)
        };

        let mut movement = StockMovement::new(
            id,
            movement_type,
            quantity,
            format!("ADJ-{}", Utc::now().format("%Y%m%d%H%M%S")),
            ReferenceType::Adjustment,
        );
        if let Some(reason) = input.reason {
            movement = movement.with_note(reason);
        }

        let (material, entry) = retry_on_conflict(self.max_retries, "adjust_stock", || async {
            let txn = self.db_pool.begin().await?;
            let applied = apply_movement(&txn, &movement).await?;
            txn.commit().await?;
            Ok(applied)
        })
        .await?;

        info!(material = %material.code, movement = %movement_type, %quantity, "Stock adjusted");
        self.ledger.notify_movement(&material, &entry).await;

        Ok(StockTransactionResult {
            material: material.into(),
            entry: entry.into(),
        })
    }
}
