use crate::{
    db::DbPool,
    entities::manufacturing::{
        material, material::Entity as MaterialEntity,
        stock_ledger_entry::{self, Entity as LedgerEntity, MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::materials::MaterialView,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Largest magnitude a quantity column can hold.
pub fn max_quantity() -> Decimal {
    dec!(999999999999.9999)
}

/// Rejects quantities that would not fit the quantity columns.
pub fn ensure_storable(value: Decimal, what: &str) -> Result<Decimal, ServiceError> {
    if value.abs() > max_quantity() {
        return Err(ServiceError::ValidationError(format!(
            "{} {} exceeds the supported maximum of {}",
            what,
            value,
            max_quantity()
        )));
    }
    Ok(value)
}

/// On-hand / reserved split of one material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockBalance {
    pub on_hand: Decimal,
    pub reserved: Decimal,
}

impl StockBalance {
    pub fn new(on_hand: Decimal, reserved: Decimal) -> Self {
        Self { on_hand, reserved }
    }

    pub fn available(&self) -> Decimal {
        self.on_hand - self.reserved
    }

    /// Applies a movement, refusing any result that breaks `on_hand >= reserved >= 0`.
    pub fn apply(&self, movement: MovementType, quantity: Decimal) -> Result<Self, ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "movement quantity must be positive, got {}",
                quantity
            )));
        }
        ensure_storable(quantity, "movement quantity")?;

        match movement {
            MovementType::In => {
                let on_hand = self
                    .on_hand
                    .checked_add(quantity)
                    .ok_or_else(|| ServiceError::ValidationError("on-hand quantity overflow".to_string()))?;
                Ok(Self::new(ensure_storable(on_hand, "resulting on-hand")?, self.reserved))
            }
            MovementType::Out | MovementType::Reserve if self.available() < quantity => {
                Err(ServiceError::InsufficientStock(format!(
                    "requested {} but only {} available",
                    quantity,
                    self.available()
                )))
            }
            MovementType::Out => Ok(Self::new(self.on_hand - quantity, self.reserved)),
            MovementType::Reserve => Ok(Self::new(self.on_hand, self.reserved + quantity)),
            MovementType::Release if self.reserved < quantity => {
                Err(ServiceError::InvalidState(format!(
                    "cannot release {} with only {} reserved",
                    quantity, self.reserved
                )))
            }
            MovementType::Release => Ok(Self::new(self.on_hand, self.reserved - quantity)),
        }
    }

    /// Folds ledger entries in order without re-checking invariants.
    pub fn replay<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (MovementType, Decimal)>,
    {
        entries
            .into_iter()
            .fold(Self::default(), |acc, (movement, quantity)| match movement {
                MovementType::In => Self::new(acc.on_hand + quantity, acc.reserved),
                MovementType::Out => Self::new(acc.on_hand - quantity, acc.reserved),
                MovementType::Reserve => Self::new(acc.on_hand, acc.reserved + quantity),
                MovementType::Release => Self::new(acc.on_hand, acc.reserved - quantity),
            })
    }
}

impl From<&material::Model> for StockBalance {
    fn from(model: &material::Model) -> Self {
        Self::new(model.on_hand, model.reserved)
    }
}

/// A single movement to apply against a material.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct StockMovement {
    pub material_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 255))]
    pub reference: String,
    #[serde(default = "default_reference_type")]
    pub reference_type: ReferenceType,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

fn default_reference_type() -> ReferenceType {
    ReferenceType::Manual
}

impl StockMovement {
    pub fn new(
        material_id: Uuid,
        movement_type: MovementType,
        quantity: Decimal,
        reference: impl Into<String>,
        reference_type: ReferenceType,
    ) -> Self {
        Self {
            material_id,
            movement_type,
            quantity,
            reference: reference.into(),
            reference_type,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntryView {
    pub id: i64,
    pub material_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub reference: String,
    pub reference_type: ReferenceType,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<stock_ledger_entry::Model> for LedgerEntryView {
    fn from(model: stock_ledger_entry::Model) -> Self {
        Self {
            id: model.id,
            material_id: model.material_id,
            movement_type: model.movement_type,
            quantity: model.quantity,
            reference: model.reference,
            reference_type: model.reference_type,
            note: model.note,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockTransactionResult {
    pub material: MaterialView,
    pub entry: LedgerEntryView,
}

/// Ledger replay compared with the live material record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceReport {
    pub material_id: Uuid,
    pub code: String,
    pub entry_count: u64,
    pub ledger: StockBalance,
    pub live: StockBalance,
    pub in_sync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationReport {
    pub materials_checked: u64,
    pub in_sync: bool,
    pub drifted: Vec<BalanceReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LowStockAlert {
    pub material_id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub on_hand: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
    pub reorder_level: Decimal,
    /// How far available stock sits below the reorder level (zero when exactly at it)
    pub shortfall: Decimal,
}

impl From<&material::Model> for LowStockAlert {
    fn from(model: &material::Model) -> Self {
        let available = model.available();
        Self {
            material_id: model.id,
            code: model.code.clone(),
            name: model.name.clone(),
            unit: model.unit.clone(),
            on_hand: model.on_hand,
            reserved: model.reserved,
            available,
            reorder_level: model.reorder_level,
            shortfall: (model.reorder_level - available).max(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LedgerFilter {
    pub material_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub reference: Option<String>,
}

/// Appends an entry and nothing else. The matching balance change is the caller's job.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    movement: &StockMovement,
) -> Result<stock_ledger_entry::Model, ServiceError> {
    let entry = stock_ledger_entry::ActiveModel {
        id: NotSet,
        material_id: Set(movement.material_id),
        movement_type: Set(movement.movement_type),
        quantity: Set(movement.quantity),
        reference: Set(movement.reference.clone()),
        reference_type: Set(movement.reference_type),
        note: Set(movement.note.clone()),
        created_at: Set(Utc::now()),
    };
    Ok(entry.insert(conn).await?)
}

/// Checks and applies one movement inside the caller's transaction.
///
/// The material row is updated with a compare-and-swap on `version`; a lost
/// race surfaces as [`ServiceError::ConcurrentModification`] so the whole
/// transaction can be rolled back and retried.
pub async fn apply_movement<C: ConnectionTrait>(
    conn: &C,
    movement: &StockMovement,
) -> Result<(material::Model, stock_ledger_entry::Model), ServiceError> {
    let current = MaterialEntity::find_by_id(movement.material_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Material", movement.material_id))?;

    apply_movement_to(conn, current, movement).await
}

/// Like [`apply_movement`], but checks and swaps against a material row the
/// caller already read, so a write that landed since then is detected.
pub async fn apply_movement_to<C: ConnectionTrait>(
    conn: &C,
    current: material::Model,
    movement: &StockMovement,
) -> Result<(material::Model, stock_ledger_entry::Model), ServiceError> {
    if current.id != movement.material_id {
        return Err(ServiceError::InternalError(format!(
            "movement for material {} applied to {}",
            movement.material_id, current.id
        )));
    }

    let next = StockBalance::from(&current)
        .apply(movement.movement_type, movement.quantity)
        .map_err(|e| match e {
            ServiceError::InsufficientStock(msg) => {
                ServiceError::InsufficientStock(format!("{}: {}", current.code, msg))
            }
            other => other,
        })?;

    let now = Utc::now();
    let result = MaterialEntity::update_many()
        .col_expr(material::Column::OnHand, Expr::value(next.on_hand))
        .col_expr(material::Column::Reserved, Expr::value(next.reserved))
        .col_expr(material::Column::Version, Expr::value(current.version + 1))
        .col_expr(material::Column::UpdatedAt, Expr::value(now))
        .filter(material::Column::Id.eq(current.id))
        .filter(material::Column::Version.eq(current.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        counter!("shopfloor.stock.version_conflicts", 1);
        return Err(ServiceError::ConcurrentModification(current.id));
    }

    let entry = record(conn, movement).await?;
    debug!(
        material = %current.code,
        movement = %movement.movement_type,
        quantity = %movement.quantity,
        "Stock movement applied"
    );

    let updated = material::Model {
        on_hand: next.on_hand,
        reserved: next.reserved,
        version: current.version + 1,
        updated_at: now,
        ..current
    };
    Ok((updated, entry))
}

/// Re-runs `operation` while it fails on an optimistic-lock conflict.
///
/// After `max_attempts` conflicting attempts the caller gets [`ServiceError::Conflict`].
pub async fn retry_on_conflict<F, Fut, T>(
    max_attempts: u32,
    operation: &'static str,
    mut attempt_fn: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match attempt_fn().await {
            Err(e) if e.is_retryable() => {
                if attempt >= max_attempts {
                    counter!("shopfloor.stock.retries_exhausted", 1, "operation" => operation);
                    warn!(operation, attempts = attempt, "Giving up after repeated stock conflicts");
                    return Err(ServiceError::Conflict(format!(
                        "{} lost {} consecutive stock update races; retry later",
                        operation, attempt
                    )));
                }
                debug!(operation, attempt, error = %e, "Retrying after stock conflict");
                tokio::time::sleep(Duration::from_millis(5 * u64::from(attempt))).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Service for reading and writing the append-only stock ledger
#[derive(Clone)]
pub struct StockLedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    max_retries: u32,
}

impl StockLedgerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, max_retries: u32) -> Self {
        Self {
            db_pool,
            event_sender,
            max_retries,
        }
    }

    /// Applies a movement with invariant checks and appends its ledger entry atomically.
    #[instrument(skip(self, movement), fields(material_id = %movement.material_id, movement = %movement.movement_type))]
    pub async fn record_transaction(
        &self,
        movement: StockMovement,
    ) -> Result<StockTransactionResult, ServiceError> {
        let (material, entry) =
            retry_on_conflict(self.max_retries, "record_transaction", || async {
                let txn = self.db_pool.begin().await?;
                let applied = apply_movement(&txn, &movement).await?;
                txn.commit().await?;
                Ok(applied)
            })
            .await?;

        counter!("shopfloor.stock.movements", 1, "type" => movement.movement_type.to_string());
        self.notify_movement(&material, &entry).await;

        Ok(StockTransactionResult {
            material: material.into(),
            entry: entry.into(),
        })
    }

    /// Emits the movement event plus a low-stock alert when the material dropped to its reorder level.
    pub(crate) async fn notify_movement(
        &self,
        material: &material::Model,
        entry: &stock_ledger_entry::Model,
    ) {
        self.event_sender
            .send_or_log(Event::StockMoved {
                material_id: material.id,
                movement: entry.movement_type,
                quantity: entry.quantity,
                reference: entry.reference.clone(),
            })
            .await;

        if matches!(entry.movement_type, MovementType::Out | MovementType::Reserve)
            && material.is_low_stock()
        {
            self.event_sender
                .send_or_log(Event::LowStock {
                    material_id: material.id,
                    available: material.available(),
                    reorder_level: material.reorder_level,
                })
                .await;
        }
    }

    /// Replays every entry of a material and compares it with the live record.
    #[instrument(skip(self))]
    pub async fn balance_for(&self, material_id: Uuid) -> Result<BalanceReport, ServiceError> {
        let db = &*self.db_pool;
        let material = MaterialEntity::find_by_id(material_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", material_id))?;

        let entries = LedgerEntity::find()
            .filter(stock_ledger_entry::Column::MaterialId.eq(material_id))
            .order_by_asc(stock_ledger_entry::Column::Id)
            .all(db)
            .await?;

        Ok(Self::compare(&material, &entries))
    }

    fn compare(material: &material::Model, entries: &[stock_ledger_entry::Model]) -> BalanceReport {
        let ledger = StockBalance::replay(entries.iter().map(|e| (e.movement_type, e.quantity)));
        let live = StockBalance::from(material);
        BalanceReport {
            material_id: material.id,
            code: material.code.clone(),
            entry_count: entries.len() as u64,
            ledger,
            live,
            in_sync: ledger == live,
        }
    }

    /// Replays the whole ledger and reports every material whose live balance drifted.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconciliationReport, ServiceError> {
        crate::tracing::with_timing("stock_ledger.reconcile", self.replay_all()).await
    }

    async fn replay_all(&self) -> Result<ReconciliationReport, ServiceError> {
        let db = &*self.db_pool;
        let materials = MaterialEntity::find()
            .order_by_asc(material::Column::Code)
            .all(db)
            .await?;
        let entries = LedgerEntity::find()
            .order_by_asc(stock_ledger_entry::Column::Id)
            .all(db)
            .await?;

        let mut by_material: HashMap<Uuid, Vec<stock_ledger_entry::Model>> = HashMap::new();
        for entry in entries {
            by_material.entry(entry.material_id).or_default().push(entry);
        }

        let drifted: Vec<BalanceReport> = materials
            .iter()
            .map(|m| {
                let entries = by_material.remove(&m.id).unwrap_or_default();
                Self::compare(m, &entries)
            })
            .filter(|report| !report.in_sync)
            .collect();

        if !drifted.is_empty() {
            warn!(count = drifted.len(), "Stock ledger drift detected");
        }

        Ok(ReconciliationReport {
            materials_checked: materials.len() as u64,
            in_sync: drifted.is_empty(),
            drifted,
        })
    }

    /// Lists ledger entries, oldest first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: LedgerFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<LedgerEntryView>, u64), ServiceError> {
        let mut query = LedgerEntity::find();
        if let Some(material_id) = filter.material_id {
            query = query.filter(stock_ledger_entry::Column::MaterialId.eq(material_id));
        }
        if let Some(movement_type) = filter.movement_type {
            query = query.filter(stock_ledger_entry::Column::MovementType.eq(movement_type));
        }
        if let Some(reference) = filter.reference {
            query = query.filter(stock_ledger_entry::Column::Reference.eq(reference));
        }

        let paginator = query
            .order_by_asc(stock_ledger_entry::Column::Id)
            .paginate(&*self.db_pool, per_page.max(1));
        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page.max(1) - 1).await?;

        Ok((entries.into_iter().map(Into::into).collect(), total))
    }

    /// Lists the movements of one material in replay order.
    pub async fn list_by_material(
        &self,
        material_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<LedgerEntryView>, u64), ServiceError> {
        let exists = MaterialEntity::find_by_id(material_id)
            .one(&*self.db_pool)
            .await?;
        if exists.is_none() {
            return Err(ServiceError::not_found("Material", material_id));
        }

        self.list(
            LedgerFilter {
                material_id: Some(material_id),
                ..Default::default()
            },
            page,
            per_page,
        )
        .await
    }

    /// Materials whose available stock is at or below their reorder level.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<LowStockAlert>, ServiceError> {
        let materials = MaterialEntity::find()
            .order_by_asc(material::Column::Code)
            .all(&*self.db_pool)
            .await?;

        Ok(materials
            .iter()
            .filter(|m| m.is_low_stock())
            .map(LowStockAlert::from)
            .collect())
    }
}
