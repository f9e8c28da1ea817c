use crate::{
    db::DbPool,
    entities::manufacturing::{
        manufacturing_order::{self, Entity as ManufacturingOrderEntity, MoStatus},
        work_center::Entity as WorkCenterEntity,
        work_order::{self, Entity as WorkOrderEntity, WorkOrderStatus},
        work_order_comment::{self, Entity as WorkOrderCommentEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::manufacturing::{find_order, recompute_progress},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkOrderView {
    pub id: Uuid,
    pub reference: String,
    pub manufacturing_order_id: Uuid,
    pub operation_name: String,
    pub work_center_id: Uuid,
    pub sequence: i32,
    pub status: WorkOrderStatus,
    pub expected_duration_minutes: i32,
    pub real_duration_minutes: Option<i32>,
    pub quality_check_required: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub active_seconds: i64,
    pub paused_seconds: i64,
    pub quality_check: Option<QualityCheckView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QualityCheckView {
    pub passed: bool,
    pub notes: Option<String>,
    pub inspector: Option<String>,
}

impl From<work_order::Model> for WorkOrderView {
    fn from(model: work_order::Model) -> Self {
        let quality_check = model.qc_passed.map(|passed| QualityCheckView {
            passed,
            notes: model.qc_notes.clone(),
            inspector: model.qc_inspector.clone(),
        });
        Self {
            id: model.id,
            reference: model.reference,
            manufacturing_order_id: model.manufacturing_order_id,
            operation_name: model.operation_name,
            work_center_id: model.work_center_id,
            sequence: model.sequence,
            status: model.status,
            expected_duration_minutes: model.expected_duration_minutes,
            real_duration_minutes: model.real_duration_minutes,
            quality_check_required: model.quality_check_required,
            start_time: model.start_time,
            end_time: model.end_time,
            paused_at: model.paused_at,
            active_seconds: model.active_seconds,
            paused_seconds: model.paused_seconds,
            quality_check,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentView {
    pub id: Uuid,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<work_order_comment::Model> for CommentView {
    fn from(model: work_order_comment::Model) -> Self {
        Self {
            id: model.id,
            author: model.author,
            text: model.text,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkOrderDetail {
    #[serde(flatten)]
    pub work_order: WorkOrderView,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct QualityCheckInput {
    pub passed: bool,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub inspector: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CompleteWorkOrder {
    /// Minutes actually spent; defaults to the tracked active time
    #[validate(range(min = 0))]
    pub real_duration_minutes: Option<i32>,
    #[validate]
    pub quality_check: Option<QualityCheckInput>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddComment {
    #[validate(length(min = 1, max = 4000))]
    pub text: String,
    #[validate(length(min = 1, max = 255))]
    pub author: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkOrderFilter {
    pub manufacturing_order_id: Option<Uuid>,
    pub status: Option<WorkOrderStatus>,
    pub work_center_id: Option<Uuid>,
}

/// Whole minutes from tracked seconds, rounded to the nearest minute.
pub fn tracked_minutes(active_seconds: i64) -> i32 {
    let minutes = (active_seconds.max(0) + 30) / 60;
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

fn elapsed_seconds(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    since
        .map(|t| (now - t).num_seconds().max(0))
        .unwrap_or_default()
}

/// Shop-floor execution of work orders
#[derive(Clone)]
pub struct WorkOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl WorkOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Starts or resumes a work order.
    ///
    /// Earlier operations of the same order must be finished first; a confirmed
    /// order is promoted to In Progress by its first started work order.
    #[instrument(skip(self))]
    pub async fn start(&self, wo_id: Uuid) -> Result<WorkOrderView, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let wo = find_work_order(&txn, wo_id).await?;
        ensure_transition(&wo, WorkOrderStatus::InProgress)?;

        let order = find_order(&txn, wo.manufacturing_order_id).await?;
        if !matches!(order.status, MoStatus::Confirmed | MoStatus::InProgress) {
            return Err(ServiceError::InvalidState(format!(
                "manufacturing order {} is {}; work can start once it is confirmed",
                order.reference, order.status
            )));
        }

        let blocking = WorkOrderEntity::find()
            .filter(work_order::Column::ManufacturingOrderId.eq(order.id))
            .filter(work_order::Column::Sequence.lt(wo.sequence))
            .filter(
                work_order::Column::Status
                    .is_not_in([WorkOrderStatus::Completed, WorkOrderStatus::Cancelled]),
            )
            .order_by_asc(work_order::Column::Sequence)
            .one(&txn)
            .await?;
        if let Some(blocking) = blocking {
            return Err(ServiceError::InvalidState(format!(
                "{} must be finished before {} can start",
                blocking.reference, wo.reference
            )));
        }

        let now = Utc::now();
        let promoted = order.status == MoStatus::Confirmed;
        if promoted {
            let result = ManufacturingOrderEntity::update_many()
                .col_expr(manufacturing_order::Column::Status, Expr::value(MoStatus::InProgress))
                .col_expr(
                    manufacturing_order::Column::ActualStart,
                    Expr::value(Some(order.actual_start.unwrap_or(now))),
                )
                .col_expr(manufacturing_order::Column::UpdatedAt, Expr::value(now))
                .filter(manufacturing_order::Column::Id.eq(order.id))
                .filter(manufacturing_order::Column::Status.eq(MoStatus::Confirmed))
                .exec(&txn)
                .await?;
            if result.rows_affected == 0 {
                return Err(ServiceError::Conflict(format!(
                    "manufacturing order {} changed while {} was starting",
                    order.reference, wo.reference
                )));
            }
        }

        let paused_for = elapsed_seconds(wo.paused_at, now);
        let first_start = wo.start_time.is_none();
        let mut active: work_order::ActiveModel = wo.clone().into();
        active.status = Set(WorkOrderStatus::InProgress);
        if first_start {
            active.start_time = Set(Some(now));
        }
        active.paused_seconds = Set(wo.paused_seconds + paused_for);
        active.paused_at = Set(None);
        active.last_resumed_at = Set(Some(now));
        let updated = update_if_unchanged(&txn, &wo, active).await?;

        txn.commit().await?;

        counter!("shopfloor.work_orders.started", 1);
        info!(wo_id = %wo_id, resumed = !first_start, "Work order started");
        if promoted {
            self.event_sender
                .send_or_log(Event::ManufacturingOrderStatusChanged {
                    mo_id: order.id,
                    old_status: MoStatus::Confirmed.to_string(),
                    new_status: MoStatus::InProgress.to_string(),
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::WorkOrderStarted(wo_id))
            .await;

        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn pause(&self, wo_id: Uuid) -> Result<WorkOrderView, ServiceError> {
        let db = &*self.db_pool;
        let wo = find_work_order(db, wo_id).await?;
        ensure_transition(&wo, WorkOrderStatus::Paused)?;

        let now = Utc::now();
        let worked = elapsed_seconds(wo.last_resumed_at, now);
        let mut active: work_order::ActiveModel = wo.clone().into();
        active.status = Set(WorkOrderStatus::Paused);
        active.active_seconds = Set(wo.active_seconds + worked);
        active.last_resumed_at = Set(None);
        active.paused_at = Set(Some(now));
        let updated = update_if_unchanged(db, &wo, active).await?;

        info!(wo_id = %wo_id, worked_seconds = worked, "Work order paused");
        self.event_sender
            .send_or_log(Event::WorkOrderPaused(wo_id))
            .await;

        Ok(updated.into())
    }

    /// Completes a running work order and refreshes its order's progress.
    ///
    /// A failed or missing required quality check leaves the work order running.
    #[instrument(skip(self, input))]
    pub async fn complete(
        &self,
        wo_id: Uuid,
        input: CompleteWorkOrder,
    ) -> Result<WorkOrderView, ServiceError> {
        input.validate()?;

        let txn = self.db_pool.begin().await?;
        let wo = find_work_order(&txn, wo_id).await?;
        ensure_transition(&wo, WorkOrderStatus::Completed)?;

        match &input.quality_check {
            None if wo.quality_check_required => {
                return Err(ServiceError::ValidationError(format!(
                    "{} requires a quality check before completion",
                    wo.reference
                )));
            }
            Some(qc) if !qc.passed => {
                return Err(ServiceError::ValidationError(format!(
                    "quality check for {} did not pass",
                    wo.reference
                )));
            }
            _ => {}
        }

        let now = Utc::now();
        let active_seconds = wo.active_seconds + elapsed_seconds(wo.last_resumed_at, now);
        let real_duration = input
            .real_duration_minutes
            .unwrap_or_else(|| tracked_minutes(active_seconds));

        let mut active: work_order::ActiveModel = wo.clone().into();
        active.status = Set(WorkOrderStatus::Completed);
        active.end_time = Set(Some(now));
        active.active_seconds = Set(active_seconds);
        active.last_resumed_at = Set(None);
        active.real_duration_minutes = Set(Some(real_duration));
        if let Some(qc) = input.quality_check {
            active.qc_passed = Set(Some(qc.passed));
            active.qc_notes = Set(qc.notes);
            active.qc_inspector = Set(qc.inspector);
        }
        let updated = update_if_unchanged(&txn, &wo, active).await?;

        let (order, previous) = recompute_progress(&txn, wo.manufacturing_order_id).await?;

        txn.commit().await?;

        counter!("shopfloor.work_orders.completed", 1);
        info!(
            wo_id = %wo_id,
            real_duration_minutes = real_duration,
            mo_progress = order.progress,
            "Work order completed"
        );
        self.event_sender
            .send_or_log(Event::WorkOrderCompleted(wo_id))
            .await;
        if previous != order.status {
            self.event_sender
                .send_or_log(Event::ManufacturingOrderStatusChanged {
                    mo_id: order.id,
                    old_status: previous.to_string(),
                    new_status: order.status.to_string(),
                })
                .await;
        }

        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, wo_id: Uuid) -> Result<WorkOrderView, ServiceError> {
        let db = &*self.db_pool;
        let wo = find_work_order(db, wo_id).await?;
        ensure_transition(&wo, WorkOrderStatus::Cancelled)?;

        let now = Utc::now();
        let worked = elapsed_seconds(wo.last_resumed_at, now);
        let mut active: work_order::ActiveModel = wo.clone().into();
        active.status = Set(WorkOrderStatus::Cancelled);
        active.active_seconds = Set(wo.active_seconds + worked);
        active.last_resumed_at = Set(None);
        active.end_time = Set(Some(now));
        let updated = update_if_unchanged(db, &wo, active).await?;

        info!(wo_id = %wo_id, "Work order cancelled");
        self.event_sender
            .send_or_log(Event::WorkOrderCancelled(wo_id))
            .await;

        Ok(updated.into())
    }

    #[instrument(skip(self, input))]
    pub async fn add_comment(&self, wo_id: Uuid, input: AddComment) -> Result<CommentView, ServiceError> {
        input.validate()?;
        if input.text.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "comment text cannot be blank".to_string(),
            ));
        }

        let db = &*self.db_pool;
        find_work_order(db, wo_id).await?;

        let comment = work_order_comment::ActiveModel {
            work_order_id: Set(wo_id),
            author: Set(input.author),
            text: Set(input.text),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(comment.into())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, wo_id: Uuid) -> Result<WorkOrderDetail, ServiceError> {
        let db = &*self.db_pool;
        let wo = find_work_order(db, wo_id).await?;
        let comments = WorkOrderCommentEntity::find()
            .filter(work_order_comment::Column::WorkOrderId.eq(wo_id))
            .order_by_asc(work_order_comment::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(WorkOrderDetail {
            work_order: wo.into(),
            comments: comments.into_iter().map(Into::into).collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: WorkOrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<WorkOrderView>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = WorkOrderEntity::find();
        if let Some(mo_id) = filter.manufacturing_order_id {
            query = query.filter(work_order::Column::ManufacturingOrderId.eq(mo_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(work_order::Column::Status.eq(status));
        }
        if let Some(work_center_id) = filter.work_center_id {
            if WorkCenterEntity::find_by_id(work_center_id).one(db).await?.is_none() {
                return Err(ServiceError::not_found("Work center", work_center_id));
            }
            query = query.filter(work_order::Column::WorkCenterId.eq(work_center_id));
        }

        let paginator = query
            .order_by_asc(work_order::Column::ManufacturingOrderId)
            .order_by_asc(work_order::Column::Sequence)
            .paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let work_orders = paginator.fetch_page(page.max(1) - 1).await?;

        Ok((work_orders.into_iter().map(Into::into).collect(), total))
    }
}

async fn find_work_order<C: ConnectionTrait>(
    conn: &C,
    wo_id: Uuid,
) -> Result<work_order::Model, ServiceError> {
    WorkOrderEntity::find_by_id(wo_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Work order", wo_id))
}

/// Writes `active` only while the row still carries the status `wo` was read with.
async fn update_if_unchanged<C: ConnectionTrait>(
    conn: &C,
    wo: &work_order::Model,
    mut active: work_order::ActiveModel,
) -> Result<work_order::Model, ServiceError> {
    active.updated_at = Set(Utc::now());
    let result = WorkOrderEntity::update_many()
        .set(active)
        .filter(work_order::Column::Id.eq(wo.id))
        .filter(work_order::Column::Status.eq(wo.status))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "work order {} was changed by another request",
            wo.reference
        )));
    }
    find_work_order(conn, wo.id).await
}

fn ensure_transition(wo: &work_order::Model, next: WorkOrderStatus) -> Result<(), ServiceError> {
    if wo.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "work order {} is {} and cannot move to {}",
            wo.reference, wo.status, next
        )))
    }
}
