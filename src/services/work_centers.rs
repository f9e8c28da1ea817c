use crate::{
    db::DbPool,
    entities::manufacturing::work_center::{self, Entity as WorkCenterEntity, WorkCenterStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateWorkCenter {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub cost_per_hour: Decimal,
    #[serde(default)]
    pub capacity_per_hour: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWorkCenter {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub cost_per_hour: Option<Decimal>,
    pub capacity_per_hour: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkCenterView {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub status: WorkCenterStatus,
    pub cost_per_hour: Decimal,
    pub capacity_per_hour: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<work_center::Model> for WorkCenterView {
    fn from(model: work_center::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            status: model.status,
            cost_per_hour: model.cost_per_hour,
            capacity_per_hour: model.capacity_per_hour,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn ensure_non_negative(field: &str, value: Option<Decimal>) -> Result<(), ServiceError> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(ServiceError::ValidationError(format!(
            "{} cannot be negative",
            field
        ))),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct WorkCenterService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl WorkCenterService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: CreateWorkCenter) -> Result<WorkCenterView, ServiceError> {
        input.validate()?;
        ensure_non_negative("cost_per_hour", Some(input.cost_per_hour))?;
        ensure_non_negative("capacity_per_hour", Some(input.capacity_per_hour))?;

        let db = &*self.db_pool;
        let duplicate = WorkCenterEntity::find()
            .filter(work_center::Column::Code.eq(input.code.clone()))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "work center code {} already exists",
                input.code
            )));
        }

        let model = work_center::ActiveModel {
            code: Set(input.code),
            name: Set(input.name),
            status: Set(WorkCenterStatus::Active),
            cost_per_hour: Set(input.cost_per_hour),
            capacity_per_hour: Set(input.capacity_per_hour),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(work_center_id = %model.id, "Work center created");
        self.event_sender
            .send_or_log(Event::WorkCenterCreated(model.id))
            .await;

        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<WorkCenterView, ServiceError> {
        Ok(self.find(id).await?.into())
    }

    async fn find(&self, id: Uuid) -> Result<work_center::Model, ServiceError> {
        WorkCenterEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Work center", id))
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateWorkCenter,
    ) -> Result<WorkCenterView, ServiceError> {
        input.validate()?;
        ensure_non_negative("cost_per_hour", input.cost_per_hour)?;
        ensure_non_negative("capacity_per_hour", input.capacity_per_hour)?;

        let mut active: work_center::ActiveModel = self.find(id).await?.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(cost) = input.cost_per_hour {
            active.cost_per_hour = Set(cost);
        }
        if let Some(capacity) = input.capacity_per_hour {
            active.capacity_per_hour = Set(capacity);
        }

        Ok(active.update(&*self.db_pool).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: WorkCenterStatus,
    ) -> Result<WorkCenterView, ServiceError> {
        let existing = self.find(id).await?;
        let previous = existing.status;

        let mut active: work_center::ActiveModel = existing.into();
        active.status = Set(status);
        let updated = active.update(&*self.db_pool).await?;

        info!(work_center_id = %id, from = %previous, to = %status, "Work center status changed");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
        status: Option<WorkCenterStatus>,
    ) -> Result<(Vec<WorkCenterView>, u64), ServiceError> {
        let mut query = WorkCenterEntity::find();
        if let Some(status) = status {
            query = query.filter(work_center::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_asc(work_center::Column::Code)
            .paginate(&*self.db_pool, per_page.max(1));
        let total = paginator.num_items().await?;
        let centers = paginator.fetch_page(page.max(1) - 1).await?;

        Ok((centers.into_iter().map(Into::into).collect(), total))
    }
}
