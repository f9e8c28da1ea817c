use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stock-keeping record for a raw material, component or finished product.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    pub unit: String,
    pub on_hand: Decimal,
    pub reserved: Decimal,
    pub reorder_level: Decimal,
    pub average_cost: Decimal,
    /// Bumped on every stock mutation; guards compare-and-swap updates.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_ledger_entry::Entity")]
    LedgerEntries,
}

impl Related<super::stock_ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = self.id {
                self.id = ActiveValue::Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = self.created_at {
                self.created_at = ActiveValue::Set(now);
            }
            if let ActiveValue::NotSet = self.version {
                self.version = ActiveValue::Set(1);
            }
            if let ActiveValue::NotSet = self.reserved {
                self.reserved = ActiveValue::Set(Decimal::ZERO);
            }
        }

        self.updated_at = ActiveValue::Set(now);

        Ok(self)
    }
}

impl Model {
    /// Stock that is neither consumed nor earmarked for an order.
    pub fn available(&self) -> Decimal {
        self.on_hand - self.reserved
    }

    pub fn is_low_stock(&self) -> bool {
        self.available() <= self.reorder_level
    }
}
