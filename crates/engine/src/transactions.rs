//! Settlement transactions.
//!
//! A `Transaction` records a payment a user made toward what they owe on one
//! bill. It is append-only.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Money, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub amount: Money,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        bill_id: Uuid,
        amount: Money,
        recorded_by: Uuid,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "settlement amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            bill_id,
            amount,
            recorded_by,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub bill_id: Uuid,
    pub amount_minor: i64,
    pub recorded_by: Uuid,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bills::Entity",
        from = "Column::BillId",
        to = "super::bills::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Bills,
}

impl Related<super::bills::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bills.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id),
            bill_id: ActiveValue::Set(tx.bill_id),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            recorded_by: ActiveValue::Set(tx.recorded_by),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl From<Model> for Transaction {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            bill_id: model.bill_id,
            amount: Money::new(model.amount_minor),
            recorded_by: model.recorded_by,
            created_at: model.created_at,
        }
    }
}
