//! Bills and their shares.
//!
//! A `Bill` is an immutable aggregate: it is written together with all of its
//! share rows in one database transaction and never updated afterwards.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Money, bill_shares};

/// One user's portion of a bill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub user_id: Uuid,
    pub amount: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub group_id: Uuid,
    pub description: String,
    pub total: Money,
    pub payer_id: Uuid,
    /// Part of the total the payer covers themselves.
    pub payer_portion: Money,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    /// Sorted by user id.
    pub shares: Vec<Share>,
}

impl Bill {
    /// Share of `user_id`, zero when the user owes nothing on this bill.
    #[must_use]
    pub fn share_of(&self, user_id: Uuid) -> Money {
        self.shares
            .iter()
            .find(|share| share.user_id == user_id)
            .map_or(Money::ZERO, |share| share.amount)
    }

    pub(crate) fn from_parts(model: Model, share_models: Vec<bill_shares::Model>) -> Self {
        let mut shares: Vec<Share> = share_models
            .into_iter()
            .map(|share| Share {
                user_id: share.user_id,
                amount: Money::new(share.amount_minor),
            })
            .collect();
        shares.sort_unstable_by_key(|share| share.user_id);
        Self {
            id: model.id,
            group_id: model.group_id,
            description: model.description,
            total: Money::new(model.total_minor),
            payer_id: model.payer_id,
            payer_portion: Money::new(model.payer_portion_minor),
            created_by: model.created_by,
            created_at: model.created_at,
            shares,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bills")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub group_id: Uuid,
    pub description: String,
    pub total_minor: i64,
    pub payer_id: Uuid,
    pub payer_portion_minor: i64,
    pub created_by: Uuid,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
    #[sea_orm(has_many = "super::bill_shares::Entity")]
    Shares,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::bill_shares::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shares.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
