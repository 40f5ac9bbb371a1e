//! Groups of users sharing bills.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A group with its member list populated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    /// Member ids, sorted.
    pub members: Vec<Uuid>,
}

impl Group {
    #[must_use]
    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.members.binary_search(&user_id).is_ok()
    }

    pub(crate) fn from_parts(model: Model, mut members: Vec<Uuid>) -> Self {
        members.sort_unstable();
        members.dedup();
        Self {
            id: model.id,
            name: model.name,
            created_by: model.created_by,
            created_at: model.created_at,
            members,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_members::Entity")]
    GroupMembers,
    #[sea_orm(has_many = "super::bills::Entity")]
    Bills,
}

impl Related<super::group_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupMembers.def()
    }
}

impl Related<super::bills::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bills.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
