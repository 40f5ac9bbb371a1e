use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*};

use crate::{EngineError, Group, ResultEngine, group_members, groups};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Creates a group with `member_ids` plus the creator.
    ///
    /// Every member must be a registered user; repeated ids collapse into
    /// one membership.
    pub async fn create_group(
        &self,
        name: &str,
        member_ids: &[Uuid],
        creator_id: Uuid,
    ) -> ResultEngine<Group> {
        let name = normalize_required_name(name, "group name")?;
        let mut members: Vec<Uuid> = member_ids.to_vec();
        members.push(creator_id);
        members.sort_unstable();
        members.dedup();

        with_tx!(self, |db_tx| {
            self.require_users(&db_tx, &members).await?;

            let group_id = Uuid::new_v4();
            groups::ActiveModel {
                id: ActiveValue::Set(group_id),
                name: ActiveValue::Set(name),
                created_by: ActiveValue::Set(creator_id),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await
            .map_err(EngineError::from_write)?;

            for user_id in &members {
                self.insert_member(&db_tx, group_id, *user_id).await?;
            }

            tracing::debug!(%group_id, members = members.len(), "created group");
            self.authorize_group_access_in(&db_tx, group_id, creator_id)
                .await
        })
    }

    /// Adds `member_id` to a group the requester belongs to.
    ///
    /// Adding someone who is already a member is a no-op.
    pub async fn add_member(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        requester_id: Uuid,
    ) -> ResultEngine<Group> {
        with_tx!(self, |db_tx| {
            let group = self
                .authorize_group_access_in(&db_tx, group_id, requester_id)
                .await?;
            if group.has_member(member_id) {
                return Ok(group);
            }
            self.require_user(&db_tx, member_id).await?;
            self.insert_member(&db_tx, group_id, member_id).await?;

            tracing::debug!(%group_id, %member_id, "added group member");
            self.authorize_group_access_in(&db_tx, group_id, requester_id)
                .await
        })
    }

    /// Returns the group if `user_id` is a member of it.
    ///
    /// Fails with `NotFound` for an unknown group and `Forbidden` for a
    /// non-member. Nothing is cached: every call re-reads the membership.
    pub async fn authorize_group_access(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<Group> {
        with_tx!(self, |db_tx| {
            self.authorize_group_access_in(&db_tx, group_id, user_id)
                .await
        })
    }

    /// Unchecked lookup, for callers that already hold an authorization.
    pub async fn find_group(&self, group_id: Uuid) -> ResultEngine<Option<Group>> {
        with_tx!(self, |db_tx| { self.load_group(&db_tx, group_id).await })
    }

    pub async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            self.is_member_in(&db_tx, group_id, user_id).await
        })
    }

    async fn insert_member(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<()> {
        group_members::ActiveModel {
            group_id: ActiveValue::Set(group_id),
            user_id: ActiveValue::Set(user_id),
            joined_at: ActiveValue::Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(EngineError::from_write)?;
        Ok(())
    }
}
