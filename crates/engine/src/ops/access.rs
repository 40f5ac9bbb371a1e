use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};

use crate::{EngineError, Group, ResultEngine, group_members, groups, users};

use super::Engine;

/// Generates a `find_*` / `require_*` pair for an entity keyed by `Uuid`.
macro_rules! impl_find_require {
    ($find_fn:ident, $require_fn:ident, $entity:path, $model:path, $err_msg:literal) => {
        pub(super) async fn $find_fn(
            &self,
            db: &DatabaseTransaction,
            id: Uuid,
        ) -> ResultEngine<Option<$model>> {
            <$entity>::find_by_id(id).one(db).await.map_err(Into::into)
        }

        pub(super) async fn $require_fn(
            &self,
            db: &DatabaseTransaction,
            id: Uuid,
        ) -> ResultEngine<$model> {
            self.$find_fn(db, id)
                .await?
                .ok_or_else(|| EngineError::NotFound($err_msg.to_string()))
        }
    };
}

impl Engine {
    impl_find_require!(
        find_user_model,
        require_user,
        users::Entity,
        users::Model,
        "user"
    );

    impl_find_require!(
        find_group_model,
        require_group_model,
        groups::Entity,
        groups::Model,
        "group"
    );

    pub(super) async fn member_ids(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Uuid>> {
        let rows = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id))
            .order_by_asc(group_members::Column::UserId)
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|m| m.user_id).collect())
    }

    /// Loads a group aggregate with its members, `None` if it doesn't exist.
    pub(super) async fn load_group(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Option<Group>> {
        let Some(model) = self.find_group_model(db, group_id).await? else {
            return Ok(None);
        };
        let members = self.member_ids(db, group_id).await?;
        Ok(Some(Group::from_parts(model, members)))
    }

    pub(super) async fn is_member_in(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<bool> {
        Ok(group_members::Entity::find_by_id((group_id, user_id))
            .one(db)
            .await?
            .is_some())
    }

    /// Authorization gate for everything scoped to a group.
    ///
    /// Checked against the database inside the caller's transaction on every
    /// call, so the decision and the write it guards commit together.
    pub(super) async fn authorize_group_access_in(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<Group> {
        let group = self
            .load_group(db, group_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("group".to_string()))?;
        if !group.has_member(user_id) {
            return Err(EngineError::Forbidden(format!(
                "user {user_id} is not a member of group {group_id}"
            )));
        }
        Ok(group)
    }
}
