use sea_orm::{DatabaseTransaction, QueryFilter, SqlErr, TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, User, users};

use super::{Engine, normalize_email, normalize_required_name, with_tx};

impl Engine {
    /// Registers a new user.
    ///
    /// The email is stored in canonical form; registering an email that is
    /// already taken fails with [`EngineError::DuplicateUser`].
    pub async fn register_user(&self, name: &str, email: &str, password: &str) -> ResultEngine<User> {
        let name = normalize_required_name(name, "user name")?;
        let email = normalize_email(email)?;

        with_tx!(self, |db_tx| {
            if self.find_user_model_by_email(&db_tx, &email).await?.is_some() {
                return Err(EngineError::DuplicateUser(email));
            }

            let model = users::new_active(name, email.clone(), password.to_string())
                .insert(&db_tx)
                .await
                .map_err(|err| match err.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        EngineError::DuplicateUser(email.clone())
                    }
                    _ => EngineError::Database(err),
                })?;

            tracing::debug!(user_id = %model.id, "registered user");
            Ok(User::from(model))
        })
    }

    pub async fn find_user(&self, user_id: Uuid) -> ResultEngine<Option<User>> {
        with_tx!(self, |db_tx| {
            let model = self.find_user_model(&db_tx, user_id).await?;
            Ok(model.map(User::from))
        })
    }

    pub async fn find_user_by_email(&self, email: &str) -> ResultEngine<Option<User>> {
        let email = normalize_email(email)?;
        with_tx!(self, |db_tx| {
            let model = self.find_user_model_by_email(&db_tx, &email).await?;
            Ok(model.map(User::from))
        })
    }

    /// Resolves many ids at once. Unknown ids are skipped.
    pub async fn find_users(&self, user_ids: &[Uuid]) -> ResultEngine<Vec<User>> {
        with_tx!(self, |db_tx| {
            let models = self.find_user_models(&db_tx, user_ids).await?;
            Ok(models.into_iter().map(User::from).collect())
        })
    }

    async fn find_user_model_by_email(
        &self,
        db: &DatabaseTransaction,
        email: &str,
    ) -> ResultEngine<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn find_user_models(
        &self,
        db: &DatabaseTransaction,
        user_ids: &[Uuid],
    ) -> ResultEngine<Vec<users::Model>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids.iter().copied()))
            .all(db)
            .await
            .map_err(Into::into)
    }

    /// Fails with `NotFound` unless every id resolves to a user.
    pub(super) async fn require_users(
        &self,
        db: &DatabaseTransaction,
        user_ids: &[Uuid],
    ) -> ResultEngine<()> {
        let found = self.find_user_models(db, user_ids).await?;
        if let Some(missing) = user_ids
            .iter()
            .find(|id| !found.iter().any(|model| model.id == **id))
        {
            return Err(EngineError::NotFound(format!("user {missing}")));
        }
        Ok(())
    }
}
