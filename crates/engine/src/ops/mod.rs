use sea_orm::DatabaseConnection;
use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, ResultEngine};

mod access;
mod balances;
mod bills;
mod groups;
mod transactions;
mod users;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// The body receives the open transaction as its explicit context; dropping
/// it without a commit (early `?` return or `Err`) rolls everything back.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await.map_err(crate::EngineError::from_write)?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of the ledger.
///
/// Holds nothing but a connection pool: all state lives in the database, so
/// an `Engine` can be shared freely between concurrent requests.
#[derive(Debug, Clone)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Canonical form used for uniqueness: NFKC, trimmed, lowercased.
fn normalize_email(value: &str) -> ResultEngine<String> {
    let email: String = value.trim().nfkc().collect::<String>().to_lowercase();
    if email.is_empty() {
        return Err(EngineError::InvalidName("email must not be empty".to_string()));
    }
    if !email.contains('@') {
        return Err(EngineError::InvalidName(format!("invalid email: {email}")));
    }
    Ok(email)
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
