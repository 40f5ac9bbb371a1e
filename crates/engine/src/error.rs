//! The module contains the errors the engine can return.
//!
//! Every variant names the precondition that failed, so callers can tell a
//! missing entity ([`NotFound`]) from an authorization failure
//! ([`Forbidden`]) or inconsistent split math ([`InvalidSplit`]).
//!
//!  [`NotFound`]: EngineError::NotFound
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`InvalidSplit`]: EngineError::InvalidSplit
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("\"{0}\" already registered!")]
    DuplicateUser(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Classifies a failed insert.
    ///
    /// A foreign key violation means a referenced user/group/bill vanished
    /// between validation and commit.
    pub(crate) fn from_write(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => Self::Conflict(msg),
            _ => Self::Database(err),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidSplit(a), Self::InvalidSplit(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::DuplicateUser(a), Self::DuplicateUser(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
