//! Repository error type.

use sea_orm::{DbErr, RuntimeErr, SqlErr};
use thiserror::Error;

use obligo_core::{ErrorKind, LedgerError};

/// Postgres SQLSTATE codes that signal lock contention.
const CONTENTION_CODES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

/// Errors returned by the ledger repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl RepositoryError {
    /// Returns the error family.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ledger(err) => err.kind(),
            Self::Database(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller may retry the operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Ledger(err) if err.is_retryable())
    }

    /// Returns the wrapped ledger error, if any.
    #[must_use]
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger(err) => Some(err),
            Self::Database(_) => None,
        }
    }
}

impl From<DbErr> for RepositoryError {
    fn from(err: DbErr) -> Self {
        if let Some(code) = sqlstate(&err) {
            if CONTENTION_CODES.contains(&code.as_str()) {
                tracing::warn!(sqlstate = %code, error = %err, "lock contention");
                return Self::Ledger(LedgerError::Conflict(err.to_string()));
            }
        }
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return Self::Ledger(LedgerError::Validation(format!(
                "duplicate value: {detail}"
            )));
        }
        Self::Database(err)
    }
}

fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db_err))) => {
            db_err.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}
