//! Sequence counter repository.
//!
//! Counters are advanced with a single upsert. The conflicting row is locked
//! until the enclosing transaction ends, so concurrent callers on one key
//! queue behind each other and an aborted caller gives its value back.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, TransactionTrait, Value};

use obligo_core::error::LedgerError;
use obligo_core::numbering::{SequenceKey, format_number};

use crate::error::RepositoryError;

const NEXT_SQL: &str = r"
INSERT INTO sequence_counters (entity_id, branch_scope, family, sub_type, year, last_value)
VALUES ($1, $2, $3::sequence_family, $4, $5, 1)
ON CONFLICT (entity_id, branch_scope, family, sub_type, year)
DO UPDATE SET last_value = sequence_counters.last_value + 1
RETURNING last_value
";

const CURRENT_SQL: &str = r"
SELECT last_value FROM sequence_counters
WHERE entity_id = $1 AND branch_scope = $2 AND family = $3::sequence_family
  AND sub_type = $4 AND year = $5
";

const RESET_SQL: &str = r"
INSERT INTO sequence_counters (entity_id, branch_scope, family, sub_type, year, last_value)
VALUES ($1, $2, $3::sequence_family, $4, $5, $6)
ON CONFLICT (entity_id, branch_scope, family, sub_type, year)
DO UPDATE SET last_value = EXCLUDED.last_value
";

/// Sequence counter repository.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    db: DatabaseConnection,
}

impl SequenceRepository {
    /// Creates a new sequence repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Issues the next value of a counter in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn next(&self, key: &SequenceKey) -> Result<i64, RepositoryError> {
        let txn = self.db.begin().await?;
        let value = Self::next_in(&txn, key).await?;
        txn.commit().await?;
        Ok(value)
    }

    /// Last issued value, `0` for a counter that was never used.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn current(&self, key: &SequenceKey) -> Result<i64, RepositoryError> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                CURRENT_SQL,
                key_values(key),
            ))
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<i64>("", "last_value")?),
            None => Ok(0),
        }
    }

    /// Overwrites a counter. Repair tooling only.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a negative value, or a database error.
    pub async fn reset(&self, key: &SequenceKey, value: i64) -> Result<(), RepositoryError> {
        if value < 0 {
            return Err(LedgerError::Validation(format!(
                "sequence value must not be negative, got {value}"
            ))
            .into());
        }

        let mut values = key_values(key);
        values.push(value.into());
        self.db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                RESET_SQL,
                values,
            ))
            .await?;

        tracing::warn!(
            entity_id = %key.entity_id,
            family = %key.family,
            sub_type = key.sub_type_scope(),
            year = key.year,
            value,
            "Sequence counter reset"
        );
        Ok(())
    }

    /// Issues the next value inside the caller's transaction.
    pub(crate) async fn next_in<C: ConnectionTrait>(
        conn: &C,
        key: &SequenceKey,
    ) -> Result<i64, RepositoryError> {
        let row = conn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                NEXT_SQL,
                key_values(key),
            ))
            .await?
            .ok_or_else(|| LedgerError::Internal("sequence upsert returned no row".to_string()))?;

        Ok(row.try_get::<i64>("", "last_value")?)
    }

    /// Issues the next formatted identifier inside the caller's transaction.
    pub(crate) async fn next_number_in<C: ConnectionTrait>(
        conn: &C,
        key: &SequenceKey,
        prefix: &str,
    ) -> Result<String, RepositoryError> {
        let value = Self::next_in(conn, key).await?;
        Ok(format_number(prefix, key.year, value))
    }
}

fn key_values(key: &SequenceKey) -> Vec<Value> {
    vec![
        key.entity_id.into_inner().into(),
        key.branch_scope().into(),
        key.family.as_str().into(),
        key.sub_type_scope().into(),
        key.year.into(),
    ]
}
