//! Accounting period repository.
//!
//! Periods are one row per entity and calendar month, created lazily as
//! `open`. Transitions lock the row with `FOR UPDATE`; the open-period guard
//! reads it with `FOR SHARE`, so a guarded write and a lock of the same month
//! never interleave.

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};

use obligo_core::error::LedgerError;
use obligo_core::period::{
    AccountingPeriod, PeriodAction, PeriodBounds, PeriodService, PeriodStatus,
};
use obligo_shared::types::{AccountingPeriodId, EntityId, UserId};

use crate::convert;
use crate::entities::accounting_periods;
use crate::error::RepositoryError;

const ENSURE_PERIOD_SQL: &str = r"
INSERT INTO accounting_periods (id, entity_id, year, month, start_date, end_date)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (entity_id, year, month) DO NOTHING
";

/// Accounting period repository.
#[derive(Debug, Clone)]
pub struct PeriodRepository {
    db: DatabaseConnection,
}

impl PeriodRepository {
    /// Creates a new period repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the period containing `date`, creating it as `open` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn get_or_create(
        &self,
        entity_id: EntityId,
        date: NaiveDate,
    ) -> Result<AccountingPeriod, RepositoryError> {
        let bounds = PeriodBounds::for_date(date)?;
        Self::ensure_in(&self.db, entity_id, &bounds).await?;
        let model = Self::find_in(&self.db, entity_id, bounds.year, bounds.month, false)
            .await?
            .ok_or_else(|| LedgerError::Internal(format!("period {date} vanished")))?;
        Ok(convert::period(model)?)
    }

    /// Locks a month. Locking a locked month is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error for a closed month.
    pub async fn lock(
        &self,
        entity_id: EntityId,
        year: i32,
        month: u32,
        actor: Option<UserId>,
        notes: Option<String>,
    ) -> Result<AccountingPeriod, RepositoryError> {
        self.transition(entity_id, year, month, PeriodAction::Lock, actor, notes)
            .await
    }

    /// Reopens a locked month. Unlocking an open month is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error for a closed month.
    pub async fn unlock(
        &self,
        entity_id: EntityId,
        year: i32,
        month: u32,
        actor: Option<UserId>,
        notes: Option<String>,
    ) -> Result<AccountingPeriod, RepositoryError> {
        self.transition(entity_id, year, month, PeriodAction::Unlock, actor, notes)
            .await
    }

    /// Closes a month for good.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn close(
        &self,
        entity_id: EntityId,
        year: i32,
        month: u32,
        actor: Option<UserId>,
    ) -> Result<AccountingPeriod, RepositoryError> {
        self.transition(entity_id, year, month, PeriodAction::Close, actor, None)
            .await
    }

    /// Returns true if records dated `date` may be mutated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_date_in_open_period(
        &self,
        entity_id: EntityId,
        date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let status = Self::status_in(&self.db, entity_id, date).await?;
        Ok(status.is_open())
    }

    /// Lists the existing period rows of a year, in month order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        entity_id: EntityId,
        year: i32,
    ) -> Result<Vec<AccountingPeriod>, RepositoryError> {
        let models = accounting_periods::Entity::find()
            .filter(accounting_periods::Column::EntityId.eq(entity_id.into_inner()))
            .filter(accounting_periods::Column::Year.eq(year))
            .order_by_asc(accounting_periods::Column::Month)
            .all(&self.db)
            .await?;

        models
            .into_iter()
            .map(|model| convert::period(model).map_err(RepositoryError::from))
            .collect()
    }

    async fn transition(
        &self,
        entity_id: EntityId,
        year: i32,
        month: u32,
        action: PeriodAction,
        actor: Option<UserId>,
        notes: Option<String>,
    ) -> Result<AccountingPeriod, RepositoryError> {
        let bounds = PeriodBounds::for_month(year, month)?;

        let txn = self.db.begin().await?;
        Self::ensure_in(&txn, entity_id, &bounds).await?;
        let model = Self::find_in(&txn, entity_id, year, month, true)
            .await?
            .ok_or_else(|| LedgerError::Internal(format!("period {year}-{month:02} vanished")))?;

        let current: PeriodStatus = model.status.into();
        let Some(target) = PeriodService::transition(current, action).inspect_err(|err| {
            tracing::warn!(entity_id = %entity_id, year, month, error = %err, "Period transition rejected");
        })?
        else {
            txn.commit().await?;
            return Ok(convert::period(model)?);
        };

        let now = Utc::now().into();
        let actor = actor.map(UserId::into_inner);
        let mut active: accounting_periods::ActiveModel = model.into();
        active.status = Set(target.into());
        match action {
            PeriodAction::Lock => {
                active.locked_by = Set(actor);
                active.locked_at = Set(Some(now));
            }
            PeriodAction::Close => {
                active.closed_by = Set(actor);
                active.closed_at = Set(Some(now));
            }
            PeriodAction::Unlock => {}
        }
        if notes.is_some() {
            active.notes = Set(notes);
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(
            entity_id = %entity_id,
            year,
            month,
            from = %current,
            to = %target,
            "Accounting period transitioned"
        );
        Ok(convert::period(updated)?)
    }

    /// Status of the period containing `date`; a month without a row is open.
    ///
    /// The row, when present, is share-locked for the rest of the transaction.
    pub(crate) async fn status_in<C: ConnectionTrait>(
        conn: &C,
        entity_id: EntityId,
        date: NaiveDate,
    ) -> Result<PeriodStatus, RepositoryError> {
        let bounds = PeriodBounds::for_date(date)?;
        let status = accounting_periods::Entity::find()
            .filter(accounting_periods::Column::EntityId.eq(entity_id.into_inner()))
            .filter(accounting_periods::Column::Year.eq(bounds.year))
            .filter(accounting_periods::Column::Month.eq(month_column(bounds.month)?))
            .lock_shared()
            .one(conn)
            .await?
            .map_or(PeriodStatus::Open, |model| model.status.into());
        Ok(status)
    }

    async fn ensure_in<C: ConnectionTrait>(
        conn: &C,
        entity_id: EntityId,
        bounds: &PeriodBounds,
    ) -> Result<(), RepositoryError> {
        conn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            ENSURE_PERIOD_SQL,
            [
                AccountingPeriodId::new().into_inner().into(),
                entity_id.into_inner().into(),
                bounds.year.into(),
                month_column(bounds.month)?.into(),
                bounds.start_date.into(),
                bounds.end_date.into(),
            ],
        ))
        .await?;
        Ok(())
    }

    async fn find_in<C: ConnectionTrait>(
        conn: &C,
        entity_id: EntityId,
        year: i32,
        month: u32,
        for_update: bool,
    ) -> Result<Option<accounting_periods::Model>, RepositoryError> {
        let mut query = accounting_periods::Entity::find()
            .filter(accounting_periods::Column::EntityId.eq(entity_id.into_inner()))
            .filter(accounting_periods::Column::Year.eq(year))
            .filter(accounting_periods::Column::Month.eq(month_column(month)?));
        if for_update {
            query = query.lock_exclusive();
        }
        Ok(query.one(conn).await?)
    }
}

fn month_column(month: u32) -> Result<i16, LedgerError> {
    i16::try_from(month).map_err(|_| LedgerError::Validation(format!("invalid month {month}")))
}
