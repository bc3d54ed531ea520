//! Read-only balance queries.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use obligo_core::balance::{
    AgingReport, DEFAULT_AGING_EDGES, PartyStatement, balance_as_of, open_balance,
};
use obligo_core::obligation::{Direction, ObligationPosition, ObligationStatus};
use obligo_core::settlement::{AccountRef, SettlementStatus};
use obligo_shared::config::LedgerConfig;
use obligo_shared::types::{EntityId, PartyId};

use crate::convert;
use crate::entities::{obligations, sea_orm_active_enums as db, settlements};
use crate::error::RepositoryError;
use crate::repositories::cash_account::CashAccountRepository;
use crate::repositories::obligation::ObligationRepository;
use crate::repositories::settlement::touches_account;

/// Filter for aging reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgingFilter {
    /// Restrict to one direction.
    pub direction: Option<Direction>,
    /// Restrict to one party.
    pub party_id: Option<PartyId>,
}

/// Balance repository.
#[derive(Debug, Clone)]
pub struct BalanceRepository {
    db: DatabaseConnection,
    aging_edges: Vec<i64>,
}

impl BalanceRepository {
    /// Creates a balance repository with the default aging buckets.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            aging_edges: DEFAULT_AGING_EDGES.to_vec(),
        }
    }

    /// Creates a balance repository using the configured aging buckets.
    #[must_use]
    pub fn with_config(db: DatabaseConnection, config: &LedgerConfig) -> Self {
        Self {
            db,
            aging_edges: config.aging_bucket_edges.clone(),
        }
    }

    /// What the party still owes the entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn party_receivable_balance(
        &self,
        entity_id: EntityId,
        party_id: PartyId,
    ) -> Result<Decimal, RepositoryError> {
        let positions = self
            .open_positions(entity_id, Some(party_id), Some(Direction::Receivable))
            .await?;
        Ok(open_balance(&positions, Direction::Receivable))
    }

    /// What the entity still owes the party.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn party_payable_balance(
        &self,
        entity_id: EntityId,
        party_id: PartyId,
    ) -> Result<Decimal, RepositoryError> {
        let positions = self
            .open_positions(entity_id, Some(party_id), Some(Direction::Payable))
            .await?;
        Ok(open_balance(&positions, Direction::Payable))
    }

    /// Both sides of a party's open position.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn party_statement(
        &self,
        entity_id: EntityId,
        party_id: PartyId,
    ) -> Result<PartyStatement, RepositoryError> {
        let positions = self.open_positions(entity_id, Some(party_id), None).await?;
        Ok(PartyStatement::from_positions(party_id, &positions))
    }

    /// Balance of a cashbox or bank account at the end of `as_of`.
    ///
    /// # Errors
    ///
    /// Returns not-found for an account outside the entity, or a database
    /// error.
    pub async fn account_balance_as_of(
        &self,
        entity_id: EntityId,
        account: AccountRef,
        as_of: NaiveDate,
    ) -> Result<Decimal, RepositoryError> {
        let cash_account = CashAccountRepository::new(self.db.clone())
            .get(entity_id, account)
            .await?;

        let posted: Vec<db::SettlementStatus> =
            [SettlementStatus::Confirmed, SettlementStatus::Reversed]
                .into_iter()
                .map(Into::into)
                .collect();
        let models = settlements::Entity::find()
            .filter(settlements::Column::EntityId.eq(entity_id.into_inner()))
            .filter(settlements::Column::Status.is_in(posted))
            .filter(settlements::Column::SettlementDate.lte(as_of))
            .filter(touches_account(account))
            .order_by_asc(settlements::Column::SettlementDate)
            .all(&self.db)
            .await?;
        let settlements = models
            .into_iter()
            .map(convert::settlement)
            .collect::<Result<Vec<_>, _>>()?;

        let balance = balance_as_of(&cash_account, &settlements, as_of);
        tracing::debug!(
            account = %account,
            as_of = %as_of,
            settlements = settlements.len(),
            balance = %balance,
            "Account balance computed"
        );
        Ok(balance)
    }

    /// Unpaid open obligations of an entity grouped by days overdue.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed configured edges, or a
    /// database error.
    pub async fn aging(
        &self,
        entity_id: EntityId,
        as_of: NaiveDate,
        filter: AgingFilter,
    ) -> Result<AgingReport, RepositoryError> {
        let positions = self
            .open_positions(entity_id, filter.party_id, filter.direction)
            .await?;
        Ok(AgingReport::build(&positions, as_of, &self.aging_edges)?)
    }

    async fn open_positions(
        &self,
        entity_id: EntityId,
        party_id: Option<PartyId>,
        direction: Option<Direction>,
    ) -> Result<Vec<ObligationPosition>, RepositoryError> {
        let open: Vec<db::ObligationStatus> = [ObligationStatus::Pending, ObligationStatus::Partial]
            .into_iter()
            .map(Into::into)
            .collect();
        let mut query = obligations::Entity::find()
            .filter(obligations::Column::EntityId.eq(entity_id.into_inner()))
            .filter(obligations::Column::Status.is_in(open));
        if let Some(party_id) = party_id {
            query = query.filter(obligations::Column::PartyId.eq(party_id.into_inner()));
        }
        if let Some(direction) = direction {
            query = query.filter(obligations::Column::Direction.eq(db::ObligationDirection::from(direction)));
        }
        let models = query.all(&self.db).await?;

        ObligationRepository::positions_in(
            &self.db,
            models.into_iter().map(convert::obligation).collect(),
        )
        .await
    }
}
