//! Reversal repository.
//!
//! A reversal inserts the mirrored twin dated today, links both records to
//! each other and moves the original to `reversed`, in one transaction.

use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};

use obligo_core::obligation::Obligation;
use obligo_core::reversal::ReversalService;
use obligo_core::settlement::Settlement;
use obligo_shared::types::{EntityId, ObligationId, SettlementId};

use crate::convert;
use crate::entities::{allocations, obligations, sea_orm_active_enums as db, settlements};
use crate::error::RepositoryError;
use crate::repositories::obligation::ObligationRepository;
use crate::repositories::period::PeriodRepository;
use crate::repositories::settlement::SettlementRepository;
use crate::repositories::sums;

/// An obligation and the twin that neutralizes it.
#[derive(Debug, Clone)]
pub struct ObligationReversal {
    /// The original, now `reversed`.
    pub original: Obligation,
    /// The mirrored twin.
    pub reversal: Obligation,
}

/// A settlement and the twin that neutralizes it.
#[derive(Debug, Clone)]
pub struct SettlementReversal {
    /// The original, now `reversed`.
    pub original: Settlement,
    /// The mirrored twin.
    pub reversal: Settlement,
}

/// Reversal repository.
#[derive(Debug, Clone)]
pub struct ReversalRepository {
    db: DatabaseConnection,
}

impl ReversalRepository {
    /// Creates a new reversal repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Reverses a posted obligation as of today.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error for drafts, terminal records, reversal
    /// twins, already reversed records or while allocations are active, and
    /// a locked-period error when today's period is frozen.
    pub async fn reverse_obligation(
        &self,
        entity_id: EntityId,
        id: ObligationId,
        reason: &str,
    ) -> Result<ObligationReversal, RepositoryError> {
        self.reverse_obligation_on(entity_id, id, reason, Utc::now().date_naive())
            .await
    }

    /// Reverses a confirmed settlement as of today.
    ///
    /// # Errors
    ///
    /// Same as [`ReversalRepository::reverse_obligation`].
    pub async fn reverse_settlement(
        &self,
        entity_id: EntityId,
        id: SettlementId,
        reason: &str,
    ) -> Result<SettlementReversal, RepositoryError> {
        self.reverse_settlement_on(entity_id, id, reason, Utc::now().date_naive())
            .await
    }

    async fn reverse_obligation_on(
        &self,
        entity_id: EntityId,
        id: ObligationId,
        reason: &str,
        today: NaiveDate,
    ) -> Result<ObligationReversal, RepositoryError> {
        let txn = self.db.begin().await?;
        let original = ObligationRepository::lock_in(&txn, entity_id, id).await?;

        let active = sums::count_allocations(&txn, allocations::Column::ObligationId, id.into_inner(), true).await?;
        let period = PeriodRepository::status_in(&txn, entity_id, today).await?;
        ReversalService::validate_obligation(&original, active, today, period, reason)
            .inspect_err(|err| tracing::warn!(obligation_id = %id, error = %err, "Obligation reversal rejected"))?;

        let twin = ReversalService::obligation_twin(&original, today, reason);
        let reversal = ObligationRepository::insert_new_in(&txn, &twin).await?;

        let updated = obligations::ActiveModel {
            id: Set(id.into_inner()),
            status: Set(db::ObligationStatus::Reversed),
            reversal_obligation_id: Set(Some(reversal.id.into_inner())),
            status_reason: Set(Some(reason.to_string())),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(
            obligation_id = %id,
            number = %original.number,
            reversal = %reversal.number,
            reason,
            "Obligation reversed"
        );
        Ok(ObligationReversal {
            original: convert::obligation(updated),
            reversal,
        })
    }

    async fn reverse_settlement_on(
        &self,
        entity_id: EntityId,
        id: SettlementId,
        reason: &str,
        today: NaiveDate,
    ) -> Result<SettlementReversal, RepositoryError> {
        let txn = self.db.begin().await?;
        let original = SettlementRepository::lock_in(&txn, entity_id, id).await?;

        let active = sums::count_allocations(&txn, allocations::Column::SettlementId, id.into_inner(), true).await?;
        let period = PeriodRepository::status_in(&txn, entity_id, today).await?;
        ReversalService::validate_settlement(&original, active, today, period, reason)
            .inspect_err(|err| tracing::warn!(settlement_id = %id, error = %err, "Settlement reversal rejected"))?;

        let twin = ReversalService::settlement_twin(&original, today, reason);
        let reversal = SettlementRepository::insert_new_in(&txn, &twin).await?;

        let updated = settlements::ActiveModel {
            id: Set(id.into_inner()),
            status: Set(db::SettlementStatus::Reversed),
            reversal_settlement_id: Set(Some(reversal.id.into_inner())),
            status_reason: Set(Some(reason.to_string())),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(
            settlement_id = %id,
            number = %original.number,
            reversal = %reversal.number,
            reason,
            "Settlement reversed"
        );
        Ok(SettlementReversal {
            original: convert::settlement(updated)?,
            reversal,
        })
    }
}
