//! Reversal service for neutralizing posted obligations and settlements.
//!
//! A reversal never edits the original's amounts. It creates a twin dated
//! today with the mirrored direction and the same positive amounts, links the
//! pair both ways and moves both to `reversed`.

use chrono::NaiveDate;

use obligo_shared::types::{ObligationId, SettlementId};

use crate::error::LedgerError;
use crate::obligation::{NewObligation, Obligation, ObligationStatus};
use crate::period::{Mutation, PeriodStatus, assert_open_period};
use crate::settlement::{NewSettlement, Settlement, SettlementStatus};

/// Stateless service for building reversal twins.
pub struct ReversalService;

impl ReversalService {
    /// Validates that an obligation may be reversed today.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] naming the rule that
    /// forbids the reversal, [`LedgerError::LockedPeriod`] when today's period
    /// is frozen and [`LedgerError::Validation`] for an empty reason.
    pub fn validate_obligation(
        original: &Obligation,
        active_allocations: u64,
        today: NaiveDate,
        today_period: PeriodStatus,
        reason: &str,
    ) -> Result<(), LedgerError> {
        ensure_reason(reason)?;
        if original.has_reversal() {
            return Err(LedgerError::transition(format!(
                "{} has already been reversed",
                original.number
            )));
        }
        if original.is_reversal() {
            return Err(LedgerError::transition(format!(
                "{} is itself a reversal",
                original.number
            )));
        }
        if matches!(
            original.status,
            ObligationStatus::Draft | ObligationStatus::Cancelled | ObligationStatus::Reversed
        ) {
            return Err(LedgerError::transition(format!(
                "{} is {} and cannot be reversed",
                original.number, original.status
            )));
        }
        if active_allocations > 0 {
            return Err(LedgerError::transition(format!(
                "{} has {active_allocations} active allocation(s); cancel them before reversing",
                original.number
            )));
        }
        assert_open_period(&original.number, today, today_period, Mutation::Create)
    }

    /// Builds the reversal twin of an obligation, dated `today`.
    #[must_use]
    pub fn obligation_twin(original: &Obligation, today: NaiveDate, reason: &str) -> NewObligation {
        NewObligation {
            id: ObligationId::new(),
            entity_id: original.entity_id,
            branch_id: original.branch_id,
            obligation_type: original.obligation_type,
            direction: original.direction.mirror(),
            party_id: original.party_id,
            obligation_date: today,
            due_date: None,
            total_amount: original.total_amount,
            category_id: original.category_id,
            status: ObligationStatus::Reversed,
            reversed_obligation_id: Some(original.id),
            source: original.source.clone(),
            reference: Some(original.number.clone()),
            description: Some(format!("Reversal of {}", original.number)),
            notes: None,
            status_reason: Some(reason.to_string()),
            lines: Vec::new(),
            installments: Vec::new(),
        }
    }

    /// Validates that a settlement may be reversed today.
    ///
    /// # Errors
    ///
    /// Same families as [`ReversalService::validate_obligation`].
    pub fn validate_settlement(
        original: &Settlement,
        active_allocations: u64,
        today: NaiveDate,
        today_period: PeriodStatus,
        reason: &str,
    ) -> Result<(), LedgerError> {
        ensure_reason(reason)?;
        if original.has_reversal() {
            return Err(LedgerError::transition(format!(
                "{} has already been reversed",
                original.number
            )));
        }
        if original.is_reversal() {
            return Err(LedgerError::transition(format!(
                "{} is itself a reversal",
                original.number
            )));
        }
        if original.status != SettlementStatus::Confirmed {
            return Err(LedgerError::transition(format!(
                "{} is {} and cannot be reversed",
                original.number, original.status
            )));
        }
        if active_allocations > 0 {
            return Err(LedgerError::transition(format!(
                "{} has {active_allocations} active allocation(s); cancel them before reversing",
                original.number
            )));
        }
        assert_open_period(&original.number, today, today_period, Mutation::Create)
    }

    /// Builds the reversal twin of a settlement, dated `today`.
    #[must_use]
    pub fn settlement_twin(original: &Settlement, today: NaiveDate, reason: &str) -> NewSettlement {
        NewSettlement {
            id: SettlementId::new(),
            entity_id: original.entity_id,
            branch_id: original.branch_id,
            settlement_type: original.settlement_type,
            direction: original.direction.mirror(),
            party_id: original.party_id,
            account: original.account,
            destination: original.destination,
            settlement_date: today,
            amount: original.amount,
            fee_amount: original.fee_amount,
            net_amount: original.net_amount,
            status: SettlementStatus::Reversed,
            reversed_settlement_id: Some(original.id),
            reference: Some(original.number.clone()),
            description: Some(format!("Reversal of {}", original.number)),
            notes: None,
            status_reason: Some(reason.to_string()),
        }
    }
}

fn ensure_reason(reason: &str) -> Result<(), LedgerError> {
    if reason.trim().is_empty() {
        return Err(LedgerError::Validation(
            "a reversal reason is required".to_string(),
        ));
    }
    Ok(())
}
