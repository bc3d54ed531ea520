//! Ledger error types for validation and state errors.
//!
//! Every rejected operation maps to one of the [`ErrorKind`] families so that
//! callers can react uniformly: validation errors are rejected before any
//! write, locked-period and state-transition errors name the rule that failed,
//! and only [`LedgerError::Conflict`] is worth retrying.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::period::PeriodStatus;

/// Broad error families surfaced to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, nothing was persisted.
    Validation,
    /// Mutation of a record dated in a locked or closed period.
    LockedPeriod,
    /// Requested amount exceeds what is owed or still unallocated.
    OverAllocation,
    /// The record's current state forbids the operation.
    InvalidStateTransition,
    /// Unknown identifier.
    NotFound,
    /// Lock contention or serialization failure; the caller may retry.
    Conflict,
    /// Storage or unexpected failure.
    Internal,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Amount must be strictly positive.
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Amount carries more fractional digits than money allows.
    #[error("Amount {0} has more than 2 decimal places")]
    ExcessivePrecision(Decimal),

    /// A party is required but was not supplied.
    #[error("A party is required for {0}")]
    MissingParty(String),

    /// A cash or bank account is required or has the wrong kind.
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// The direction does not fit the record type.
    #[error("Direction mismatch: {0}")]
    DirectionMismatch(String),

    /// A referenced record belongs to another entity.
    #[error("{kind} {id} does not belong to entity {entity_id}")]
    EntityMismatch {
        /// Kind of the referenced record.
        kind: &'static str,
        /// Identifier of the referenced record.
        id: Uuid,
        /// Entity the operation is scoped to.
        entity_id: Uuid,
    },

    /// Any other malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    // ========== Period Errors ==========
    /// The record's governing date falls in a period that is not open.
    #[error("{record} is dated {date}, which falls in a {status} period")]
    LockedPeriod {
        /// Human identifier of the record being mutated.
        record: String,
        /// Governing date that was checked.
        date: NaiveDate,
        /// Status of the period containing the date.
        status: PeriodStatus,
    },

    // ========== Allocation Errors ==========
    /// Requested allocation exceeds the available balance.
    #[error("Over-allocation on {target}: requested {requested}, available {available}")]
    OverAllocation {
        /// Human identifier of the obligation, installment, or settlement.
        target: String,
        /// Cumulative amount requested.
        requested: Decimal,
        /// Amount that was still available.
        available: Decimal,
    },

    // ========== State Errors ==========
    /// The current state forbids the operation.
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Record not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record.
        kind: &'static str,
        /// Identifier that was looked up.
        id: Uuid,
    },

    // ========== Concurrency Errors ==========
    /// Lock contention detected by storage.
    #[error("Concurrent modification detected, please retry: {0}")]
    Conflict(String),

    // ========== Infrastructure Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Shorthand for a [`LedgerError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a [`LedgerError::InvalidStateTransition`].
    #[must_use]
    pub fn transition(rule: impl Into<String>) -> Self {
        Self::InvalidStateTransition(rule.into())
    }

    /// Returns the error family.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NonPositiveAmount(_)
            | Self::ExcessivePrecision(_)
            | Self::MissingParty(_)
            | Self::InvalidAccount(_)
            | Self::DirectionMismatch(_)
            | Self::EntityMismatch { .. }
            | Self::Validation(_) => ErrorKind::Validation,
            Self::LockedPeriod { .. } => ErrorKind::LockedPeriod,
            Self::OverAllocation { .. } => ErrorKind::OverAllocation,
            Self::InvalidStateTransition(_) => ErrorKind::InvalidStateTransition,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::ExcessivePrecision(_) => "EXCESSIVE_PRECISION",
            Self::MissingParty(_) => "MISSING_PARTY",
            Self::InvalidAccount(_) => "INVALID_ACCOUNT",
            Self::DirectionMismatch(_) => "DIRECTION_MISMATCH",
            Self::EntityMismatch { .. } => "ENTITY_MISMATCH",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::LockedPeriod { .. } => "LOCKED_PERIOD",
            Self::OverAllocation { .. } => "OVER_ALLOCATION",
            Self::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Nothing in the ledger retries on its own; callers back off and retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Validates that a monetary amount is strictly positive and has money scale.
///
/// # Errors
///
/// Returns [`LedgerError::NonPositiveAmount`] or [`LedgerError::ExcessivePrecision`].
pub fn ensure_positive_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount(amount));
    }
    if !obligo_shared::types::money::has_money_scale(amount) {
        return Err(LedgerError::ExcessivePrecision(amount));
    }
    Ok(())
}
