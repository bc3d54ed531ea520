//! Period state machine.

use crate::error::LedgerError;
use crate::period::types::PeriodStatus;

/// Administrative action on a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodAction {
    /// Freeze an open period.
    Lock,
    /// Reopen a locked period.
    Unlock,
    /// Freeze permanently.
    Close,
}

impl PeriodAction {
    /// Status the period ends in after the action.
    #[must_use]
    pub fn target(&self) -> PeriodStatus {
        match self {
            Self::Lock => PeriodStatus::Locked,
            Self::Unlock => PeriodStatus::Open,
            Self::Close => PeriodStatus::Closed,
        }
    }

    /// Returns the string representation of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Close => "close",
        }
    }
}

/// Stateless service for period transitions.
pub struct PeriodService;

impl PeriodService {
    /// Validates a transition.
    ///
    /// Returns `Ok(None)` when the period is already in the target status,
    /// `Ok(Some(target))` when a write is needed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] when leaving `closed`.
    pub fn transition(
        current: PeriodStatus,
        action: PeriodAction,
    ) -> Result<Option<PeriodStatus>, LedgerError> {
        let target = action.target();
        if current == target {
            return Ok(None);
        }
        match (current, action) {
            (PeriodStatus::Open, PeriodAction::Lock)
            | (PeriodStatus::Locked, PeriodAction::Unlock)
            | (PeriodStatus::Open | PeriodStatus::Locked, PeriodAction::Close) => Ok(Some(target)),
            _ => Err(LedgerError::transition(format!(
                "cannot {} a {current} period",
                action.as_str()
            ))),
        }
    }
}
