//! Allocation domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use obligo_shared::types::{AllocationId, EntityId, InstallmentId, ObligationId, SettlementId};

use crate::obligation::{CreateObligationInput, Installment, Obligation, ObligationService};

/// Allocation status. Cancellation is the only way to undo an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    /// Counts against both sides.
    Active,
    /// Kept as history only.
    Cancelled,
}

impl AllocationStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted allocation of settlement money to an obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    /// Unique identifier.
    pub id: AllocationId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Funding settlement.
    pub settlement_id: SettlementId,
    /// Obligation paid down.
    pub obligation_id: ObligationId,
    /// Installment paid down, if targeted.
    pub installment_id: Option<InstallmentId>,
    /// Amount applied.
    pub amount: Decimal,
    /// Date of the allocation.
    pub allocation_date: NaiveDate,
    /// Current status.
    pub status: AllocationStatus,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Why the allocation was cancelled.
    pub cancel_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Cancellation timestamp.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Allocation {
    /// Returns true if the allocation counts against both sides.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AllocationStatus::Active
    }
}

/// One line of a manual allocation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Obligation to pay down.
    pub obligation_id: ObligationId,
    /// Amount to apply.
    pub amount: Decimal,
    /// Allocation date; defaults to the settlement date.
    pub allocation_date: Option<NaiveDate>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Installment to pay down.
    pub installment_id: Option<InstallmentId>,
}

/// A validated allocation ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAllocation {
    /// Obligation paid down.
    pub obligation_id: ObligationId,
    /// Installment paid down.
    pub installment_id: Option<InstallmentId>,
    /// Amount applied.
    pub amount: Decimal,
    /// Date of the allocation.
    pub allocation_date: NaiveDate,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// An obligation with the live sum of its active allocations.
#[derive(Debug, Clone)]
pub struct OpenObligation {
    /// The obligation.
    pub obligation: Obligation,
    /// Sum of active allocations.
    pub allocated: Decimal,
}

impl OpenObligation {
    /// Unpaid remainder, never negative.
    #[must_use]
    pub fn unpaid(&self) -> Decimal {
        ObligationService::unpaid(self.obligation.total_amount, self.allocated)
    }
}

/// An installment with the live sum of its active allocations.
#[derive(Debug, Clone)]
pub struct InstallmentPosition {
    /// The installment.
    pub installment: Installment,
    /// Sum of active allocations targeting it.
    pub allocated: Decimal,
}

impl InstallmentPosition {
    /// Unpaid remainder, never negative.
    #[must_use]
    pub fn unpaid(&self) -> Decimal {
        ObligationService::unpaid(self.installment.amount, self.allocated)
    }
}

/// A read-only auto-allocation proposal.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationSuggestion {
    /// Candidate obligation.
    pub obligation_id: ObligationId,
    /// Its number.
    pub number: String,
    /// Its due date.
    pub due_date: Option<NaiveDate>,
    /// Its unpaid remainder.
    pub unpaid: Decimal,
    /// What auto-allocation would apply.
    pub suggested_amount: Decimal,
}

/// Advance obligation to create for a settlement's excess.
#[derive(Debug, Clone)]
pub struct OverpaymentPlan {
    /// Obligation to create; its party is the settlement's.
    pub obligation: CreateObligationInput,
    /// Allocation of the full advance to the settlement.
    pub allocation_date: NaiveDate,
}
