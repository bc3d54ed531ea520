//! Settlement domain types.
//!
//! A settlement is money moving through a cashbox or bank account. Its
//! allocated/unallocated split is derived from active allocations.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use obligo_shared::types::{BankAccountId, BranchId, CashboxId, EntityId, PartyId, SettlementId};

use crate::error::LedgerError;
use crate::numbering::{GENERIC_PAYMENT_PREFIX, SequenceFamily, SequenceKey};
use crate::obligation::Direction;

/// Whether money enters or leaves the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    /// Money received.
    In,
    /// Money paid out.
    Out,
}

impl FlowDirection {
    /// The opposite direction.
    #[must_use]
    pub fn mirror(self) -> Self {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
        }
    }

    /// Obligation direction this flow can pay down.
    #[must_use]
    pub fn settles(self) -> Direction {
        match self {
            Self::In => Direction::Receivable,
            Self::Out => Direction::Payable,
        }
    }

    /// Returns the string representation of the direction.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }

    /// Parses a direction from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            _ => None,
        }
    }
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of account a settlement type must use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    /// Physical cash.
    Cashbox,
    /// Bank account.
    Bank,
}

/// Business type of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementType {
    /// Cash received.
    CashIn,
    /// Cash paid out.
    CashOut,
    /// Bank receipt.
    BankIn,
    /// Bank payment.
    BankOut,
    /// Movement between two of the entity's own accounts.
    Transfer,
    /// Cheque received.
    ChequeIn,
    /// Cheque issued.
    ChequeOut,
    /// Offset between receivables and payables; direction must be given.
    InternalOffset,
    /// Anything else; direction must be given.
    Other,
}

impl SettlementType {
    /// All settlement types.
    pub const ALL: [Self; 9] = [
        Self::CashIn,
        Self::CashOut,
        Self::BankIn,
        Self::BankOut,
        Self::Transfer,
        Self::ChequeIn,
        Self::ChequeOut,
        Self::InternalOffset,
        Self::Other,
    ];

    /// Returns the string tag of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CashIn => "cash_in",
            Self::CashOut => "cash_out",
            Self::BankIn => "bank_in",
            Self::BankOut => "bank_out",
            Self::Transfer => "transfer",
            Self::ChequeIn => "cheque_in",
            Self::ChequeOut => "cheque_out",
            Self::InternalOffset => "internal_offset",
            Self::Other => "other",
        }
    }

    /// Parses a type from its tag.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == s)
    }

    /// Number prefix of the type.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::CashIn => "CI",
            Self::CashOut => "CO",
            Self::BankIn => "BI",
            Self::BankOut => "BO",
            Self::Transfer => "TR",
            Self::ChequeIn => "QI",
            Self::ChequeOut => "QO",
            Self::InternalOffset => "IO",
            Self::Other => GENERIC_PAYMENT_PREFIX,
        }
    }

    /// Direction implied by the type, `None` when it must be supplied.
    #[must_use]
    pub fn default_direction(&self) -> Option<FlowDirection> {
        match self {
            Self::CashIn | Self::BankIn | Self::ChequeIn => Some(FlowDirection::In),
            Self::CashOut | Self::BankOut | Self::ChequeOut | Self::Transfer => {
                Some(FlowDirection::Out)
            }
            Self::InternalOffset | Self::Other => None,
        }
    }

    /// Account kind the source account must have, if constrained.
    #[must_use]
    pub fn required_account(&self) -> Option<AccountKind> {
        match self {
            Self::CashIn | Self::CashOut => Some(AccountKind::Cashbox),
            Self::BankIn | Self::BankOut | Self::ChequeIn | Self::ChequeOut => {
                Some(AccountKind::Bank)
            }
            Self::Transfer | Self::InternalOffset | Self::Other => None,
        }
    }

    /// Returns true for account-to-account transfers.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        *self == Self::Transfer
    }
}

impl fmt::Display for SettlementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Not yet effective.
    Draft,
    /// Effective; counts in account balances.
    Confirmed,
    /// Withdrawn.
    Cancelled,
    /// Neutralized by a reversal twin, or is one.
    Reversed,
}

impl SettlementStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Reversed => "reversed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "reversed" => Some(Self::Reversed),
            _ => None,
        }
    }

    /// Returns true if the status never changes again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Reversed)
    }

    /// Returns true if the settlement moved money: confirmed, or part of a
    /// reversal pair.
    #[must_use]
    pub fn is_posted(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Reversed)
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cashbox or a bank account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum AccountRef {
    /// A cashbox.
    Cashbox(CashboxId),
    /// A bank account.
    Bank(BankAccountId),
}

impl AccountRef {
    /// Kind of the account.
    #[must_use]
    pub fn kind(&self) -> AccountKind {
        match self {
            Self::Cashbox(_) => AccountKind::Cashbox,
            Self::Bank(_) => AccountKind::Bank,
        }
    }

    /// Builds a reference from a cashbox/bank column pair.
    ///
    /// Returns `Ok(None)` when both are empty.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAccount`] when both are set.
    pub fn from_columns(
        cashbox_id: Option<CashboxId>,
        bank_account_id: Option<BankAccountId>,
    ) -> Result<Option<Self>, LedgerError> {
        match (cashbox_id, bank_account_id) {
            (None, None) => Ok(None),
            (Some(cashbox), None) => Ok(Some(Self::Cashbox(cashbox))),
            (None, Some(bank)) => Ok(Some(Self::Bank(bank))),
            (Some(_), Some(_)) => Err(LedgerError::InvalidAccount(
                "an account is either a cashbox or a bank account, not both".to_string(),
            )),
        }
    }

    /// Splits the reference into a cashbox/bank column pair.
    #[must_use]
    pub fn to_columns(self) -> (Option<CashboxId>, Option<BankAccountId>) {
        match self {
            Self::Cashbox(id) => (Some(id), None),
            Self::Bank(id) => (None, Some(id)),
        }
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cashbox(id) => write!(f, "cashbox {id}"),
            Self::Bank(id) => write!(f, "bank account {id}"),
        }
    }
}

/// A persisted settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    /// Unique identifier.
    pub id: SettlementId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Human identifier, unique per entity.
    pub number: String,
    /// Business type.
    pub settlement_type: SettlementType,
    /// In or out.
    pub direction: FlowDirection,
    /// Counterparty; absent for transfers.
    pub party_id: Option<PartyId>,
    /// Account the money moves through.
    pub account: AccountRef,
    /// Receiving account of a transfer.
    pub destination: Option<AccountRef>,
    /// Value date; governs the period check.
    pub settlement_date: NaiveDate,
    /// Gross amount.
    pub amount: Decimal,
    /// Bank or processing fee.
    pub fee_amount: Decimal,
    /// Gross minus fee, fixed at creation.
    pub net_amount: Decimal,
    /// Current status.
    pub status: SettlementStatus,
    /// Set on a reversal twin: the settlement it reverses.
    pub reversed_settlement_id: Option<SettlementId>,
    /// Set on a reversed original: its reversal twin.
    pub reversal_settlement_id: Option<SettlementId>,
    /// External reference.
    pub reference: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Internal notes.
    pub notes: Option<String>,
    /// Cancellation or reversal reason.
    pub status_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// Returns true if this settlement is itself a reversal twin.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        self.reversed_settlement_id.is_some()
    }

    /// Returns true if this settlement has been reversed.
    #[must_use]
    pub fn has_reversal(&self) -> bool {
        self.reversal_settlement_id.is_some()
    }
}

/// Input for creating a settlement.
#[derive(Debug, Clone)]
pub struct CreateSettlementInput {
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Business type.
    pub settlement_type: SettlementType,
    /// Direction; required for internal offsets and `other`.
    pub direction: Option<FlowDirection>,
    /// Counterparty; required except for transfers.
    pub party_id: Option<PartyId>,
    /// Account the money moves through.
    pub account: AccountRef,
    /// Receiving account; transfers only.
    pub destination: Option<AccountRef>,
    /// Value date.
    pub settlement_date: NaiveDate,
    /// Gross amount.
    pub amount: Decimal,
    /// Fee, defaults to zero.
    pub fee_amount: Decimal,
    /// Net amount if the caller computed one; must equal amount minus fee.
    pub net_amount: Option<Decimal>,
    /// External reference.
    pub reference: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Internal notes.
    pub notes: Option<String>,
    /// Confirm immediately instead of creating a draft.
    pub confirm: bool,
}

/// A validated settlement ready to be numbered and inserted.
#[derive(Debug, Clone)]
pub struct NewSettlement {
    /// Pre-generated identifier.
    pub id: SettlementId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Business type.
    pub settlement_type: SettlementType,
    /// Resolved direction.
    pub direction: FlowDirection,
    /// Counterparty.
    pub party_id: Option<PartyId>,
    /// Account the money moves through.
    pub account: AccountRef,
    /// Receiving account of a transfer.
    pub destination: Option<AccountRef>,
    /// Value date.
    pub settlement_date: NaiveDate,
    /// Gross amount.
    pub amount: Decimal,
    /// Fee.
    pub fee_amount: Decimal,
    /// Gross minus fee.
    pub net_amount: Decimal,
    /// Initial status.
    pub status: SettlementStatus,
    /// Set when this is a reversal twin.
    pub reversed_settlement_id: Option<SettlementId>,
    /// External reference.
    pub reference: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Internal notes.
    pub notes: Option<String>,
    /// Reason recorded with the initial status.
    pub status_reason: Option<String>,
}

impl NewSettlement {
    /// Counter this settlement draws its number from.
    #[must_use]
    pub fn sequence_key(&self) -> SequenceKey {
        SequenceKey::entity_wide(
            self.entity_id,
            SequenceFamily::Payment,
            self.settlement_type.as_str(),
            self.settlement_date.year(),
        )
    }

    /// Number prefix.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        self.settlement_type.prefix()
    }
}

/// Editable settlement fields.
#[derive(Debug, Clone, Default)]
pub struct SettlementPatch {
    /// New value date; drafts only.
    pub settlement_date: Option<NaiveDate>,
    /// New external reference.
    pub reference: Option<Option<String>>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New notes.
    pub notes: Option<Option<String>>,
}

/// A settlement with its derived allocation figures.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementPosition {
    /// The settlement.
    pub settlement: Settlement,
    /// Sum of active allocations.
    pub allocated: Decimal,
    /// Amount minus allocated, never negative.
    pub unallocated: Decimal,
}
