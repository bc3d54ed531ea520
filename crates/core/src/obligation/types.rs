//! Obligation domain types.
//!
//! An obligation is an amount owed to the entity (receivable) or by the entity
//! (payable). Its paid/unpaid split and its status are derived from the live
//! sum of active allocations and are never edited directly.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use obligo_shared::types::{
    BranchId, CategoryId, EntityId, InstallmentId, ObligationId, ObligationLineId, PartyId,
};

use crate::numbering::{GENERIC_DOCUMENT_PREFIX, SequenceFamily, SequenceKey};

/// Whether the entity is owed or owes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Owed to the entity.
    Receivable,
    /// Owed by the entity.
    Payable,
}

impl Direction {
    /// The opposite direction.
    #[must_use]
    pub fn mirror(self) -> Self {
        match self {
            Self::Receivable => Self::Payable,
            Self::Payable => Self::Receivable,
        }
    }

    /// Returns the string representation of the direction.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receivable => "receivable",
            Self::Payable => "payable",
        }
    }

    /// Parses a direction from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "receivable" => Some(Self::Receivable),
            "payable" => Some(Self::Payable),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Business type of an obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationType {
    /// Sale to a customer.
    CustomerInvoice,
    /// Purchase from a supplier.
    SupplierInvoice,
    /// Salary owed to an employee.
    PayrollDue,
    /// Overtime owed to an employee.
    OvertimeDue,
    /// Advance paid out, to be recovered.
    AdvanceGiven,
    /// Advance received, to be delivered against.
    AdvanceReceived,
    /// Operating expense.
    ExpenseDue,
    /// Miscellaneous income.
    IncomeDue,
    /// Anything else; direction must be given explicitly.
    Other,
}

impl ObligationType {
    /// All obligation types.
    pub const ALL: [Self; 9] = [
        Self::CustomerInvoice,
        Self::SupplierInvoice,
        Self::PayrollDue,
        Self::OvertimeDue,
        Self::AdvanceGiven,
        Self::AdvanceReceived,
        Self::ExpenseDue,
        Self::IncomeDue,
        Self::Other,
    ];

    /// Returns the string tag of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerInvoice => "customer_invoice",
            Self::SupplierInvoice => "supplier_invoice",
            Self::PayrollDue => "payroll_due",
            Self::OvertimeDue => "overtime_due",
            Self::AdvanceGiven => "advance_given",
            Self::AdvanceReceived => "advance_received",
            Self::ExpenseDue => "expense_due",
            Self::IncomeDue => "income_due",
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
            Self::CustomerInvoice => "SF",
            Self::SupplierInvoice => "PF",
            Self::PayrollDue => "PR",
            Self::OvertimeDue => "OT",
            Self::AdvanceGiven => "AG",
            Self::AdvanceReceived => "AR",
            Self::ExpenseDue => "EX",
            Self::IncomeDue => "IN",
            Self::Other => GENERIC_DOCUMENT_PREFIX,
        }
    }

    /// Direction implied by the type, `None` when it must be supplied.
    #[must_use]
    pub fn default_direction(&self) -> Option<Direction> {
        match self {
            Self::CustomerInvoice | Self::AdvanceGiven | Self::IncomeDue => {
                Some(Direction::Receivable)
            }
            Self::SupplierInvoice
            | Self::PayrollDue
            | Self::OvertimeDue
            | Self::AdvanceReceived
            | Self::ExpenseDue => Some(Direction::Payable),
            Self::Other => None,
        }
    }
}

impl fmt::Display for ObligationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Obligation status.
///
/// `Partial` and `Settled` are derived from allocations; `Cancelled` and
/// `Reversed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObligationStatus {
    /// Not yet final; may stay unallocated.
    Draft,
    /// Nothing paid.
    Pending,
    /// Partly paid.
    Partial,
    /// Fully paid.
    Settled,
    /// Withdrawn before any payment.
    Cancelled,
    /// Neutralized by a reversal twin, or is one.
    Reversed,
}

impl ObligationStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Settled => "settled",
            Self::Cancelled => "cancelled",
            Self::Reversed => "reversed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "partial" => Some(Self::Partial),
            "settled" => Some(Self::Settled),
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

    /// Returns true if the obligation still expects payment.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Partial)
    }

    /// Returns true if header fields may still be edited.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Pending)
    }
}

impl fmt::Display for ObligationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of the upstream record an obligation was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Sales document.
    Sale,
    /// Purchase document.
    Purchase,
    /// Payroll run.
    Payroll,
    /// Overtime sheet.
    Overtime,
    /// Expense claim.
    Expense,
    /// Settlement whose excess became an advance.
    Overpayment,
    /// Any other upstream system.
    Other(String),
}

impl SourceKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sale => "sale",
            Self::Purchase => "purchase",
            Self::Payroll => "payroll",
            Self::Overtime => "overtime",
            Self::Expense => "expense",
            Self::Overpayment => "overpayment",
            Self::Other(kind) => kind,
        }
    }

    /// Parses a kind; unknown strings become [`SourceKind::Other`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "sale" => Self::Sale,
            "purchase" => Self::Purchase,
            "payroll" => Self::Payroll,
            "overtime" => Self::Overtime,
            "expense" => Self::Expense,
            "overpayment" => Self::Overpayment,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Reference to the upstream record an obligation was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Upstream kind.
    pub kind: SourceKind,
    /// Upstream identifier.
    pub id: Uuid,
}

/// A persisted obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    /// Unique identifier.
    pub id: ObligationId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Human identifier, unique per entity.
    pub number: String,
    /// Business type.
    pub obligation_type: ObligationType,
    /// Receivable or payable.
    pub direction: Direction,
    /// Counterparty.
    pub party_id: PartyId,
    /// Document date; governs the period check.
    pub obligation_date: NaiveDate,
    /// Optional due date, never before `obligation_date`.
    pub due_date: Option<NaiveDate>,
    /// Amount owed.
    pub total_amount: Decimal,
    /// Opaque category reference.
    pub category_id: Option<CategoryId>,
    /// Current status.
    pub status: ObligationStatus,
    /// Set on a reversal twin: the obligation it reverses.
    pub reversed_obligation_id: Option<ObligationId>,
    /// Set on a reversed original: its reversal twin.
    pub reversal_obligation_id: Option<ObligationId>,
    /// Upstream record.
    pub source: Option<SourceRef>,
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

impl Obligation {
    /// Returns true if this obligation is itself a reversal twin.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        self.reversed_obligation_id.is_some()
    }

    /// Returns true if this obligation has been reversed.
    #[must_use]
    pub fn has_reversal(&self) -> bool {
        self.reversal_obligation_id.is_some()
    }
}

/// One itemized line as entered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObligationLineInput {
    /// Line description.
    pub description: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Unit price.
    pub unit_price: Decimal,
    /// Discount in percent (0-100).
    pub discount_percent: Decimal,
    /// Tax in percent.
    pub tax_percent: Decimal,
}

/// An itemized line with its computed amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObligationLine {
    /// Unique identifier.
    pub id: ObligationLineId,
    /// Position within the obligation, starting at 1.
    pub line_no: i32,
    /// Line description.
    pub description: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Unit price.
    pub unit_price: Decimal,
    /// Discount in percent.
    pub discount_percent: Decimal,
    /// Tax in percent.
    pub tax_percent: Decimal,
    /// Amount after discount.
    pub subtotal: Decimal,
    /// Tax on the subtotal.
    pub tax: Decimal,
    /// Subtotal plus tax.
    pub total: Decimal,
}

/// One scheduled part as entered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentInput {
    /// When this part falls due.
    pub due_date: NaiveDate,
    /// Amount of this part.
    pub amount: Decimal,
}

/// A scheduled part of an obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    /// Unique identifier.
    pub id: InstallmentId,
    /// Parent obligation.
    pub obligation_id: ObligationId,
    /// Position within the schedule, starting at 1.
    pub sequence_no: i32,
    /// When this part falls due.
    pub due_date: NaiveDate,
    /// Amount of this part.
    pub amount: Decimal,
}

/// Input for creating an obligation.
#[derive(Debug, Clone)]
pub struct CreateObligationInput {
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Business type.
    pub obligation_type: ObligationType,
    /// Direction; required for [`ObligationType::Other`].
    pub direction: Option<Direction>,
    /// Counterparty.
    pub party_id: PartyId,
    /// Document date.
    pub obligation_date: NaiveDate,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Amount owed.
    pub total_amount: Decimal,
    /// Opaque category reference.
    pub category_id: Option<CategoryId>,
    /// Upstream record.
    pub source: Option<SourceRef>,
    /// External reference.
    pub reference: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Internal notes.
    pub notes: Option<String>,
    /// Create as `draft` instead of `pending`.
    pub as_draft: bool,
    /// Itemized lines.
    pub lines: Vec<ObligationLineInput>,
    /// Payment schedule; empty for a single due date.
    pub installments: Vec<InstallmentInput>,
}

/// A validated obligation ready to be numbered and inserted.
#[derive(Debug, Clone)]
pub struct NewObligation {
    /// Pre-generated identifier.
    pub id: ObligationId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Business type.
    pub obligation_type: ObligationType,
    /// Resolved direction.
    pub direction: Direction,
    /// Counterparty.
    pub party_id: PartyId,
    /// Document date.
    pub obligation_date: NaiveDate,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Amount owed.
    pub total_amount: Decimal,
    /// Opaque category reference.
    pub category_id: Option<CategoryId>,
    /// Initial status.
    pub status: ObligationStatus,
    /// Set when this is a reversal twin.
    pub reversed_obligation_id: Option<ObligationId>,
    /// Upstream record.
    pub source: Option<SourceRef>,
    /// External reference.
    pub reference: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Internal notes.
    pub notes: Option<String>,
    /// Reason recorded with the initial status.
    pub status_reason: Option<String>,
    /// Computed lines.
    pub lines: Vec<ObligationLine>,
    /// Payment schedule.
    pub installments: Vec<Installment>,
}

impl NewObligation {
    /// Counter this obligation draws its number from.
    #[must_use]
    pub fn sequence_key(&self) -> SequenceKey {
        SequenceKey::entity_wide(
            self.entity_id,
            SequenceFamily::Document,
            self.obligation_type.as_str(),
            self.obligation_date.year(),
        )
    }

    /// Number prefix.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        self.obligation_type.prefix()
    }
}

/// Editable obligation fields.
///
/// For nullable fields the outer `Option` says whether the field changes and
/// the inner one is the new value.
#[derive(Debug, Clone, Default)]
pub struct ObligationPatch {
    /// New due date.
    pub due_date: Option<Option<NaiveDate>>,
    /// New category.
    pub category_id: Option<Option<CategoryId>>,
    /// New external reference.
    pub reference: Option<Option<String>>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New notes.
    pub notes: Option<Option<String>>,
}

/// Filter for obligation listings.
#[derive(Debug, Clone, Default)]
pub struct ObligationFilter {
    /// Restrict to one party.
    pub party_id: Option<PartyId>,
    /// Restrict to one direction.
    pub direction: Option<Direction>,
    /// Restrict to these statuses; empty means all.
    pub statuses: Vec<ObligationStatus>,
    /// Earliest obligation date.
    pub date_from: Option<NaiveDate>,
    /// Latest obligation date.
    pub date_to: Option<NaiveDate>,
}

/// An obligation with its derived payment figures.
#[derive(Debug, Clone, Serialize)]
pub struct ObligationPosition {
    /// The obligation.
    pub obligation: Obligation,
    /// Sum of active allocations.
    pub paid: Decimal,
    /// Total minus paid, never negative.
    pub unpaid: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags_round_trip() {
        for ty in ObligationType::ALL {
            assert_eq!(ObligationType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ObligationType::parse("credit_note"), None);
    }

    #[test]
    fn test_default_directions() {
        assert_eq!(
            ObligationType::CustomerInvoice.default_direction(),
            Some(Direction::Receivable)
        );
        assert_eq!(
            ObligationType::PayrollDue.default_direction(),
            Some(Direction::Payable)
        );
        assert_eq!(
            ObligationType::AdvanceGiven.default_direction(),
            Some(Direction::Receivable)
        );
        assert_eq!(
            ObligationType::AdvanceReceived.default_direction(),
            Some(Direction::Payable)
        );
        assert_eq!(ObligationType::Other.default_direction(), None);
    }

    #[test]
    fn test_other_type_uses_generic_prefix() {
        assert_eq!(ObligationType::Other.prefix(), GENERIC_DOCUMENT_PREFIX);
        assert_eq!(ObligationType::CustomerInvoice.prefix(), "SF");
    }

    #[test]
    fn test_source_kind_parse_keeps_unknown_kinds() {
        assert_eq!(SourceKind::parse("payroll"), SourceKind::Payroll);
        assert_eq!(
            SourceKind::parse("rental_contract"),
            SourceKind::Other("rental_contract".to_string())
        );
        assert_eq!(SourceKind::parse("rental_contract").as_str(), "rental_contract");
    }

    #[test]
    fn test_status_predicates() {
        assert!(ObligationStatus::Cancelled.is_terminal());
        assert!(ObligationStatus::Reversed.is_terminal());
        assert!(!ObligationStatus::Settled.is_terminal());
        assert!(ObligationStatus::Partial.is_open());
        assert!(!ObligationStatus::Draft.is_open());
        assert!(ObligationStatus::Draft.is_editable());
        assert!(!ObligationStatus::Partial.is_editable());
    }
}
