//! Sequence keys and identifier formatting.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use obligo_shared::types::{BranchId, EntityId};

use crate::error::LedgerError;

/// Minimum number of digits of the sequence part of an identifier.
pub const SEQUENCE_WIDTH: usize = 6;

/// Prefix used for obligations whose type has no dedicated code.
pub const GENERIC_DOCUMENT_PREFIX: &str = "DC";

/// Prefix used for settlements whose type has no dedicated code.
pub const GENERIC_PAYMENT_PREFIX: &str = "PY";

/// Counter family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceFamily {
    /// Obligation numbers.
    Document,
    /// Settlement numbers.
    Payment,
}

impl SequenceFamily {
    /// Returns the string representation of the family.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Payment => "payment",
        }
    }

    /// Parses a family from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "document" => Some(Self::Document),
            "payment" => Some(Self::Payment),
            _ => None,
        }
    }
}

impl fmt::Display for SequenceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one counter.
///
/// `branch_id` and `sub_type` are optional; storage keys them through
/// [`SequenceKey::branch_scope`] and [`SequenceKey::sub_type_scope`] so that
/// absent values still take part in the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceKey {
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch scope.
    pub branch_id: Option<BranchId>,
    /// Counter family.
    pub family: SequenceFamily,
    /// Optional sub type, usually the record type tag.
    pub sub_type: Option<String>,
    /// Calendar year.
    pub year: i32,
}

impl SequenceKey {
    /// Entity-wide key with a sub type.
    #[must_use]
    pub fn entity_wide(
        entity_id: EntityId,
        family: SequenceFamily,
        sub_type: impl Into<String>,
        year: i32,
    ) -> Self {
        Self {
            entity_id,
            branch_id: None,
            family,
            sub_type: Some(sub_type.into()),
            year,
        }
    }

    /// Narrows the key to one branch.
    #[must_use]
    pub fn with_branch(mut self, branch_id: BranchId) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    /// Branch column value; the nil UUID stands for "no branch".
    #[must_use]
    pub fn branch_scope(&self) -> Uuid {
        self.branch_id.map_or(Uuid::nil(), BranchId::into_inner)
    }

    /// Sub type column value; the empty string stands for "no sub type".
    #[must_use]
    pub fn sub_type_scope(&self) -> &str {
        self.sub_type.as_deref().unwrap_or("")
    }
}

/// Formats an identifier such as `SF2025-000042`.
#[must_use]
pub fn format_number(prefix: &str, year: i32, seq: i64) -> String {
    format!("{prefix}{year:04}-{seq:0width$}", width = SEQUENCE_WIDTH)
}

/// Components of a formatted identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNumber {
    /// Alphabetic prefix.
    pub prefix: String,
    /// Four-digit year.
    pub year: i32,
    /// Sequence value.
    pub seq: i64,
}

/// Splits an identifier back into prefix, year and sequence value.
///
/// # Errors
///
/// Returns [`LedgerError::Validation`] if the identifier is malformed.
pub fn parse_number(number: &str) -> Result<ParsedNumber, LedgerError> {
    let malformed = || LedgerError::Validation(format!("malformed document number: {number}"));

    let (head, seq) = number.rsplit_once('-').ok_or_else(malformed)?;
    if seq.len() < SEQUENCE_WIDTH || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    if head.len() < 5 || !head.is_ascii() {
        return Err(malformed());
    }
    let (prefix, year) = head.split_at(head.len() - 4);
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(malformed());
    }
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    Ok(ParsedNumber {
        prefix: prefix.to_string(),
        year: year.parse().map_err(|_| malformed())?,
        seq: seq.parse().map_err(|_| malformed())?,
    })
}
