//! Counterparty types.
//!
//! Party CRUD lives outside the ledger; the ledger only needs to know that a
//! referenced party exists in the caller's entity and is still active.

use serde::{Deserialize, Serialize};
use std::fmt;

use obligo_shared::types::{BranchId, EntityId, PartyId};

use crate::error::LedgerError;

/// Kind of counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyType {
    /// Buys from the entity.
    Customer,
    /// Sells to the entity.
    Supplier,
    /// Works for the entity.
    Employee,
    /// Anyone else.
    Other,
}

impl PartyType {
    /// Returns the string representation of the party type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Supplier => "supplier",
            Self::Employee => "employee",
            Self::Other => "other",
        }
    }

    /// Parses a party type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "customer" => Some(Self::Customer),
            "supplier" => Some(Self::Supplier),
            "employee" => Some(Self::Employee),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for PartyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A counterparty of obligations and settlements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    /// Unique identifier.
    pub id: PartyId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Kind of counterparty.
    pub party_type: PartyType,
    /// Code, unique per entity and type.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Inactive parties cannot receive new records.
    pub is_active: bool,
}

impl Party {
    /// Checks that the party may be referenced by a new record of `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EntityMismatch`] for a foreign party and
    /// [`LedgerError::Validation`] for an inactive one.
    pub fn ensure_usable(&self, entity_id: EntityId) -> Result<(), LedgerError> {
        if self.entity_id != entity_id {
            return Err(LedgerError::EntityMismatch {
                kind: "party",
                id: self.id.into_inner(),
                entity_id: entity_id.into_inner(),
            });
        }
        if !self.is_active {
            return Err(LedgerError::Validation(format!(
                "party {} is inactive",
                self.code
            )));
        }
        Ok(())
    }
}
