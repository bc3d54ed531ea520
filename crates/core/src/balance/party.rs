//! Party balance projections.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use obligo_shared::types::PartyId;

use crate::obligation::{Direction, ObligationPosition};

/// Sum of unpaid amounts of open obligations in one direction.
///
/// Drafts, settled, cancelled and reversed obligations contribute nothing.
#[must_use]
pub fn open_balance(positions: &[ObligationPosition], direction: Direction) -> Decimal {
    positions
        .iter()
        .filter(|p| p.obligation.direction == direction && p.obligation.status.is_open())
        .map(|p| p.unpaid)
        .sum()
}

/// What a party owes the entity and what the entity owes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyStatement {
    /// The party.
    pub party_id: PartyId,
    /// Unpaid receivables.
    pub receivable: Decimal,
    /// Unpaid payables.
    pub payable: Decimal,
    /// Receivable minus payable.
    pub net: Decimal,
    /// Number of open obligations.
    pub open_obligations: usize,
}

impl PartyStatement {
    /// Builds the statement from the party's obligation positions.
    #[must_use]
    pub fn from_positions(party_id: PartyId, positions: &[ObligationPosition]) -> Self {
        let receivable = open_balance(positions, Direction::Receivable);
        let payable = open_balance(positions, Direction::Payable);
        Self {
            party_id,
            receivable,
            payable,
            net: receivable - payable,
            open_obligations: positions
                .iter()
                .filter(|p| p.obligation.status.is_open())
                .count(),
        }
    }
}
