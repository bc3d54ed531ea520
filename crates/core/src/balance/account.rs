//! Cash and bank account balances.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use obligo_shared::types::{BranchId, EntityId};

use crate::settlement::{AccountRef, FlowDirection, Settlement};

/// A cashbox or bank account with its opening balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashAccount {
    /// Which account.
    pub account: AccountRef,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Optional branch.
    pub branch_id: Option<BranchId>,
    /// Display name.
    pub name: String,
    /// Balance before the first settlement.
    pub opening_balance: Decimal,
    /// Date the opening balance is effective from.
    pub opening_balance_date: Option<NaiveDate>,
    /// Inactive accounts keep their history.
    pub is_active: bool,
}

/// Signed effect of a settlement on `account`.
///
/// Only posted settlements (confirmed, or members of a reversal pair) move
/// money. The source account moves with the settlement's direction; the
/// destination of a transfer moves the opposite way. The gross amount is
/// used; fees are informational.
#[must_use]
pub fn settlement_effect(settlement: &Settlement, account: AccountRef) -> Decimal {
    if !settlement.status.is_posted() {
        return Decimal::ZERO;
    }
    let signed = match settlement.direction {
        FlowDirection::In => settlement.amount,
        FlowDirection::Out => -settlement.amount,
    };
    if settlement.account == account {
        signed
    } else if settlement.destination == Some(account) {
        -signed
    } else {
        Decimal::ZERO
    }
}

/// Balance of `account` at the end of `as_of`.
///
/// The opening balance counts once its date is reached (or always, when it
/// has no date); settlements count up to and including `as_of`.
#[must_use]
pub fn balance_as_of(account: &CashAccount, settlements: &[Settlement], as_of: NaiveDate) -> Decimal {
    let opening = match account.opening_balance_date {
        Some(date) if date > as_of => Decimal::ZERO,
        _ => account.opening_balance,
    };
    settlements
        .iter()
        .filter(|s| s.settlement_date <= as_of)
        .map(|s| settlement_effect(s, account.account))
        .fold(opening, |acc, effect| acc + effect)
}
