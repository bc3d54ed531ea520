//! Read-only balance projections.
//!
//! Nothing here is stored: party balances, cash account balances and aging
//! are derived on demand from obligations, settlements and allocations.
//!
//! # Modules
//!
//! - `party` - Receivable/payable balances and party statements
//! - `account` - Cashbox and bank account balances as of a date
//! - `aging` - Days-overdue buckets

pub mod account;
pub mod aging;
pub mod party;

pub use account::{CashAccount, balance_as_of, settlement_effect};
pub use aging::{AgingBucket, AgingReport, DEFAULT_AGING_EDGES, NOT_DUE};
pub use party::{PartyStatement, open_balance};
