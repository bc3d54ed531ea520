//! Ledger repositories.
//!
//! Repositories own the transactions: they lock the rows an operation
//! touches, read live allocation sums and period status, let the core rules
//! decide, then write. Derived figures are never stored.

pub mod allocation;
pub mod balance;
pub mod cash_account;
pub mod obligation;
pub mod party;
pub mod period;
pub mod reversal;
pub mod sequence;
pub mod settlement;

mod sums;

pub use allocation::{AllocationRepository, OverpaymentOutcome};
pub use balance::{AgingFilter, BalanceRepository};
pub use cash_account::{CashAccountRepository, CreateCashAccountInput};
pub use obligation::ObligationRepository;
pub use party::{CreatePartyInput, PartyRepository};
pub use period::PeriodRepository;
pub use reversal::{ObligationReversal, ReversalRepository, SettlementReversal};
pub use sequence::SequenceRepository;
pub use settlement::{SettlementFilter, SettlementRepository};
