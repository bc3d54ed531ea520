//! Core business logic for Obligo.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `numbering` - Sequence keys and document number formatting
//! - `period` - Accounting period lock and open-period guard
//! - `party` - Counterparty types
//! - `obligation` - Obligation lifecycle and status derivation
//! - `settlement` - Settlement lifecycle
//! - `allocation` - Allocation engine (manual, auto, overpayment)
//! - `reversal` - Reversal twins for posted records
//! - `balance` - Party balances, cash account balances and aging

pub mod allocation;
pub mod balance;
pub mod error;
pub mod numbering;
pub mod obligation;
pub mod party;
pub mod period;
pub mod reversal;
pub mod settlement;

pub use error::{ErrorKind, LedgerError};
