//! Accounting period lock.
//!
//! # Modules
//!
//! - `types` - Period status, period record and month bounds
//! - `service` - Lock/unlock/close state machine
//! - `guard` - Open-period check for dated record mutations

pub mod guard;
pub mod service;
pub mod types;

pub use guard::{Mutation, assert_open_period, governing_date};
pub use service::{PeriodAction, PeriodService};
pub use types::{AccountingPeriod, PeriodBounds, PeriodStatus};
