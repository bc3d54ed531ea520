//! Allocation engine.
//!
//! Links settlement money to obligations. Manual batches are checked
//! cumulatively; auto-allocation fills the oldest-due obligations first;
//! excess money becomes an advance obligation.
//!
//! # Modules
//!
//! - `types` - Allocation records, requests, plans and suggestions
//! - `engine` - Planning and cancellation rules

pub mod engine;
pub mod types;

#[cfg(test)]
mod engine_props;

pub use engine::AllocationEngine;
pub use types::{
    Allocation, AllocationRequest, AllocationStatus, AllocationSuggestion, InstallmentPosition,
    OpenObligation, OverpaymentPlan, PlannedAllocation,
};
