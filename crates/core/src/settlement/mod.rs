//! Settlement lifecycle.
//!
//! # Modules
//!
//! - `types` - Settlement, account reference, type/direction/status enums
//! - `service` - Create/update/confirm/cancel/delete rules

pub mod service;
pub mod types;

pub use service::SettlementService;
pub use types::{
    AccountKind, AccountRef, CreateSettlementInput, FlowDirection, NewSettlement, Settlement,
    SettlementPatch, SettlementPosition, SettlementStatus, SettlementType,
};
