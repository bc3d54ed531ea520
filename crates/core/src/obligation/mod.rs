//! Obligation lifecycle.
//!
//! # Modules
//!
//! - `types` - Obligation, lines, installments, type/direction/status enums
//! - `service` - Create/update/cancel/finalize/delete rules and status derivation

pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use service::ObligationService;
pub use types::{
    CreateObligationInput, Direction, Installment, InstallmentInput, NewObligation, Obligation,
    ObligationFilter, ObligationLine, ObligationLineInput, ObligationPatch, ObligationPosition,
    ObligationStatus, ObligationType, SourceKind, SourceRef,
};
