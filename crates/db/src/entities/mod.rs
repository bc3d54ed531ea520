//! `SeaORM` entity definitions.

pub mod accounting_periods;
pub mod allocations;
pub mod bank_accounts;
pub mod cashboxes;
pub mod obligation_installments;
pub mod obligation_lines;
pub mod obligations;
pub mod parties;
pub mod sea_orm_active_enums;
pub mod sequence_counters;
pub mod settlements;
