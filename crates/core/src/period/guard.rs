//! Period guard for mutations of dated records.

use chrono::NaiveDate;

use crate::error::LedgerError;
use crate::period::types::PeriodStatus;

/// Kind of change being made to a dated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// New record.
    Create,
    /// Field or status change other than neutralization.
    Update,
    /// Physical deletion.
    Delete,
    /// Transition to `cancelled` or `reversed`.
    Neutralize,
}

/// Fails unless `status` allows `mutation` of a record dated `date`.
///
/// Neutralizing transitions pass in any period.
///
/// # Errors
///
/// Returns [`LedgerError::LockedPeriod`] carrying `record`.
pub fn assert_open_period(
    record: &str,
    date: NaiveDate,
    status: PeriodStatus,
    mutation: Mutation,
) -> Result<(), LedgerError> {
    if status.is_open() || mutation == Mutation::Neutralize {
        return Ok(());
    }
    Err(LedgerError::LockedPeriod {
        record: record.to_string(),
        date,
        status,
    })
}

/// Governing date of an allocation: the later of the two sides.
#[must_use]
pub fn governing_date(obligation_date: NaiveDate, settlement_date: NaiveDate) -> NaiveDate {
    obligation_date.max(settlement_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[rstest]
    #[case(Mutation::Create)]
    #[case(Mutation::Update)]
    #[case(Mutation::Delete)]
    #[case(Mutation::Neutralize)]
    fn test_open_period_allows_everything(#[case] mutation: Mutation) {
        assert!(assert_open_period("SF2025-000001", date(), PeriodStatus::Open, mutation).is_ok());
    }

    #[rstest]
    #[case(PeriodStatus::Locked, Mutation::Create)]
    #[case(PeriodStatus::Locked, Mutation::Update)]
    #[case(PeriodStatus::Locked, Mutation::Delete)]
    #[case(PeriodStatus::Closed, Mutation::Update)]
    #[case(PeriodStatus::Closed, Mutation::Delete)]
    fn test_frozen_period_blocks(#[case] status: PeriodStatus, #[case] mutation: Mutation) {
        let err = assert_open_period("SF2025-000001", date(), status, mutation).unwrap_err();
        match err {
            LedgerError::LockedPeriod { record, .. } => assert_eq!(record, "SF2025-000001"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    #[case(PeriodStatus::Locked)]
    #[case(PeriodStatus::Closed)]
    fn test_neutralize_passes_frozen_period(#[case] status: PeriodStatus) {
        assert!(assert_open_period("CI2025-000003", date(), status, Mutation::Neutralize).is_ok());
    }

    #[test]
    fn test_governing_date_is_the_later_side() {
        let early = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let late = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(governing_date(early, late), late);
        assert_eq!(governing_date(late, early), late);
    }
}
