//! Accounting period types.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use obligo_shared::types::{AccountingPeriodId, EntityId, UserId};

use crate::error::LedgerError;

/// Status of an accounting period.
///
/// The valid transitions are:
/// - Open → Locked (lock)
/// - Locked → Open (unlock)
/// - Open | Locked → Closed (close, terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    /// Dated records may be created and changed.
    Open,
    /// Temporarily frozen, can be reopened.
    Locked,
    /// Permanently frozen.
    Closed,
}

impl PeriodStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Locked => "locked",
            Self::Closed => "closed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "locked" => Some(Self::Locked),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Returns true if dated records may be mutated.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self == Self::Open
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One calendar month of one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Unique identifier.
    pub id: AccountingPeriodId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: u32,
    /// First day of the month.
    pub start_date: NaiveDate,
    /// Last day of the month.
    pub end_date: NaiveDate,
    /// Current status.
    pub status: PeriodStatus,
    /// Who last locked the period.
    pub locked_by: Option<UserId>,
    /// When the period was last locked.
    pub locked_at: Option<DateTime<Utc>>,
    /// Who closed the period.
    pub closed_by: Option<UserId>,
    /// When the period was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Free-form notes from the last transition.
    pub notes: Option<String>,
}

impl AccountingPeriod {
    /// Returns true if dated records may be mutated.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// Year, month and date range of the calendar month containing a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBounds {
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: u32,
    /// First day of the month.
    pub start_date: NaiveDate,
    /// Last day of the month.
    pub end_date: NaiveDate,
}

impl PeriodBounds {
    /// Bounds of the month containing `date`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if the month end is not representable.
    pub fn for_date(date: NaiveDate) -> Result<Self, LedgerError> {
        Self::for_month(date.year(), date.month())
    }

    /// Bounds of the given calendar month.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if `month` is outside 1-12.
    pub fn for_month(year: i32, month: u32) -> Result<Self, LedgerError> {
        let invalid = || LedgerError::Validation(format!("invalid period {year}-{month:02}"));

        let start_date = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let end_date = start_date
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or_else(invalid)?;

        Ok(Self {
            year,
            month,
            start_date,
            end_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(date(2025, 1, 15), date(2025, 1, 1), date(2025, 1, 31))]
    #[case(date(2024, 2, 29), date(2024, 2, 1), date(2024, 2, 29))]
    #[case(date(2025, 2, 1), date(2025, 2, 1), date(2025, 2, 28))]
    #[case(date(2025, 12, 31), date(2025, 12, 1), date(2025, 12, 31))]
    fn test_bounds_for_date(
        #[case] input: NaiveDate,
        #[case] start: NaiveDate,
        #[case] end: NaiveDate,
    ) {
        let bounds = PeriodBounds::for_date(input).unwrap();
        assert_eq!(bounds.start_date, start);
        assert_eq!(bounds.end_date, end);
        assert_eq!(bounds.month, input.month());
    }

    #[test]
    fn test_bounds_reject_invalid_month() {
        assert!(PeriodBounds::for_month(2025, 0).is_err());
        assert!(PeriodBounds::for_month(2025, 13).is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(PeriodStatus::parse("LOCKED"), Some(PeriodStatus::Locked));
        assert_eq!(PeriodStatus::parse("future"), None);
        assert!(PeriodStatus::Open.is_open());
        assert!(!PeriodStatus::Closed.is_open());
    }
}
