//! Aging buckets for unpaid obligations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::obligation::ObligationPosition;

/// Default upper bucket edges in days overdue.
pub const DEFAULT_AGING_EDGES: [i64; 4] = [7, 30, 60, 90];

/// Label of the bucket for obligations not yet due.
pub const NOT_DUE: &str = "not_due";

/// One aging bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingBucket {
    /// Bucket label, e.g. `8-30` or `91+`.
    pub label: String,
    /// Smallest days-overdue value in the bucket; `None` for not-due.
    pub min_days: Option<i64>,
    /// Largest days-overdue value in the bucket; `None` for the last one.
    pub max_days: Option<i64>,
    /// Sum of unpaid amounts.
    pub total: Decimal,
    /// Number of obligations.
    pub count: usize,
}

impl AgingBucket {
    fn new(label: String, min_days: Option<i64>, max_days: Option<i64>) -> Self {
        Self {
            label,
            min_days,
            max_days,
            total: Decimal::ZERO,
            count: 0,
        }
    }

    fn contains(&self, days: i64) -> bool {
        match (self.min_days, self.max_days) {
            (None, _) => days < 0,
            (Some(min), Some(max)) => days >= min && days <= max,
            (Some(min), None) => days >= min,
        }
    }
}

/// Unpaid open obligations grouped by days overdue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingReport {
    /// Reference date.
    pub as_of: NaiveDate,
    /// Buckets, not-due first.
    pub buckets: Vec<AgingBucket>,
    /// Sum over all buckets.
    pub total: Decimal,
}

impl AgingReport {
    /// Empty buckets for the given edges.
    ///
    /// With edges `[7, 30, 60, 90]` the buckets are `not_due`, `0-7`, `8-30`,
    /// `31-60`, `61-90` and `91+`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] unless the edges are non-negative
    /// and strictly increasing.
    pub fn empty_buckets(edges: &[i64]) -> Result<Vec<AgingBucket>, LedgerError> {
        if edges.first().is_some_and(|first| *first < 0)
            || edges.windows(2).any(|pair| pair[0] >= pair[1])
        {
            return Err(LedgerError::Validation(format!(
                "aging edges must be non-negative and strictly increasing, got {edges:?}"
            )));
        }

        let mut buckets = vec![AgingBucket::new(NOT_DUE.to_string(), None, None)];
        let mut lower = 0;
        for edge in edges {
            buckets.push(AgingBucket::new(
                format!("{lower}-{edge}"),
                Some(lower),
                Some(*edge),
            ));
            lower = edge + 1;
        }
        buckets.push(AgingBucket::new(format!("{lower}+"), Some(lower), None));
        Ok(buckets)
    }

    /// Builds the report.
    ///
    /// Days overdue are `as_of - due_date`, falling back to the obligation
    /// date when there is no due date. Only open obligations with something
    /// unpaid are counted.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] for malformed edges.
    pub fn build(
        positions: &[ObligationPosition],
        as_of: NaiveDate,
        edges: &[i64],
    ) -> Result<Self, LedgerError> {
        let mut buckets = Self::empty_buckets(edges)?;
        let mut total = Decimal::ZERO;

        for position in positions {
            if !position.obligation.status.is_open() || position.unpaid <= Decimal::ZERO {
                continue;
            }
            let reference = position
                .obligation
                .due_date
                .unwrap_or(position.obligation.obligation_date);
            let days = (as_of - reference).num_days();
            if let Some(bucket) = buckets.iter_mut().find(|b| b.contains(days)) {
                bucket.total += position.unpaid;
                bucket.count += 1;
                total += position.unpaid;
            }
        }

        Ok(Self {
            as_of,
            buckets,
            total,
        })
    }

    /// Looks up a bucket by label.
    #[must_use]
    pub fn bucket(&self, label: &str) -> Option<&AgingBucket> {
        self.buckets.iter().find(|b| b.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use obligo_shared::types::{EntityId, ObligationId, PartyId};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use crate::obligation::{Direction, Obligation, ObligationStatus, ObligationType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn position(due_date: Option<NaiveDate>, unpaid: Decimal) -> ObligationPosition {
        ObligationPosition {
            obligation: Obligation {
                id: ObligationId::new(),
                entity_id: EntityId::new(),
                branch_id: None,
                number: "SF2025-000001".to_string(),
                obligation_type: ObligationType::CustomerInvoice,
                direction: Direction::Receivable,
                party_id: PartyId::new(),
                obligation_date: date(2025, 1, 1),
                due_date,
                total_amount: unpaid,
                category_id: None,
                status: ObligationStatus::Pending,
                reversed_obligation_id: None,
                reversal_obligation_id: None,
                source: None,
                reference: None,
                description: None,
                notes: None,
                status_reason: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            paid: Decimal::ZERO,
            unpaid,
        }
    }

    #[test]
    fn test_default_bucket_labels() {
        let labels: Vec<_> = AgingReport::empty_buckets(&DEFAULT_AGING_EDGES)
            .unwrap()
            .into_iter()
            .map(|b| b.label)
            .collect();
        assert_eq!(labels, ["not_due", "0-7", "8-30", "31-60", "61-90", "91+"]);
    }

    #[rstest]
    #[case(&[7, 7])]
    #[case(&[30, 7])]
    #[case(&[-1, 7])]
    fn test_bad_edges_rejected(#[case] edges: &[i64]) {
        assert!(AgingReport::empty_buckets(edges).is_err());
    }

    #[rstest]
    #[case(date(2025, 4, 2), "not_due")]
    #[case(date(2025, 4, 1), "0-7")]
    #[case(date(2025, 3, 25), "0-7")]
    #[case(date(2025, 3, 24), "8-30")]
    #[case(date(2025, 3, 2), "8-30")]
    #[case(date(2025, 3, 1), "31-60")]
    #[case(date(2025, 1, 31), "31-60")]
    #[case(date(2025, 1, 30), "61-90")]
    #[case(date(2025, 1, 1), "61-90")]
    #[case(date(2024, 12, 31), "91+")]
    fn test_bucket_boundaries(#[case] due_date: NaiveDate, #[case] expected: &str) {
        let as_of = date(2025, 4, 1);
        let report =
            AgingReport::build(&[position(Some(due_date), dec!(10))], as_of, &DEFAULT_AGING_EDGES)
                .unwrap();
        assert_eq!(report.bucket(expected).unwrap().count, 1, "due {due_date}");
        assert_eq!(report.total, dec!(10));
    }

    #[test]
    fn test_missing_due_date_uses_obligation_date() {
        let report = AgingReport::build(
            &[position(None, dec!(25))],
            date(2025, 1, 5),
            &DEFAULT_AGING_EDGES,
        )
        .unwrap();
        assert_eq!(report.bucket("0-7").unwrap().total, dec!(25));
    }

    #[test]
    fn test_settled_and_draft_are_skipped() {
        let mut settled = position(None, dec!(0));
        settled.obligation.status = ObligationStatus::Settled;
        let mut draft = position(None, dec!(40));
        draft.obligation.status = ObligationStatus::Draft;
        let report =
            AgingReport::build(&[settled, draft], date(2025, 6, 1), &DEFAULT_AGING_EDGES).unwrap();
        assert_eq!(report.total, Decimal::ZERO);
    }
}
