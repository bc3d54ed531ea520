//! Fixed-point money helpers.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every amount in the ledger is a `rust_decimal::Decimal` with at most
//! [`MONEY_SCALE`] fractional digits.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits carried by monetary amounts.
pub const MONEY_SCALE: u32 = 2;

/// Tolerance for "sum of allocations vs. total" comparisons (0.01).
pub const ALLOCATION_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Tolerance for the "is this obligation settled" threshold (0.001).
pub const SETTLED_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Rounds an amount to money scale using Banker's Rounding.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Returns true if the amount carries no more than two fractional digits.
#[must_use]
pub fn has_money_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE
}

/// Returns true if adding `requested` to what is `already` allocated stays
/// within `cap` plus the allocation tolerance.
///
/// The check runs on cumulative totals, so the tolerance band can be used
/// once per record and not once per call.
#[must_use]
pub fn fits_within(already: Decimal, requested: Decimal, cap: Decimal) -> bool {
    already + requested <= cap + ALLOCATION_TOLERANCE
}

/// Clamps a derived remainder at zero.
///
/// Remainders may dip slightly below zero when an allocation consumed the
/// tolerance band; callers never see negative unpaid or unallocated amounts.
#[must_use]
pub fn non_negative(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tolerance_constants() {
        assert_eq!(ALLOCATION_TOLERANCE, dec!(0.01));
        assert_eq!(SETTLED_TOLERANCE, dec!(0.001));
    }

    #[test]
    fn test_round_money_bankers() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.00));
        assert_eq!(round_money(dec!(10.015)), dec!(10.02));
        assert_eq!(round_money(dec!(10.0151)), dec!(10.02));
    }

    #[rstest]
    #[case(dec!(100), true)]
    #[case(dec!(100.10), true)]
    #[case(dec!(100.1000), true)]
    #[case(dec!(100.001), false)]
    #[case(dec!(-0.015), false)]
    fn test_has_money_scale(#[case] amount: Decimal, #[case] expected: bool) {
        assert_eq!(has_money_scale(amount), expected);
    }

    #[test]
    fn test_fits_within_tolerance() {
        assert!(fits_within(Decimal::ZERO, dec!(400.00), dec!(400.00)));
        assert!(fits_within(Decimal::ZERO, dec!(400.01), dec!(400.00)));
        assert!(!fits_within(Decimal::ZERO, dec!(400.02), dec!(400.00)));
    }

    #[test]
    fn test_fits_within_tolerance_is_spent_once() {
        assert!(fits_within(dec!(100.00), dec!(0.01), dec!(100.00)));
        assert!(!fits_within(dec!(100.01), dec!(0.01), dec!(100.00)));
        assert!(!fits_within(dec!(100.01), dec!(0.001), dec!(100.00)));
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative(dec!(-0.01)), Decimal::ZERO);
        assert_eq!(non_negative(dec!(5)), dec!(5));
    }
}
