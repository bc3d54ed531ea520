//! Property-based tests for ObligationService.

use proptest::prelude::*;
use rust_decimal::Decimal;

use obligo_shared::types::SETTLED_TOLERANCE;

use crate::obligation::service::ObligationService;
use crate::obligation::types::ObligationStatus;

/// Strategy for positive money amounts (0.01 .. 1,000,000.00).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_non_terminal() -> impl Strategy<Value = ObligationStatus> {
    prop_oneof![
        Just(ObligationStatus::Pending),
        Just(ObligationStatus::Partial),
        Just(ObligationStatus::Settled),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Status thresholds hold for every non-terminal, non-draft obligation.
    #[test]
    fn prop_status_thresholds(
        total in arb_amount(),
        fraction in 0u32..=120,
        current in arb_non_terminal(),
    ) {
        let allocated = total * Decimal::from(fraction) / Decimal::ONE_HUNDRED;
        let status = ObligationService::derive_status(current, total, allocated);

        if allocated <= Decimal::ZERO {
            prop_assert_eq!(status, ObligationStatus::Pending);
        } else if allocated >= total - SETTLED_TOLERANCE {
            prop_assert_eq!(status, ObligationStatus::Settled);
        } else {
            prop_assert_eq!(status, ObligationStatus::Partial);
        }
    }

    /// Terminal statuses never move.
    #[test]
    fn prop_terminal_status_is_frozen(total in arb_amount(), allocated in arb_amount()) {
        for status in [ObligationStatus::Cancelled, ObligationStatus::Reversed] {
            prop_assert_eq!(ObligationService::derive_status(status, total, allocated), status);
        }
    }

    /// Paid plus unpaid equals the total while nothing is over-allocated.
    #[test]
    fn prop_unpaid_complements_allocated(total in arb_amount(), fraction in 0u32..=100) {
        let allocated = (total * Decimal::from(fraction) / Decimal::ONE_HUNDRED).round_dp(2);
        let unpaid = ObligationService::unpaid(total, allocated);
        prop_assert!(unpaid >= Decimal::ZERO);
        prop_assert_eq!(unpaid + allocated, total);
    }
}
