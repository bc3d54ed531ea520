//! Property-based tests for identifier formatting.

use proptest::prelude::*;

use crate::numbering::sequence::{format_number, parse_number};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any formatted identifier parses back into its parts.
    #[test]
    fn prop_format_then_parse_recovers_parts(
        prefix in "[A-Z]{2,3}",
        year in 1900i32..=9999,
        seq in 1i64..100_000_000,
    ) {
        let number = format_number(&prefix, year, seq);
        let parsed = parse_number(&number).unwrap();
        prop_assert_eq!(parsed.prefix, prefix);
        prop_assert_eq!(parsed.year, year);
        prop_assert_eq!(parsed.seq, seq);
    }

    /// Identifiers of one prefix and year sort like their sequence values
    /// while the value fits the padded width.
    #[test]
    fn prop_padded_numbers_sort_by_sequence(a in 1i64..1_000_000, b in 1i64..1_000_000) {
        let left = format_number("SF", 2025, a);
        let right = format_number("SF", 2025, b);
        prop_assert_eq!(left.cmp(&right), a.cmp(&b));
    }
}
