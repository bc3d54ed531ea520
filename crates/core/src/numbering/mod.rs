//! Document numbering.
//!
//! Counters are keyed by [`SequenceKey`]; the database crate increments them
//! under a row lock. This module owns the pure parts: key construction,
//! prefixes and the `{prefix}{yyyy}-{seq:06}` identifier format.

pub mod sequence;

#[cfg(test)]
mod sequence_props;

pub use sequence::{
    ParsedNumber, SequenceFamily, SequenceKey, format_number, parse_number,
    GENERIC_DOCUMENT_PREFIX, GENERIC_PAYMENT_PREFIX, SEQUENCE_WIDTH,
};
