//! Reversal of posted obligations and settlements.

pub mod service;

pub use service::ReversalService;
