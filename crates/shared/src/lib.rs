//! Shared types and configuration for Obligo.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe references to entities, parties, and records
//! - Money tolerances and fixed-point helpers
//! - Pagination types for list queries
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{AppConfig, ConfigError};
