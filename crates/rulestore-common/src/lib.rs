//! RuleStore Common - Shared utilities and types
//!
//! This crate provides common functionality used across all RuleStore components:
//! - Error types and handling
//! - Configuration management
//! - Logging bootstrap
//! - Metrics

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{AdapterConfig, Config, LoggingConfig};
pub use error::{ConnectionError, Error, PolicyError, Result, StorageError};
