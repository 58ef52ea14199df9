//! Shared utilities for beanwire crates
//!
//! Kept free of dependencies on other beanwire crates so that every crate in
//! the workspace can depend on it.

pub mod logging;

pub use logging::{format_error, LogLevel, LogOptions};
