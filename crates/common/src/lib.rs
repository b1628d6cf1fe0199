//! Raytrack Common Utilities
//!
//! Shared infrastructure for all Raytrack crates:
//! - Error types and result aliases
//! - The virtual clock that stands in for real time during a capture
//! - Timer and file-name identifiers
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use ids::*;
