//! Sensa Common - Shared types and pure logic for the sensa daemon.
//!
//! Conversation messages, capability results, sensor readings, the
//! accelerometer anomaly analyzer and the reading summarizer.

pub mod analyzer;
pub mod summary;
pub mod types;

pub use analyzer::*;
pub use summary::*;
pub use types::*;
