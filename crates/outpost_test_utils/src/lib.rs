//! # Outpost Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Fixture catalog and controller helpers
//! - Recording ledger and event log
//! - Controller invariant checks
//! - Replay determinism harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod invariants;
pub mod recording;

/// Re-export proptest for convenience.
pub use proptest;
