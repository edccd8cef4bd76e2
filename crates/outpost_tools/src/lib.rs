//! # Outpost Development Tools
//!
//! Command-line tools for content authors:
//! - Catalog validation
//! - Scripted headless placement sessions

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod scenario;
pub mod simulate;
pub mod validate;
