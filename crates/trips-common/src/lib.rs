//! Trips Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities and error handling for the trips workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`TripsError`] and the [`Result`] alias
//! - **Environment**: typed lookups of environment variables with defaults
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use trips_common::{env, Result};
//!
//! fn batch_size() -> Result<usize> {
//!     env::parse_or("TRIPS_BATCH_SIZE", 1000)
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{Result, TripsError};
