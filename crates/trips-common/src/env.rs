//! Typed environment variable lookups
//!
//! Every binary reads its settings through these helpers so that a malformed
//! value is reported with the variable name instead of silently falling back.

use crate::{Result, TripsError};
use std::str::FromStr;

/// Load a `.env` file from the working directory if one exists.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Read a string variable, falling back to `default` when unset.
pub fn string_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read an optional string variable; empty values count as unset.
pub fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable, falling back to `default` when unset.
///
/// A variable that is set but does not parse is an error.
pub fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match optional(name) {
        Some(raw) => raw.trim().parse().map_err(|_| TripsError::InvalidEnv {
            name: name.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Parse an optional variable.
pub fn parse_optional<T: FromStr>(name: &str) -> Result<Option<T>> {
    optional(name)
        .map(|raw| {
            raw.trim().parse().map_err(|_| TripsError::InvalidEnv {
                name: name.to_string(),
                value: raw,
            })
        })
        .transpose()
}
