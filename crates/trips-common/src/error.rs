//! Error types shared across the trips workspace

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, TripsError>;

/// Errors raised by shared utilities
#[derive(Error, Debug)]
pub enum TripsError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_env_names_variable_and_value() {
        let err = TripsError::InvalidEnv {
            name: "TRIPS_BATCH_SIZE".to_string(),
            value: "lots".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for TRIPS_BATCH_SIZE: 'lots'");
    }
}
