//! P1Doks Fetcher Library
//!
//! A Rust library for downloading iRacing setup datapacks from a P1Doks
//! subscription and organizing them under the iRacing setups directory.
//! Handles the session lifecycle against the P1Doks identity provider and
//! the car-name to folder mapping.

pub mod app;
pub mod auth;
pub mod cli;
pub mod constants;
pub mod errors;
pub mod preferences;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        // Test that our constants are accessible
        assert_eq!(ENV_USERNAME, "P1DOKS_USERNAME");
        assert_eq!(FETCH_LIMIT, 100);
        assert!(API_BASE_URL.starts_with("https://"));
    }

    #[test]
    fn test_error_types() {
        // Test that our error types work correctly
        let auth_error = errors::AuthError::RefreshExpired;
        let app_error = AppError::Auth(auth_error);

        assert_eq!(app_error.category(), "authentication");
        assert!(!app_error.is_session_expired());
    }
}
