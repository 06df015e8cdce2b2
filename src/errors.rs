//! Error types for P1Doks Fetcher
//!
//! This module defines error types for all components of the application.
//! The two session-lifecycle failures callers are expected to branch on —
//! a rejected refresh exchange and a request that stayed unauthorized after
//! one refresh-and-retry — are dedicated variants rather than sentinel
//! message strings, so callers match on kind.

use std::path::PathBuf;
use thiserror::Error;

/// Authentication and session lifecycle errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Refresh exchange rejected by the identity provider
    ///
    /// Recoverable: re-collect a password and call `authenticate()` again.
    #[error("Session refresh was rejected. Please sign in again with your password")]
    RefreshExpired,

    /// Authenticated request stayed unauthorized after one refresh-and-retry
    ///
    /// Terminal for this session instance. Carries the status of the
    /// original unauthorized response for diagnostics.
    #[error("Session expired and could not be refreshed (HTTP {status})")]
    TokenExpired { status: u16 },

    /// Session was constructed without a password or refresh token
    #[error(
        "Missing P1Doks credentials. Set P1DOKS_USERNAME and P1DOKS_PASSWORD or run 'auth login'"
    )]
    MissingCredentials,

    /// Identity provider rejected an authentication attempt
    #[error("Authentication failed: {message}")]
    ProviderRejected { message: String },

    /// Identity token could not be decoded
    #[error("Malformed identity token: {reason}")]
    InvalidToken { reason: String },

    /// HTTP transport failure during authentication or a wrapped request
    #[error("HTTP request failed during authentication")]
    Http(#[from] reqwest::Error),
}

/// Catalog listing and signed-URL exchange errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// Session layer failure (propagated unchanged)
    #[error(transparent)]
    Session(#[from] AuthError),

    /// HTTP transport failure
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status
    #[error("P1Doks API error: HTTP {status}")]
    Api { status: u16 },

    /// Response body did not match the expected shape
    #[error("Unexpected API response: {reason}")]
    UnexpectedResponse { reason: String },

    /// Subject identifier was never derived from the identity token
    #[error("User id not available. Please check your authentication token")]
    MissingUserId,
}

/// File transfer and organization errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP transport failure
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Signed URL fetch returned a non-success status
    #[error("Download failed: HTTP {status}")]
    ServerError { status: u16 },

    /// I/O error during file operations
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

/// Preference store errors
#[derive(Error, Debug)]
pub enum PreferencesError {
    /// I/O error reading or writing the preference file
    #[error("Preference file I/O error")]
    Io(#[from] std::io::Error),

    /// Preference file could not be parsed
    #[error("Invalid preference file format")]
    InvalidFormat(#[from] serde_json::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication or session error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Catalog fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Preference store error
    #[error(transparent)]
    Preferences(#[from] PreferencesError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// True when the error signals a session that needs a fresh sign-in
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            AppError::Auth(AuthError::TokenExpired { .. })
                | AppError::Fetch(FetchError::Session(AuthError::TokenExpired { .. }))
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "authentication",
            AppError::Fetch(_) => "fetch",
            AppError::Download(_) => "download",
            AppError::Preferences(_) => "preferences",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Catalog fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;
