//! Authentication for the P1Doks setup-sharing service
//!
//! This module owns the session lifecycle: credential acquisition via the
//! identity provider, transparent refresh, and the single-retry policy
//! around authenticated requests.
//!
//! # Examples
//!
//! ```rust,no_run
//! use p1doks_fetcher::auth::Session;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::with_password("driver", "secret")?;
//! let tokens = session.authenticate().await?;
//! // Persist tokens.refresh_token for the next run
//! # Ok(())
//! # }
//! ```

pub mod provider;
pub mod session;

// Re-export main public API
pub use provider::{CognitoProvider, IdentityProvider, TokenSet};
pub use session::Session;
