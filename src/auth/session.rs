//! Session lifecycle management for P1Doks API access
//!
//! A [`Session`] owns the authentication state for one process: it acquires
//! a credential triple from the identity provider, caches it, and wraps
//! outbound API calls with a single transparent refresh-and-retry on an
//! unauthorized response. The session never prompts for input and never
//! exits the process; recoverable and terminal expiry are surfaced as
//! [`AuthError::RefreshExpired`] and [`AuthError::TokenExpired`] for the CLI
//! layer to act on.
//!
//! The authorization value is read from session state at call time and
//! attached per request, so a refresh that rotates tokens mid-session is
//! picked up by the next send without mutable client defaults.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;

use crate::constants::{auth, http};
use crate::errors::{AuthError, AuthResult};

use super::provider::{CognitoProvider, IdentityProvider, TokenSet};

/// Authenticated session against the P1Doks identity provider
///
/// Constructed with a username plus exactly one of password or refresh
/// token. The subject identifier is derived once from the identity token
/// and cached for the life of the session.
#[derive(Debug)]
pub struct Session<P = CognitoProvider> {
    username: String,
    password: Option<String>,
    refresh_token: Option<String>,
    tokens: Option<TokenSet>,
    user_id: Option<String>,
    http: Client,
    provider: P,
}

impl Session<CognitoProvider> {
    /// Create a session that will authenticate with a password
    pub fn with_password(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> AuthResult<Self> {
        let http = build_http_client()?;
        let provider = CognitoProvider::new(http.clone());
        Ok(Self::new(
            provider,
            http,
            username,
            Some(password.into()),
            None,
        ))
    }

    /// Create a session that will authenticate with a saved refresh token
    pub fn with_refresh_token(
        username: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> AuthResult<Self> {
        let http = build_http_client()?;
        let provider = CognitoProvider::new(http.clone());
        Ok(Self::new(
            provider,
            http,
            username,
            None,
            Some(refresh_token.into()),
        ))
    }
}

impl<P: IdentityProvider> Session<P> {
    /// Assemble a session from parts (tests inject their own provider)
    pub fn new(
        provider: P,
        http: Client,
        username: impl Into<String>,
        password: Option<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password,
            refresh_token,
            tokens: None,
            user_id: None,
            http,
            provider,
        }
    }

    /// Username this session authenticates as
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Cached subject identifier, absent until authenticated
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Current credential triple, absent until authenticated
    pub fn tokens(&self) -> Option<&TokenSet> {
        self.tokens.as_ref()
    }

    /// Whether the session holds credentials
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    /// Supply a password after a rejected refresh exchange
    ///
    /// Switches the next `authenticate()` to the password path, which is how
    /// a caller recovers from [`AuthError::RefreshExpired`].
    pub fn supply_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }

    /// Establish or refresh the session
    ///
    /// Attempts a refresh-token exchange when a refresh token is present and
    /// no password was supplied; a rejected exchange maps to
    /// [`AuthError::RefreshExpired`] so the caller can re-collect a password.
    /// Otherwise performs a full password authentication, propagating
    /// provider failures unchanged.
    ///
    /// Returns the credential triple so the caller can persist the rotated
    /// refresh token: only the returned value is guaranteed usable on the
    /// next exchange.
    pub async fn authenticate(&mut self) -> AuthResult<TokenSet> {
        let tokens = match (&self.password, &self.refresh_token) {
            (None, Some(refresh_token)) => {
                let refresh_token = refresh_token.clone();
                match self.provider.refresh(&self.username, &refresh_token).await {
                    Ok(tokens) => tokens,
                    Err(e) => {
                        tracing::debug!(error = %e, "Refresh exchange rejected");
                        return Err(AuthError::RefreshExpired);
                    }
                }
            }
            (Some(password), _) => {
                let password = password.clone();
                self.provider
                    .password_auth(&self.username, &password)
                    .await?
            }
            (None, None) => return Err(AuthError::MissingCredentials),
        };

        self.install(tokens.clone());
        tracing::info!(username = %self.username, "Session authenticated");
        Ok(tokens)
    }

    /// Perform one authenticated call, transparently retried once
    ///
    /// Authenticates first when the session holds no credentials yet. An
    /// unauthorized response (401/403) triggers exactly one
    /// refresh-and-retry cycle when a refresh token is available; a second
    /// unauthorized response, or a rejected refresh, is terminal and maps to
    /// [`AuthError::TokenExpired`] carrying the original status. Any other
    /// failure propagates unchanged.
    pub async fn request(
        &mut self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> AuthResult<Response> {
        if self.tokens.is_none() {
            self.authenticate().await?;
        }

        let response = self.send(method.clone(), url, body).await?;
        let status = response.status();
        if !is_unauthorized(status) {
            return Ok(response);
        }

        // Single-retry policy: one refresh, one reissue, never a loop.
        let Some(refresh_token) = self.refresh_token.clone() else {
            return Err(AuthError::TokenExpired {
                status: status.as_u16(),
            });
        };

        tracing::warn!(%status, url, "Request unauthorized, refreshing session");
        let tokens = self
            .provider
            .refresh(&self.username, &refresh_token)
            .await
            .map_err(|_| AuthError::TokenExpired {
                status: status.as_u16(),
            })?;
        self.install(tokens);

        let retry = self.send(method, url, body).await?;
        if is_unauthorized(retry.status()) {
            return Err(AuthError::TokenExpired {
                status: status.as_u16(),
            });
        }

        tracing::debug!(url, "Request succeeded after refresh");
        Ok(retry)
    }

    /// Issue the call with the authorization value read at call time
    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> AuthResult<Response> {
        let bearer = self
            .tokens
            .as_ref()
            .map(|t| t.id_token.as_str())
            .unwrap_or_default();

        let mut request = self.http.request(method, url).bearer_auth(bearer);
        if let Some(json) = body {
            request = request.json(json);
        }
        Ok(request.send().await?)
    }

    /// Store a freshly issued triple and derive the subject once
    fn install(&mut self, tokens: TokenSet) {
        self.refresh_token = Some(tokens.refresh_token.clone());

        if self.user_id.is_none() {
            match subject_from_id_token(&tokens.id_token) {
                Ok(subject) => self.user_id = Some(subject),
                Err(e) => {
                    // The signed-URL exchange will fail later with
                    // MissingUserId; everything else still works.
                    tracing::warn!(error = %e, "Could not derive subject from identity token");
                }
            }
        }

        self.tokens = Some(tokens);
    }
}

/// Whether a status signals an expired or rejected authorization
fn is_unauthorized(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Build the HTTP client shared by the session and its provider
pub(crate) fn build_http_client() -> AuthResult<Client> {
    Client::builder()
        .timeout(http::DEFAULT_TIMEOUT)
        .connect_timeout(http::CONNECT_TIMEOUT)
        .user_agent(http::USER_AGENT)
        .build()
        .map_err(AuthError::Http)
}

/// Decode the subject identifier from the identity token payload
///
/// The identity token is a JWT: three dot-separated base64url segments. The
/// subject is the first non-empty of the candidate claims in
/// [`auth::SUBJECT_CLAIMS`].
fn subject_from_id_token(id_token: &str) -> AuthResult<String> {
    let mut segments = id_token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if segments.next().is_none() => payload,
        _ => {
            return Err(AuthError::InvalidToken {
                reason: "expected three dot-separated segments".to_string(),
            })
        }
    };

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::InvalidToken {
            reason: format!("payload is not base64url: {e}"),
        })?;
    let claims: Value = serde_json::from_slice(&decoded).map_err(|e| AuthError::InvalidToken {
        reason: format!("payload is not JSON: {e}"),
    })?;

    auth::SUBJECT_CLAIMS
        .iter()
        .find_map(|claim| {
            claims
                .get(*claim)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .ok_or_else(|| AuthError::InvalidToken {
            reason: "no subject claim in payload".to_string(),
        })
}
