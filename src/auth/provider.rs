//! Identity provider exchange for P1Doks (AWS Cognito user pool)
//!
//! Two operations back the session lifecycle: a password authentication and
//! a refresh-token exchange, both returning a complete credential triple.
//! The production implementation speaks the Cognito `InitiateAuth` JSON
//! protocol directly; tests substitute their own [`IdentityProvider`].

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::constants::auth;
use crate::errors::{AuthError, AuthResult};

/// Credential triple issued by the identity provider
///
/// Either wholly present or not held at all; the session never stores a
/// partial triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Opaque access token
    pub access_token: String,
    /// Signed identity token (JWT) carrying the subject claim
    pub id_token: String,
    /// Refresh token, rotated on each successful refresh exchange
    pub refresh_token: String,
}

/// Identity provider operations required by the session lifecycle
pub trait IdentityProvider {
    /// Full password authentication
    fn password_auth(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = AuthResult<TokenSet>> + Send;

    /// Refresh-token exchange, returning a rotated triple
    fn refresh(
        &self,
        username: &str,
        refresh_token: &str,
    ) -> impl std::future::Future<Output = AuthResult<TokenSet>> + Send;
}

/// AWS Cognito implementation of the identity exchange
#[derive(Debug, Clone)]
pub struct CognitoProvider {
    http: Client,
    endpoint: String,
    client_id: String,
}

/// `AuthenticationResult` payload of an InitiateAuth response
#[derive(Debug, Deserialize)]
struct AuthenticationResult {
    #[serde(rename = "AccessToken")]
    access_token: String,
    #[serde(rename = "IdToken")]
    id_token: String,
    /// Absent when the pool does not rotate refresh tokens
    #[serde(rename = "RefreshToken")]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitiateAuthResponse {
    #[serde(rename = "AuthenticationResult")]
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
struct CognitoErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
}

impl CognitoProvider {
    /// Create a provider for the P1Doks user pool
    pub fn new(http: Client) -> Self {
        Self::with_endpoint(http, auth::ENDPOINT, auth::CLIENT_ID)
    }

    /// Create a provider against a custom endpoint (used by tests)
    pub fn with_endpoint(
        http: Client,
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
        }
    }

    /// Issue an InitiateAuth call with the given flow and parameters
    async fn initiate_auth(
        &self,
        flow: &str,
        parameters: serde_json::Value,
    ) -> AuthResult<AuthenticationResult> {
        let body = json!({
            "AuthFlow": flow,
            "ClientId": self.client_id,
            "AuthParameters": parameters,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", auth::AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", auth::INITIATE_AUTH_TARGET)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<CognitoErrorBody>()
                .await
                .ok()
                .map(|e| {
                    e.message
                        .or(e.error_type)
                        .unwrap_or_else(|| status.to_string())
                })
                .unwrap_or_else(|| status.to_string());
            tracing::warn!(flow, %status, "Identity provider rejected the exchange");
            return Err(AuthError::ProviderRejected { message });
        }

        let parsed: InitiateAuthResponse = response.json().await?;
        parsed
            .authentication_result
            .ok_or_else(|| AuthError::ProviderRejected {
                message: "response carried no authentication result".to_string(),
            })
    }
}

impl IdentityProvider for CognitoProvider {
    async fn password_auth(&self, username: &str, password: &str) -> AuthResult<TokenSet> {
        tracing::debug!(username, "Starting password authentication");
        let result = self
            .initiate_auth(
                "USER_PASSWORD_AUTH",
                json!({ "USERNAME": username, "PASSWORD": password }),
            )
            .await?;

        // A password grant always issues a fresh refresh token
        let refresh_token = result
            .refresh_token
            .ok_or_else(|| AuthError::ProviderRejected {
                message: "password grant returned no refresh token".to_string(),
            })?;

        Ok(TokenSet {
            access_token: result.access_token,
            id_token: result.id_token,
            refresh_token,
        })
    }

    async fn refresh(&self, username: &str, refresh_token: &str) -> AuthResult<TokenSet> {
        tracing::debug!(username, "Starting refresh-token exchange");
        let result = self
            .initiate_auth(
                "REFRESH_TOKEN_AUTH",
                json!({ "USERNAME": username, "REFRESH_TOKEN": refresh_token }),
            )
            .await?;

        // The pool only returns a new refresh token when rotation is
        // enabled; carry the supplied one forward so the triple stays whole.
        Ok(TokenSet {
            access_token: result.access_token,
            id_token: result.id_token,
            refresh_token: result
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn token_response(rotated: Option<&str>) -> String {
        let mut result = json!({
            "AccessToken": "access-1",
            "IdToken": "id-1",
        });
        if let Some(rt) = rotated {
            result["RefreshToken"] = json!(rt);
        }
        json!({ "AuthenticationResult": result }).to_string()
    }

    #[tokio::test]
    async fn test_password_auth_returns_whole_triple() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", auth::INITIATE_AUTH_TARGET)
            .with_status(200)
            .with_body(token_response(Some("refresh-1")))
            .create_async()
            .await;

        let provider = CognitoProvider::with_endpoint(Client::new(), server.url(), "client");
        let tokens = provider.password_auth("driver", "secret").await.unwrap();

        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.id_token, "id-1");
        assert_eq!(tokens.refresh_token, "refresh-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_without_rotation_reuses_supplied_token() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(token_response(None))
            .create_async()
            .await;

        let provider = CognitoProvider::with_endpoint(Client::new(), server.url(), "client");
        let tokens = provider.refresh("driver", "old-refresh").await.unwrap();

        assert_eq!(tokens.refresh_token, "old-refresh");
    }

    #[tokio::test]
    async fn test_rejected_exchange_surfaces_provider_message() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"__type":"NotAuthorizedException","message":"Incorrect username or password."}"#)
            .create_async()
            .await;

        let provider = CognitoProvider::with_endpoint(Client::new(), server.url(), "client");
        let err = provider.password_auth("driver", "wrong").await.unwrap_err();

        match err {
            AuthError::ProviderRejected { message } => {
                assert!(message.contains("Incorrect username or password"));
            }
            other => panic!("Expected ProviderRejected, got {:?}", other),
        }
    }
}
