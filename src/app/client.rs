//! P1Doks catalog client
//!
//! Wraps a [`Session`] with the catalog endpoints: series discovery,
//! datapack listings, setup file listings, and the signed-URL exchange.
//! The signed URL itself is fetched without credentials; the URL carries
//! its own authorization.
//!
//! The client holds no series cache. A run that needs the series list in
//! several places fetches it once and passes it along.

use reqwest::{Client, Method};
use serde_json::{json, Value};
use url::Url;

use crate::auth::{CognitoProvider, IdentityProvider, Session};
use crate::constants::api;
use crate::errors::{DownloadError, DownloadResult, FetchError, FetchResult};

use super::models::{
    DataPack, DataPackListResponse, FilesResponse, RawSetupFile, Series, SetupFile,
};

/// Catalog client for the P1Doks API
#[derive(Debug)]
pub struct CatalogClient<P = CognitoProvider> {
    session: Session<P>,
    base_url: String,
    /// Bare client for signed S3 URLs, which must not carry auth headers
    plain_http: Client,
}

impl CatalogClient<CognitoProvider> {
    /// Create a client over the production API
    pub fn new(session: Session) -> FetchResult<Self> {
        Self::from_parts(session, api::BASE_URL)
    }
}

impl<P: IdentityProvider> CatalogClient<P> {
    /// Create a client against an explicit base URL (tests point this at a
    /// local server)
    pub fn from_parts(session: Session<P>, base_url: impl Into<String>) -> FetchResult<Self> {
        let plain_http = crate::auth::session::build_http_client().map_err(FetchError::Session)?;
        Ok(Self {
            session,
            base_url: base_url.into(),
            plain_http,
        })
    }

    pub fn session(&self) -> &Session<P> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<P> {
        &mut self.session
    }

    /// List the series that have datapacks for a week/season
    ///
    /// One unfiltered listing call; each series is paired with the track
    /// its datapacks use that week (the first track seen wins, all packs in
    /// a series/week share one track). Sorted alphabetically by name.
    pub async fn fetch_available_series(&mut self, week: u32, season: u32) -> FetchResult<Vec<Series>> {
        let body = json!({
            "limit": api::FETCH_LIMIT,
            "offset": 0,
            "filters": {
                "Week": { "_eq": week.to_string() },
                "Season": { "_eq": season.to_string() },
            },
            "sort": ["Series"],
        });

        let listing: DataPackListResponse = self
            .post_json(api::DATA_PACKS_PATH.to_string(), &body)
            .await?;

        let mut series: Vec<Series> = Vec::new();
        for raw in &listing.data_pack {
            if let Some((name, track)) = raw.series_track() {
                if !series.iter().any(|s| s.name == name) {
                    series.push(Series {
                        name: name.to_string(),
                        track: track.to_string(),
                    });
                }
            }
        }
        series.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(week, season, count = series.len(), "Fetched available series");
        Ok(series)
    }

    /// List the datapacks for one series in a week/season
    ///
    /// The server sorts by lap time, fastest first.
    pub async fn fetch_data_packs(
        &mut self,
        series: &str,
        week: u32,
        season: u32,
    ) -> FetchResult<Vec<DataPack>> {
        let body = json!({
            "limit": api::FETCH_LIMIT,
            "offset": 0,
            "filters": {
                "Week": { "_eq": week.to_string() },
                "Season": { "_eq": season.to_string() },
                "Series": { "_eq": series },
            },
            "sort": ["lap_minutes", "lap_seconds", "lap_hundredths"],
        });

        let listing: DataPackListResponse = self
            .post_json(api::DATA_PACKS_PATH.to_string(), &body)
            .await?;

        let packs: Vec<DataPack> = listing
            .data_pack
            .into_iter()
            .map(|raw| raw.into_data_pack(series))
            .collect();

        tracing::info!(series, week, season, count = packs.len(), "Fetched datapacks");
        Ok(packs)
    }

    /// List the setup files inside one datapack
    pub async fn data_pack_files(&mut self, data_pack_id: &str) -> FetchResult<Vec<SetupFile>> {
        let url = format!("{}{}/{}", self.base_url, api::FILES_PATH, data_pack_id);
        let response = self.session.request(Method::GET, &url, None).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Api {
                status: status.as_u16(),
            });
        }

        let listing: FilesResponse = response.json().await?;
        Ok(listing
            .files
            .into_iter()
            .filter_map(RawSetupFile::into_setup_file)
            .collect())
    }

    /// Exchange a setup file reference for a time-limited signed URL
    ///
    /// Requires the subject identifier derived at authentication time;
    /// without it the exchange cannot be formed and fails with
    /// [`FetchError::MissingUserId`].
    pub async fn signed_download_url(
        &mut self,
        data_pack_id: &str,
        file: &SetupFile,
    ) -> FetchResult<String> {
        let user_id = self
            .session
            .user_id()
            .ok_or(FetchError::MissingUserId)?
            .to_string();

        let body = json!({
            "userId": user_id,
            "dataPackId": data_pack_id,
            "filename": file.filename,
            "filename_disk": file.disk_filename,
        });

        let url = format!("{}{}", self.base_url, api::SIGNED_URL_PATH);
        let response = self.session.request(Method::POST, &url, Some(&body)).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Api {
                status: status.as_u16(),
            });
        }

        let payload: Value = response.json().await?;
        payload
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| FetchError::UnexpectedResponse {
                reason: "signed-url response missing 'url'".to_string(),
            })
    }

    /// Fetch the content behind a signed URL
    ///
    /// Sent without session credentials; the URL is already authorized.
    pub async fn fetch_signed(&self, signed_url: &str) -> DownloadResult<Vec<u8>> {
        let parsed = Url::parse(signed_url).map_err(|e| DownloadError::InvalidUrl {
            url: signed_url.to_string(),
            error: e.to_string(),
        })?;

        let response = self.plain_http.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::ServerError {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// POST a JSON payload to an API path and decode the response
    async fn post_json<T: serde::de::DeserializeOwned>(
        &mut self,
        path: String,
        body: &Value,
    ) -> FetchResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.session.request(Method::POST, &url, Some(body)).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Api {
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    use crate::auth::TokenSet;
    use crate::errors::{AuthError, AuthResult};

    use super::super::models::SetupKind;

    /// Provider that always hands out the same fixed triple
    struct FixedProvider {
        id_token: String,
    }

    impl IdentityProvider for FixedProvider {
        async fn password_auth(&self, _username: &str, _password: &str) -> AuthResult<TokenSet> {
            Ok(TokenSet {
                access_token: "access".to_string(),
                id_token: self.id_token.clone(),
                refresh_token: "refresh".to_string(),
            })
        }

        async fn refresh(&self, _username: &str, _refresh_token: &str) -> AuthResult<TokenSet> {
            Err(AuthError::ProviderRejected {
                message: "not expected in these tests".to_string(),
            })
        }
    }

    /// Unsigned JWT carrying a subject claim
    fn jwt_with_subject(subject: &str) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": subject }).to_string());
        format!("{header}.{payload}.sig")
    }

    async fn client_against(server: &ServerGuard) -> CatalogClient<FixedProvider> {
        let provider = FixedProvider {
            id_token: jwt_with_subject("user-123"),
        };
        let mut session = Session::new(
            provider,
            Client::new(),
            "driver",
            Some("secret".to_string()),
            None,
        );
        session.authenticate().await.unwrap();
        CatalogClient::from_parts(session, server.url()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_available_series_dedupes_and_sorts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/ql/data-packs")
            .match_body(Matcher::PartialJson(json!({
                "filters": {
                    "Week": { "_eq": "3" },
                    "Season": { "_eq": "4" },
                }
            })))
            .with_status(200)
            .with_body(
                json!({
                    "data_pack": [
                        {"id": 1, "Series": "VRS GT Sprint", "Track": "Monza"},
                        {"id": 2, "Series": "IMSA", "Track": "Sebring"},
                        {"id": 3, "Series": "VRS GT Sprint", "Track": "Monza"},
                        {"id": 4, "Car": "No series on this one"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut client = client_against(&server).await;
        let series = client.fetch_available_series(3, 4).await.unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "IMSA");
        assert_eq!(series[1].name, "VRS GT Sprint");
        assert_eq!(series[1].track, "Monza");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_data_packs_includes_series_filter() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/ql/data-packs")
            .match_body(Matcher::PartialJson(json!({
                "filters": { "Series": { "_eq": "IMSA" } }
            })))
            .with_status(200)
            .with_body(
                json!({
                    "data_pack": [
                        {"id": 9, "Car": "Porsche 963 GTP", "price": 0}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut client = client_against(&server).await;
        let packs = client.fetch_data_packs("IMSA", 3, 4).await.unwrap();

        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].id, "9");
        assert!(packs[0].included);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_data_pack_files_filters_unknown_kinds() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ql/data-packs/files/consolidated/pack-9")
            .with_status(200)
            .with_body(
                json!({
                    "files": [
                        {"type": "dry_files", "filename_download": "q.sto", "filename_disk": "a.sto"},
                        {"type": "notes", "filename_download": "readme.txt", "filename_disk": "b.txt"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut client = client_against(&server).await;
        let files = client.data_pack_files("pack-9").await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "q.sto");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_signed_download_url_carries_subject() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/files/download/signed-url")
            .match_body(Matcher::PartialJson(json!({
                "userId": "user-123",
                "dataPackId": "pack-9",
                "filename": "q.sto",
            })))
            .with_status(200)
            .with_body(json!({ "url": "https://cdn.example/q.sto?sig=abc" }).to_string())
            .create_async()
            .await;

        let mut client = client_against(&server).await;
        let file = SetupFile {
            filename: "q.sto".to_string(),
            disk_filename: "a.sto".to_string(),
            title: None,
            kind: SetupKind::Dry,
        };

        let url = client.signed_download_url("pack-9", &file).await.unwrap();
        assert_eq!(url, "https://cdn.example/q.sto?sig=abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_signed_download_url_without_subject_fails() {
        let server = Server::new_async().await;

        // Identity token with no recognizable subject claim
        let provider = FixedProvider {
            id_token: "not-a-jwt".to_string(),
        };
        let mut session = Session::new(
            provider,
            Client::new(),
            "driver",
            Some("secret".to_string()),
            None,
        );
        session.authenticate().await.unwrap();
        let mut client = CatalogClient::from_parts(session, server.url()).unwrap();

        let file = SetupFile {
            filename: "q.sto".to_string(),
            disk_filename: "a.sto".to_string(),
            title: None,
            kind: SetupKind::Dry,
        };

        let err = client.signed_download_url("pack-9", &file).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingUserId));
    }

    #[tokio::test]
    async fn test_api_error_status_is_surfaced() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/ql/data-packs")
            .with_status(500)
            .create_async()
            .await;

        let mut client = client_against(&server).await;
        let err = client.fetch_data_packs("IMSA", 3, 4).await.unwrap_err();
        assert!(matches!(err, FetchError::Api { status: 500 }));
    }

    #[tokio::test]
    async fn test_fetch_signed_rejects_invalid_url() {
        let server = Server::new_async().await;
        let client = client_against(&server).await;

        let err = client.fetch_signed("not a url").await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_fetch_signed_returns_body_bytes() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/signed/q.sto")
            .with_status(200)
            .with_body(b"setup-bytes".as_slice())
            .create_async()
            .await;

        let client = client_against(&server).await;
        let url = format!("{}/signed/q.sto", server.url());
        let bytes = client.fetch_signed(&url).await.unwrap();

        assert_eq!(bytes, b"setup-bytes");
        mock.assert_async().await;
    }
}
