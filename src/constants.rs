//! Application constants for P1Doks Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for credentials and paths
pub mod env {
    /// Environment variable name for the P1Doks username
    pub const USERNAME: &str = "P1DOKS_USERNAME";

    /// Environment variable name for the P1Doks password
    pub const PASSWORD: &str = "P1DOKS_PASSWORD";

    /// Environment variable name for the iRacing setups directory
    pub const SETUPS_PATH: &str = "IRACING_SETUPS_PATH";
}

/// Identity provider (AWS Cognito) configuration
pub mod auth {
    /// Cognito user pool region
    pub const REGION: &str = "ca-central-1";

    /// Cognito user pool id for the P1Doks tenant
    pub const USER_POOL_ID: &str = "ca-central-1_VGoFypwpe";

    /// Cognito app client id
    pub const CLIENT_ID: &str = "6mu7svlaa4q8i1mvkeknhsruo8";

    /// Cognito service endpoint for the pool region
    pub const ENDPOINT: &str = "https://cognito-idp.ca-central-1.amazonaws.com/";

    /// `X-Amz-Target` header value for the InitiateAuth operation
    pub const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";

    /// Content type required by the Cognito JSON protocol
    pub const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

    /// Claim names that may carry the subject identifier, in lookup order
    pub const SUBJECT_CLAIMS: &[&str] = &["sub", "user_id", "userId", "cognito:username"];
}

/// P1Doks API endpoints
pub mod api {
    /// P1Doks API base URL
    pub const BASE_URL: &str = "https://api.p1doks.com";

    /// Datapack listing endpoint (POST with JSON filter payload)
    pub const DATA_PACKS_PATH: &str = "/ql/data-packs";

    /// Consolidated setup file listing endpoint, takes the datapack id
    pub const FILES_PATH: &str = "/ql/data-packs/files/consolidated";

    /// Signed download URL exchange endpoint
    pub const SIGNED_URL_PATH: &str = "/api/files/download/signed-url";

    /// Page size for datapack listing requests
    pub const FETCH_LIMIT: u32 = 100;
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Pacing configuration
pub mod limits {
    use super::Duration;

    /// Fixed pacing delay between datapack downloads
    ///
    /// Cooperative pacing to stay under the upstream service's limits;
    /// deliberately not a token-bucket limiter.
    pub const DOWNLOAD_PACING: Duration = Duration::from_millis(500);

    /// Pacing delay between series fetches when regenerating mappings
    pub const MAPPING_SCAN_PACING: Duration = Duration::from_millis(300);
}

/// iRacing schedule constants
pub mod schedule {
    /// Number of weeks in an iRacing season
    pub const WEEKS_PER_SEASON: u32 = 12;

    /// Season 4 anchor date (update at the start of each season)
    pub const SEASON_ANCHOR: (i32, u32, u32) = (2025, 9, 10);

    /// Approximate (month, day) start dates for seasons 1-4 each year
    pub const SEASON_STARTS: [(u32, u32); 4] = [(1, 7), (4, 1), (7, 1), (9, 10)];
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Application directory name under the platform data dir
    pub const APP_DIR_NAME: &str = "p1doks-fetcher";

    /// Preference file name
    pub const PREFERENCES_FILE_NAME: &str = "preferences.json";

    /// Vendor subdirectory created under each car folder
    pub const VENDOR_SUBDIR: &str = "p1doks";
}

// Re-export commonly used constants for convenience
pub use api::{BASE_URL as API_BASE_URL, FETCH_LIMIT};
pub use auth::{CLIENT_ID, SUBJECT_CLAIMS};
pub use env::{PASSWORD as ENV_PASSWORD, SETUPS_PATH as ENV_SETUPS_PATH, USERNAME as ENV_USERNAME};
pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use limits::DOWNLOAD_PACING;
