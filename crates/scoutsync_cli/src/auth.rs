//! Directory access tokens.
//!
//! Tokens are fetched lazily and reused until shortly before they expire.

use crate::config::{AuthMode, ConfigError, DirectorySection};
use parking_lot::Mutex;
use scoutsync_core::{HttpClient, HttpRequest, HttpResponse};
use scoutsync_engine::{EngineError, EngineResult, TokenSource};
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Token endpoint of the VM metadata server.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Default OAuth token endpoint for refresh-token exchange.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct Cached {
    token: String,
    refresh_at: Option<Instant>,
}

#[derive(Default)]
struct TokenCache {
    slot: Mutex<Option<Cached>>,
}

impl TokenCache {
    fn get_or_fetch<F>(&self, fetch: F) -> EngineResult<String>
    where
        F: FnOnce() -> EngineResult<TokenResponse>,
    {
        let mut slot = self.slot.lock();
        if let Some(cached) = slot.as_ref() {
            if cached.refresh_at.map_or(true, |at| Instant::now() < at) {
                return Ok(cached.token.clone());
            }
        }
        let response = fetch()?;
        let refresh_at = response.expires_in.and_then(|secs| {
            Instant::now().checked_add(Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN))
        });
        debug!(expires_in = ?response.expires_in, "obtained access token");
        *slot = Some(Cached {
            token: response.access_token.clone(),
            refresh_at,
        });
        Ok(response.access_token)
    }
}

fn decode(
    response: Result<HttpResponse, scoutsync_core::HttpError>,
    source: &str,
) -> EngineResult<TokenResponse> {
    response
        .and_then(HttpResponse::error_for_status)
        .and_then(|response| response.json())
        .map_err(|e| EngineError::AuthenticationFailed(format!("{source}: {e}")))
}

/// Tokens from the metadata server of the VM the tool runs on.
pub struct ComputeEngineToken<C> {
    client: C,
    url: String,
    cache: TokenCache,
}

impl<C: HttpClient> ComputeEngineToken<C> {
    /// Creates a token source using the default metadata URL.
    pub fn new(client: C) -> Self {
        Self {
            client,
            url: METADATA_TOKEN_URL.to_string(),
            cache: TokenCache::default(),
        }
    }
}

impl<C: HttpClient> TokenSource for ComputeEngineToken<C> {
    fn access_token(&self) -> EngineResult<String> {
        self.cache.get_or_fetch(|| {
            let request = HttpRequest::get(&self.url).with_header("Metadata-Flavor", "Google");
            decode(self.client.execute(&request), "metadata server")
        })
    }
}

/// A stored refresh token from an installed-application consent.
#[derive(Clone, Deserialize)]
pub struct StoredToken {
    /// Refresh token.
    pub refresh_token: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl StoredToken {
    /// Reads a token file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::TokenFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::TokenFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Tokens obtained by exchanging a stored refresh token.
pub struct InstalledToken<C> {
    client: C,
    stored: StoredToken,
    cache: TokenCache,
}

impl<C: HttpClient> InstalledToken<C> {
    /// Creates a token source.
    pub fn new(client: C, stored: StoredToken) -> Self {
        Self {
            client,
            stored,
            cache: TokenCache::default(),
        }
    }
}

impl<C: HttpClient> TokenSource for InstalledToken<C> {
    fn access_token(&self) -> EngineResult<String> {
        self.cache.get_or_fetch(|| {
            let request = HttpRequest::form(
                &self.stored.token_uri,
                [
                    ("grant_type", "refresh_token"),
                    ("refresh_token", self.stored.refresh_token.as_str()),
                    ("client_id", self.stored.client_id.as_str()),
                    ("client_secret", self.stored.client_secret.as_str()),
                ],
            );
            decode(self.client.execute(&request), "token refresh")
        })
    }
}

/// Builds the token source selected by the configuration.
pub fn token_source<C>(
    directory: &DirectorySection,
    client: C,
) -> Result<Box<dyn TokenSource>, ConfigError>
where
    C: HttpClient + 'static,
{
    match directory.auth {
        AuthMode::ComputeEngine => {
            info!("using compute engine credentials");
            Ok(Box::new(ComputeEngineToken::new(client)))
        }
        AuthMode::Installed => {
            let path = directory
                .token_file
                .as_deref()
                .ok_or(ConfigError::Missing("directory.token_file"))?;
            let stored = StoredToken::load(path)?;
            info!(path = %path.display(), "using installed-application credentials");
            Ok(Box::new(InstalledToken::new(client, stored)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoutsync_core::{HttpResponse, Method};
    use scoutsync_testkit::{CannedHttpClient, TempFile};
    use serde_json::json;

    #[test]
    fn metadata_token_is_cached() {
        let client = CannedHttpClient::new().route_json(
            METADATA_TOKEN_URL,
            json!({"access_token": "abc", "expires_in": 3600, "token_type": "Bearer"}),
        );
        let source = ComputeEngineToken::new(&client);

        assert_eq!(source.access_token().unwrap(), "abc");
        assert_eq!(source.access_token().unwrap(), "abc");
        assert_eq!(client.hits(METADATA_TOKEN_URL), 1);

        let request = &client.requests()[0];
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| k == "Metadata-Flavor" && v == "Google"));
    }

    #[test]
    fn expired_token_is_refetched() {
        let client = CannedHttpClient::new().route_json(
            METADATA_TOKEN_URL,
            json!({"access_token": "abc", "expires_in": 30}),
        );
        let source = ComputeEngineToken::new(&client);

        source.access_token().unwrap();
        source.access_token().unwrap();
        assert_eq!(client.hits(METADATA_TOKEN_URL), 2);
    }

    #[test]
    fn installed_token_refreshes() {
        let client = CannedHttpClient::new().route(
            Method::Post,
            "https://oauth.test/token",
            HttpResponse::json_ok(&json!({"access_token": "fresh", "expires_in": 3600})),
        );
        let stored = StoredToken {
            refresh_token: "r".into(),
            client_id: "id".into(),
            client_secret: "s".into(),
            token_uri: "https://oauth.test/token".into(),
        };
        let source = InstalledToken::new(&client, stored);

        assert_eq!(source.access_token().unwrap(), "fresh");
        let body = client.requests()[0].body.clone().unwrap();
        assert!(body.as_json().is_none());
        assert_eq!(body.form_value("grant_type"), Some("refresh_token"));
        assert_eq!(body.form_value("refresh_token"), Some("r"));
        assert_eq!(body.form_value("client_id"), Some("id"));
        assert_eq!(body.form_value("client_secret"), Some("s"));
    }

    #[test]
    fn huge_expiry_is_cached_without_overflow() {
        let client = CannedHttpClient::new().route_json(
            METADATA_TOKEN_URL,
            json!({"access_token": "abc", "expires_in": u64::MAX}),
        );
        let source = ComputeEngineToken::new(&client);

        assert_eq!(source.access_token().unwrap(), "abc");
        assert_eq!(source.access_token().unwrap(), "abc");
        assert_eq!(client.hits(METADATA_TOKEN_URL), 1);
    }

    #[test]
    fn refused_refresh_is_an_auth_failure() {
        let client = CannedHttpClient::new().route(
            Method::Post,
            DEFAULT_TOKEN_URI,
            HttpResponse::new(400, "invalid_grant"),
        );
        let file = TempFile::with_contents(
            "token.json",
            r#"{"refresh_token": "r", "client_id": "id", "client_secret": "s"}"#,
        );
        let stored = StoredToken::load(file.path()).unwrap();
        assert_eq!(stored.token_uri, DEFAULT_TOKEN_URI);

        let source = InstalledToken::new(&client, stored);
        assert!(matches!(
            source.access_token(),
            Err(EngineError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn missing_token_file_names_the_path() {
        let file = TempFile::missing("token.json");
        let directory = DirectorySection {
            token_file: Some(file.path().to_path_buf()),
            ..DirectorySection::default()
        };

        let err = token_source(&directory, CannedHttpClient::new()).err().unwrap();
        assert!(matches!(err, ConfigError::TokenFile { .. }));
        assert!(err.to_string().contains("token.json"));

        let err = token_source(&DirectorySection::default(), CannedHttpClient::new())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Missing("directory.token_file")));
    }
}
