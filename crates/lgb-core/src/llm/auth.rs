//! OAuth access tokens for Vertex AI
//!
//! Only gcloud `authorized_user` application-default credentials are
//! supported: the refresh token is exchanged for a short-lived access token,
//! which is cached until shortly before it expires.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Google OAuth token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens are refreshed this long before their reported expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

/// `authorized_user` credentials file
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Refreshing source of bearer tokens
pub struct TokenSource {
    client: Client,
    credentials: AuthorizedUser,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    /// Load credentials from a JSON file, refreshing against `token_url`
    pub fn from_file<P: AsRef<Path>>(client: Client, path: P, token_url: &str) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Auth(format!("Failed to read credentials {}: {}", path.display(), e))
        })?;
        let credentials: AuthorizedUser = serde_json::from_str(&content)
            .map_err(|e| Error::Auth(format!("Invalid credentials file: {}", e)))?;

        Self::new(client, credentials, token_url)
    }

    /// Create from already parsed credentials
    pub fn new(client: Client, credentials: AuthorizedUser, token_url: &str) -> Result<Self> {
        if credentials.kind != "authorized_user" {
            return Err(Error::Auth(format!(
                "Unsupported credentials type '{}'; run `gcloud auth application-default login`",
                credentials.kind
            )));
        }

        Ok(Self {
            client,
            credentials,
            token_url: token_url.to_string(),
            cached: Mutex::new(None),
        })
    }

    /// Current access token, refreshing it when missing or about to expire
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
            debug!("Cached Vertex access token expired");
        }

        let token = self.refresh().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn refresh(&self) -> Result<CachedToken> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        if !status.is_success() {
            warn!("Token refresh failed: {} - {}", status, body);
            return Err(Error::Auth(format!("Token refresh failed: {}: {}", status, body)));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Auth(format!("Failed to parse token response: {}", e)))?;

        info!("Refreshed Vertex access token (expires in {}s)", parsed.expires_in);

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: Utc::now() + Duration::seconds(parsed.expires_in - EXPIRY_MARGIN_SECS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(kind: &str) -> AuthorizedUser {
        AuthorizedUser {
            kind: kind.to_string(),
            client_id: "client".to_string(),
            client_secret: "shh".to_string(),
            refresh_token: "refresh-me".to_string(),
        }
    }

    #[test]
    fn test_rejects_service_account() {
        let result = TokenSource::new(Client::new(), credentials("service_account"), GOOGLE_TOKEN_URL);
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = TokenSource::from_file(Client::new(), "/nonexistent/adc.json", GOOGLE_TOKEN_URL);
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adc.json");
        std::fs::write(
            &path,
            r#"{"type":"authorized_user","client_id":"c","client_secret":"s","refresh_token":"r"}"#,
        )
        .unwrap();

        assert!(TokenSource::from_file(Client::new(), &path, GOOGLE_TOKEN_URL).is_ok());
    }

    #[tokio::test]
    async fn test_access_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=refresh-me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = TokenSource::new(
            Client::new(),
            credentials("authorized_user"),
            &format!("{}/token", server.uri()),
        )
        .unwrap();

        assert_eq!(source.access_token().await.unwrap(), "ya29.token");
        assert_eq!(source.access_token().await.unwrap(), "ya29.token");
    }

    #[tokio::test]
    async fn test_refresh_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let source = TokenSource::new(
            Client::new(),
            credentials("authorized_user"),
            &format!("{}/token", server.uri()),
        )
        .unwrap();

        let err = source.access_token().await.unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
    }
}
