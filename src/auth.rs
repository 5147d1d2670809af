//! Credential file handling and bearer-token exchange.
//!
//! Credentials live in a JSON file mapping an application label to a bearer
//! token, written once by `auth set-tokens` and loaded once at startup.
//! Running without any configured credential is a fatal startup fault.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Token exchange endpoint for `client_credentials` grants.
const OAUTH_TOKEN_URL: &str = "https://api.twitter.com/oauth2/token";

/// One API identity with its own rate-limit bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Application label from the auth file (used only for logging).
    pub label: String,
    /// Token type, normally `bearer`.
    pub token_type: String,
    /// Opaque bearer material.
    pub access_token: String,
}

impl Credential {
    /// Value for the `Authorization` header: `"{token_type} {access_token}"`.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Bearer token as returned by the token exchange endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerToken {
    /// Token type, normally `bearer`.
    pub token_type: String,
    /// Opaque bearer material.
    pub access_token: String,
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Auth file could not be read or written
    #[error("auth file error: {0}")]
    Io(String),

    /// Auth file is not valid JSON
    #[error("auth file parse error: {0}")]
    Parse(String),

    /// No credentials configured
    #[error("no API credentials configured; run `auth set-tokens` first")]
    NoCredentials,

    /// Token exchange rejected by the provider
    #[error("token exchange failed with HTTP {status}: {body}")]
    Exchange {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Token exchange network failure
    #[error("token exchange network error: {0}")]
    Network(String),
}

/// Default auth file location: `~/.twitter/auth.json`.
pub fn default_auth_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".twitter")
        .join("auth.json")
}

/// Load all credentials from an auth file.
///
/// The file maps application labels to bearer tokens. Labels are returned in
/// sorted order so credential indices are stable between runs.
///
/// # Errors
/// [`AuthError::NoCredentials`] when the file is missing or empty; the
/// harvester cannot start without at least one credential.
pub fn load_credentials(path: &Path) -> Result<Vec<Credential>, AuthError> {
    if !path.exists() {
        return Err(AuthError::NoCredentials);
    }

    let contents = std::fs::read_to_string(path).map_err(|e| AuthError::Io(e.to_string()))?;
    let tokens: BTreeMap<String, BearerToken> =
        serde_json::from_str(&contents).map_err(|e| AuthError::Parse(e.to_string()))?;

    if tokens.is_empty() {
        return Err(AuthError::NoCredentials);
    }

    Ok(tokens
        .into_iter()
        .map(|(label, token)| Credential {
            label,
            token_type: token.token_type,
            access_token: token.access_token,
        })
        .collect())
}

/// Merge bearer tokens into an auth file, creating it if absent.
///
/// Existing entries under other labels are preserved; an entry under the
/// same label is replaced.
pub fn save_credentials(
    path: &Path,
    tokens: BTreeMap<String, BearerToken>,
) -> Result<(), AuthError> {
    let mut existing: BTreeMap<String, BearerToken> = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| AuthError::Io(e.to_string()))?;
        serde_json::from_str(&contents).unwrap_or_default()
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AuthError::Io(e.to_string()))?;
        }
        BTreeMap::new()
    };

    existing.extend(tokens);

    let json = serde_json::to_string_pretty(&existing)
        .map_err(|e| AuthError::Parse(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| AuthError::Io(e.to_string()))?;
    Ok(())
}

/// Exchange a consumer key/secret pair for a bearer token.
///
/// POSTs a `client_credentials` grant with HTTP basic auth.
pub async fn exchange_bearer(
    http: &reqwest::Client,
    key: &str,
    secret: &str,
) -> Result<BearerToken, AuthError> {
    let response = http
        .post(OAUTH_TOKEN_URL)
        .basic_auth(key, Some(secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .map_err(|e| AuthError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Exchange {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<BearerToken>()
        .await
        .map_err(|e| AuthError::Parse(e.to_string()))
}
