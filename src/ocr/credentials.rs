//! Google service account authentication.
//!
//! Mints an RS256-signed JWT from a service account key file and exchanges it
//! for an OAuth2 access token. Tokens are cached until shortly before expiry.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub const VISION_SCOPE: &str = "https://www.googleapis.com/auth/cloud-vision";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this many seconds before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// A service account able to produce bearer tokens for one OAuth2 scope.
#[derive(Clone)]
pub struct ServiceAccount {
    key: ServiceAccountKey,
    scope: String,
    token_cache: Arc<Mutex<Option<CachedToken>>>,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.key.client_email)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Load a service account key JSON file.
    pub fn from_file(path: &Path, scope: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key: {:?}", path))?;
        let account = Self::from_json(&json, scope)
            .with_context(|| format!("Failed to parse service account key: {:?}", path))?;
        info!(
            "Loaded service account {} from {:?}",
            account.key.client_email, path
        );
        Ok(account)
    }

    pub fn from_json(json: &str, scope: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json)?;
        Ok(Self {
            key,
            scope: scope.to_string(),
            token_cache: Arc::new(Mutex::new(None)),
        })
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn cached_token(&self, now: i64) -> Option<String> {
        let cache = self.token_cache.lock().unwrap();
        cache
            .as_ref()
            .filter(|cached| now < cached.expires_at - EXPIRY_MARGIN_SECS)
            .map(|cached| cached.access_token.clone())
    }

    /// Get a valid OAuth2 access token, refreshing if expired.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String> {
        let now = Utc::now().timestamp();
        if let Some(token) = self.cached_token(now) {
            return Ok(token);
        }

        debug!("Minting access token for {}", self.key.client_email);

        let claims = serde_json::json!({
            "iss": self.key.client_email,
            "scope": self.scope,
            "aud": self.token_uri(),
            "iat": now,
            "exp": now + 3600,
        });

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("Invalid RSA private key in service account JSON")?;

        let jwt = jsonwebtoken::encode(&header, &claims, &encoding_key)
            .context("Failed to encode JWT")?;

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let resp: TokenResponse = client
            .post(self.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .context("Token exchange request failed")?
            .error_for_status()
            .context("Token exchange returned error")?
            .json()
            .await
            .context("Failed to parse token response")?;

        let token = resp.access_token.clone();
        *self.token_cache.lock().unwrap() = Some(CachedToken {
            access_token: resp.access_token,
            expires_at: now + resp.expires_in,
        });

        Ok(token)
    }
}
