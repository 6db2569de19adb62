// Zoho access token provider
// Refresh-token grant with a process-wide cache

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ZohoAuthConfig, ZohoConfig};
use crate::{Result, SyncError};

/// Zoho tokens live one hour; refresh a little early
pub const TOKEN_LIFETIME_SECS: i64 = 3500;

/// Source of the bearer token attached to every Zoho call
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A currently valid access token, refreshing first when needed
    async fn access_token(&self) -> Result<String>;

    /// Drop any cached token so the next call refreshes
    async fn invalidate(&self) {}
}

/// A pre-issued token that is never refreshed
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Token endpoint response; Zoho reports grant errors with HTTP 200
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// OAuth refresh-token manager for Zoho
///
/// The cache sits behind an async mutex that stays locked for the whole refresh,
/// so only one refresh is ever in flight and every concurrent caller waits for
/// that refresh instead of starting its own. The refresh request carries the
/// same timeout as the Zoho client, which bounds how long that lock is held.
pub struct OAuthTokenManager {
    http_client: Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuthTokenManager {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        token_url: impl Into<String>,
        timeout: StdDuration,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build token HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            token_url: token_url.into(),
            cached: Mutex::new(None),
        })
    }

    /// Build the provider matching the configured auth mode
    pub fn provider_for(zoho: &ZohoConfig) -> Result<Arc<dyn TokenProvider>> {
        let provider: Arc<dyn TokenProvider> = match &zoho.auth {
            ZohoAuthConfig::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
                token_url,
            } => Arc::new(Self::new(
                client_id.clone(),
                client_secret.clone(),
                refresh_token.clone(),
                token_url.clone(),
                zoho.timeout,
            )?),
            ZohoAuthConfig::Static(token) => Arc::new(StaticToken::new(token.clone())),
        };
        Ok(provider)
    }

    async fn request_token(&self) -> Result<CachedToken> {
        info!("Refreshing Zoho access token");

        let params = [
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| SyncError::token(format!("token request failed: {e}"), true))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let retryable = status.is_server_error() || status.as_u16() == 429;
            return Err(SyncError::token(
                format!("token refresh returned HTTP {status}: {body}"),
                retryable,
            ));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::token(format!("unreadable token response: {e}"), false))?;

        if let Some(error) = body.error {
            return Err(SyncError::token(format!("token refresh rejected: {error}"), false));
        }

        let access_token = body
            .access_token
            .ok_or_else(|| SyncError::token("token response has no access_token", false))?;

        // Never trust a longer lifetime than our own refresh window
        let lifetime = body
            .expires_in
            .map(|secs| secs.min(TOKEN_LIFETIME_SECS))
            .unwrap_or(TOKEN_LIFETIME_SECS);

        debug!(lifetime_secs = lifetime, "Zoho access token refreshed");

        Ok(CachedToken {
            access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenManager {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn invalidate(&self) {
        warn!("Discarding cached Zoho access token");
        *self.cached.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(server: &MockServer) -> OAuthTokenManager {
        OAuthTokenManager::new(
            "client-id",
            "client-secret",
            "refresh-token",
            format!("{}/oauth/v2/token", server.uri()),
            StdDuration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new("abc");
        assert_eq!(provider.access_token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_token_cached_after_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(query_param("refresh_token", "refresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "1000.fresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        assert_eq!(manager.access_token().await.unwrap(), "1000.fresh");
        assert_eq!(manager.access_token().await.unwrap(), "1000.fresh");
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "shared", "expires_in": 3600}))
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let manager = Arc::new(manager(&server));
        let calls = (0..8).map(|_| {
            let manager = Arc::clone(&manager);
            async move { manager.access_token().await }
        });
        let tokens = futures::future::join_all(calls).await;

        assert!(tokens.iter().all(|t| t.as_deref().ok() == Some("shared")));
    }

    #[tokio::test]
    async fn test_grant_error_with_200_is_token_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "invalid_code"})))
            .mount(&server)
            .await;

        let err = manager(&server).access_token().await.unwrap_err();
        assert!(matches!(err, SyncError::Token { ref message, .. } if message.contains("invalid_code")));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_token_endpoint_outage_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = manager(&server).access_token().await.unwrap_err();
        assert!(matches!(err, SyncError::Token { retryable: true, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_hung_refresh_times_out_and_releases_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "late"}))
                    .set_delay(StdDuration::from_secs(30)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "on-time"})))
            .mount(&server)
            .await;

        let manager = OAuthTokenManager::new(
            "client-id",
            "client-secret",
            "refresh-token",
            format!("{}/oauth/v2/token", server.uri()),
            StdDuration::from_millis(200),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = manager.access_token().await.unwrap_err();
        assert!(started.elapsed() < StdDuration::from_secs(5));
        assert!(err.is_transient());
        assert_eq!(manager.access_token().await.unwrap(), "on-time");
    }

    #[test]
    fn test_provider_for_static_auth() {
        let zoho = ZohoConfig {
            shipments_api: "http://localhost/crm/v2/Shipments".to_string(),
            deals_api: "http://localhost/crm/v2/Deals".to_string(),
            accounts_api: "http://localhost/crm/v2/Accounts".to_string(),
            auth: ZohoAuthConfig::Static("pre-issued".to_string()),
            timeout: StdDuration::from_secs(5),
        };
        let provider = OAuthTokenManager::provider_for(&zoho).unwrap();
        assert_eq!(tokio_test::block_on(provider.access_token()).unwrap(), "pre-issued");
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t"})))
            .expect(2)
            .mount(&server)
            .await;

        let manager = manager(&server);
        manager.access_token().await.unwrap();
        manager.invalidate().await;
        manager.access_token().await.unwrap();
    }
}
