/*
    spotify-proxy-rs | Rust HTTP proxy for the Spotify Web API.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::auth::AccountsClient;
use crate::cache::TokenCache;
use crate::models::TokenRecord;
use chrono::{Duration, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("User not authenticated. Please log in via /login.")]
    NotAuthenticated,
}

/// Decides, per request, whether the cached session may be used.
///
/// There is one session per process. The gate holds it by handle instead of
/// through a global, so keying the cache by user later only touches this type.
pub struct SessionGate {
    cache: Arc<dyn TokenCache>,
    accounts: Arc<AccountsClient>,
    clock_skew: Duration,
    refresh_lock: Mutex<()>,
}

impl SessionGate {
    pub fn new(
        cache: Arc<dyn TokenCache>,
        accounts: Arc<AccountsClient>,
        clock_skew: Duration,
    ) -> Self {
        Self {
            cache,
            accounts,
            clock_skew,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns a token that is valid right now, refreshing it if needed.
    ///
    /// Expiry is re-checked on every call. A rejected refresh is final: the
    /// stale record stays in the cache and the user has to log in again.
    pub async fn require_valid_token(&self) -> Result<TokenRecord, SessionError> {
        let record = self.current().await?;
        if !record.is_expired_at(Utc::now(), self.clock_skew) {
            return Ok(record);
        }

        // Check-then-refresh-then-write happens under the lock so concurrent
        // requests produce a single refresh.
        let _guard = self.refresh_lock.lock().await;

        let record = self.current().await?;
        if !record.is_expired_at(Utc::now(), self.clock_skew) {
            debug!("Token was refreshed by a concurrent request");
            return Ok(record);
        }

        if !record.has_refresh_token() {
            debug!("Cached token expired and has no refresh token");
            return Err(SessionError::NotAuthenticated);
        }

        match self.accounts.refresh(&record.refresh_token).await {
            Ok(grant) => {
                let refreshed = record.refreshed(grant, Utc::now());
                self.cache.put(refreshed.clone()).await;
                info!("Access token refreshed; expires at {}", refreshed.expires_at);
                Ok(refreshed)
            }
            Err(e) => {
                warn!("Token refresh rejected, a new login is required: {}", e);
                Err(SessionError::NotAuthenticated)
            }
        }
    }

    /// Stores a freshly issued record, replacing whatever session was cached.
    ///
    /// Takes the refresh lock, so an in-flight refresh of the old session
    /// cannot land after it.
    pub async fn establish(&self, record: TokenRecord) {
        let _guard = self.refresh_lock.lock().await;
        self.cache.put(record).await;
    }

    async fn current(&self) -> Result<TokenRecord, SessionError> {
        match self.cache.get().await {
            Some(record) if record.has_access_token() => Ok(record),
            _ => {
                debug!("No usable session in cache");
                Err(SessionError::NotAuthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryTokenCache;
    use crate::config::ProxyConfig;
    use rspotify::Credentials;
    use std::collections::HashSet;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(access: &str, refresh: &str, expires_in_secs: i64) -> TokenRecord {
        TokenRecord {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            scope: HashSet::from(["user-library-read".to_string()]),
        }
    }

    fn gate(accounts_url: &str, cache: Arc<MemoryTokenCache>) -> SessionGate {
        let config = ProxyConfig::new(
            Credentials::new("client-id", "client-secret"),
            "http://localhost:5000/callback",
        )
        .with_accounts_url(accounts_url);
        let accounts = Arc::new(AccountsClient::new(&config).unwrap());
        SessionGate::new(cache, accounts, config.clock_skew)
    }

    async fn refresh_server(status: u16, body: serde_json::Value, calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(calls)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_empty_cache_is_not_authenticated() {
        let server = MockServer::start().await;
        let gate = gate(&server.uri(), Arc::new(MemoryTokenCache::new()));

        assert_eq!(
            gate.require_valid_token().await,
            Err(SessionError::NotAuthenticated)
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_without_access_token_is_not_a_session() {
        let server = MockServer::start().await;
        let cache = Arc::new(MemoryTokenCache::with_record(record("", "refresh-1", 3600)));
        let gate = gate(&server.uri(), cache);

        assert_eq!(
            gate.require_valid_token().await,
            Err(SessionError::NotAuthenticated)
        );
    }

    #[tokio::test]
    async fn test_fresh_token_is_returned_without_refresh() {
        let server = refresh_server(200, serde_json::json!({}), 0).await;
        let stored = record("access-1", "refresh-1", 3600);
        let gate = gate(
            &server.uri(),
            Arc::new(MemoryTokenCache::with_record(stored.clone())),
        );

        assert_eq!(gate.require_valid_token().await, Ok(stored));
    }

    #[tokio::test]
    async fn test_token_inside_skew_window_is_refreshed() {
        let server = refresh_server(
            200,
            serde_json::json!({"access_token": "access-2", "token_type": "Bearer", "expires_in": 3600}),
            1,
        )
        .await;
        let cache = Arc::new(MemoryTokenCache::with_record(record("access-1", "refresh-1", 30)));
        let gate = gate(&server.uri(), cache.clone());

        let token = gate.require_valid_token().await.unwrap();
        assert_eq!(token.access_token, "access-2");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_cached() {
        let server = refresh_server(
            200,
            serde_json::json!({
                "access_token": "access-2",
                "token_type": "Bearer",
                "scope": "user-library-read",
                "expires_in": 3600
            }),
            1,
        )
        .await;
        let cache = Arc::new(MemoryTokenCache::with_record(record("access-1", "refresh-1", -10)));
        let gate = gate(&server.uri(), cache.clone());

        let token = gate.require_valid_token().await.unwrap();
        assert_eq!(token.access_token, "access-2");
        assert_eq!(token.refresh_token, "refresh-1");
        assert!(token.expires_at > Utc::now() + Duration::seconds(3000));

        let cached = cache.get().await.unwrap();
        assert_eq!(cached, token);

        // Second call uses the refreshed record; the mock expects one refresh.
        assert_eq!(gate.require_valid_token().await.unwrap(), token);
    }

    #[tokio::test]
    async fn test_rejected_refresh_requires_new_login() {
        let server = refresh_server(
            400,
            serde_json::json!({"error": "invalid_grant", "error_description": "Refresh token revoked"}),
            2,
        )
        .await;
        let stale = record("access-1", "refresh-1", -10);
        let cache = Arc::new(MemoryTokenCache::with_record(stale.clone()));
        let gate = gate(&server.uri(), cache.clone());

        assert_eq!(
            gate.require_valid_token().await,
            Err(SessionError::NotAuthenticated)
        );
        assert_eq!(cache.get().await, Some(stale));

        // Still rejected on the next request; nothing was half-written.
        assert_eq!(
            gate.require_valid_token().await,
            Err(SessionError::NotAuthenticated)
        );
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_token() {
        let server = refresh_server(200, serde_json::json!({}), 0).await;
        let cache = Arc::new(MemoryTokenCache::with_record(record("access-1", "", -10)));
        let gate = gate(&server.uri(), cache);

        assert_eq!(
            gate.require_valid_token().await,
            Err(SessionError::NotAuthenticated)
        );
    }

    #[tokio::test]
    async fn test_established_record_replaces_session() {
        let server = refresh_server(200, serde_json::json!({}), 0).await;
        let cache = Arc::new(MemoryTokenCache::with_record(record("access-1", "refresh-1", -10)));
        let gate = gate(&server.uri(), cache.clone());

        let fresh = record("access-9", "refresh-9", 3600);
        gate.establish(fresh.clone()).await;

        assert_eq!(cache.get().await, Some(fresh.clone()));
        assert_eq!(gate.require_valid_token().await, Ok(fresh));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_refresh() {
        let server = refresh_server(
            200,
            serde_json::json!({"access_token": "access-2", "token_type": "Bearer", "expires_in": 3600}),
            1,
        )
        .await;
        let cache = Arc::new(MemoryTokenCache::with_record(record("access-1", "refresh-1", -10)));
        let gate = Arc::new(gate(&server.uri(), cache));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.require_valid_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().access_token, "access-2");
        }
    }
}
