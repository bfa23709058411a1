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

use crate::auth::AuthError;
use rspotify::Credentials;
use std::time::Duration;

pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 60;

/// Settings shared by the authorization flow, the session gate and the
/// Spotify client.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Client id and secret of the registered Spotify application.
    pub credentials: Credentials,
    /// Must match one of the redirect URIs registered for the application.
    pub redirect_uri: String,
    /// Base URL of the accounts service (`/authorize` and `/api/token`).
    pub accounts_url: String,
    /// Base URL of the Web API that proxied operations are sent to.
    pub api_url: String,
    /// Upper bound for every outbound request.
    pub http_timeout: Duration,
    /// Tokens closer than this to their expiry are refreshed early.
    pub clock_skew: chrono::Duration,
}

impl ProxyConfig {
    pub fn new(credentials: Credentials, redirect_uri: impl Into<String>) -> Self {
        Self {
            credentials,
            redirect_uri: redirect_uri.into(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            clock_skew: chrono::Duration::seconds(DEFAULT_CLOCK_SKEW_SECS),
        }
    }

    /// Reads the application credentials from the environment.
    ///
    /// `rspotify` expects `RSPOTIFY_CLIENT_ID` / `RSPOTIFY_CLIENT_SECRET`;
    /// the redirect URI comes from `RSPOTIFY_REDIRECT_URI`.
    pub fn from_env() -> Result<Self, AuthError> {
        let credentials = Credentials::from_env().ok_or_else(|| {
            AuthError::ClientConfig(
                "Missing RSPOTIFY_CLIENT_ID or RSPOTIFY_CLIENT_SECRET".to_string(),
            )
        })?;

        let redirect_uri = std::env::var("RSPOTIFY_REDIRECT_URI")
            .map_err(|_| AuthError::ClientConfig("Missing RSPOTIFY_REDIRECT_URI".to_string()))?;

        Ok(Self::new(credentials, redirect_uri))
    }

    #[must_use]
    pub fn with_accounts_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = url.into();
        self
    }

    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_clock_skew(mut self, skew: chrono::Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    pub(crate) fn accounts_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.accounts_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = ProxyConfig::new(Credentials::new("id", "secret"), "http://localhost/cb");
        assert_eq!(config.accounts_url, DEFAULT_ACCOUNTS_URL);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.clock_skew, chrono::Duration::seconds(60));

        let config = config
            .with_accounts_url("http://127.0.0.1:9999/")
            .with_api_url("http://127.0.0.1:9998/v1")
            .with_http_timeout(Duration::from_secs(2))
            .with_clock_skew(chrono::Duration::zero());

        assert_eq!(config.accounts_endpoint("/api/token"), "http://127.0.0.1:9999/api/token");
        assert_eq!(config.api_url, "http://127.0.0.1:9998/v1");
        assert_eq!(config.http_timeout, Duration::from_secs(2));
        assert_eq!(config.clock_skew, chrono::Duration::zero());
    }
}
