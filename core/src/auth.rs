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

use crate::config::ProxyConfig;
use crate::models::{TokenErrorBody, TokenGrant, TokenRecord};
use crate::session::SessionGate;
use chrono::Utc;
use log::{debug, info, warn};
use rspotify::{scopes, Credentials};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to initialize Spotify client: {0}")]
    ClientConfig(String),
    #[error("{0}")]
    AuthorizationDenied(String),
    #[error("Authentication failed.")]
    MalformedCallback,
    #[error("{0}")]
    Exchange(String),
    #[error("Spotify accounts request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Scopes requested at login.
///
/// - user-library-read / user-library-modify: saved tracks.
/// - user-read-playback-state / user-modify-playback-state: playback and queue.
pub fn requested_scopes() -> HashSet<String> {
    scopes!(
        "user-library-read",
        "user-library-modify",
        "user-read-playback-state",
        "user-modify-playback-state"
    )
}

/// Client for the accounts service token endpoint.
///
/// Both grants authenticate with HTTP Basic client credentials.
#[derive(Debug)]
pub struct AccountsClient {
    http: reqwest::Client,
    token_url: String,
    credentials: Credentials,
    client_secret: String,
    redirect_uri: String,
}

impl AccountsClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, AuthError> {
        let client_secret = config
            .credentials
            .secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::ClientConfig("Missing client secret".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AuthError::ClientConfig(e.to_string()))?;

        Ok(Self {
            http,
            token_url: config.accounts_endpoint("api/token"),
            credentials: config.credentials.clone(),
            client_secret,
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// Trades a single-use authorization code for a token grant.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError> {
        self.request_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    /// Obtains a new access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        self.request_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn request_grant(&self, params: &[(&str, &str)]) -> Result<TokenGrant, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.credentials.id, Some(&self.client_secret))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenErrorBody>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(AuthError::Exchange(detail));
        }

        Ok(response.json().await?)
    }
}

/// Query parameters Spotify appends when redirecting back to `/callback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Login half of the session: sends the user to Spotify and turns the
/// returned code into a cached token.
pub struct AuthorizationFlow {
    accounts: Arc<AccountsClient>,
    gate: Arc<SessionGate>,
    authorize_url: String,
}

impl AuthorizationFlow {
    pub fn new(
        config: &ProxyConfig,
        accounts: Arc<AccountsClient>,
        gate: Arc<SessionGate>,
    ) -> Result<Self, AuthError> {
        let authorize_url = build_authorize_url(config)?;
        Ok(Self {
            accounts,
            gate,
            authorize_url,
        })
    }

    /// Where `/login` redirects to. Fixed for the lifetime of the flow.
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    /// Exchanges `code` and hands the resulting record to the session gate.
    ///
    /// Codes are single-use, so a failure here is never retried.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord, AuthError> {
        let grant = self.accounts.exchange_code(code).await?;
        let record = TokenRecord::from_grant(grant, Utc::now());
        self.gate.establish(record.clone()).await;
        info!("Authorization code exchanged; session established");
        Ok(record)
    }

    pub async fn handle_callback(&self, params: CallbackParams) -> Result<TokenRecord, AuthError> {
        if let Some(error) = non_blank(params.error) {
            warn!("Authorization denied by Spotify: {}", error);
            return Err(AuthError::AuthorizationDenied(error));
        }

        match non_blank(params.code) {
            Some(code) => self.exchange_code(&code).await,
            None => {
                debug!("Callback without code or error");
                Err(AuthError::MalformedCallback)
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn build_authorize_url(config: &ProxyConfig) -> Result<String, AuthError> {
    let mut scopes: Vec<String> = requested_scopes().into_iter().collect();
    scopes.sort();

    let url = Url::parse_with_params(
        &config.accounts_endpoint("authorize"),
        &[
            ("response_type", "code"),
            ("client_id", config.credentials.id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", scopes.join(" ").as_str()),
        ],
    )
    .map_err(|e| AuthError::ClientConfig(format!("Invalid accounts URL: {}", e)))?;

    Ok(url.into())
}
