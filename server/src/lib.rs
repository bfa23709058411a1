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


pub mod errors;
pub mod routes;

use axum::routing::{get, post, put};
use axum::Router;
use proxy_core::{
    AccountsClient, AuthError, AuthorizationFlow, MusicApi, OperationProxy, ProxyConfig,
    SessionGate, TokenCache,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state handed to every handler.
pub struct AppState {
    pub flow: AuthorizationFlow,
    pub proxy: OperationProxy,
}

impl AppState {
    /// Wires the flow and the proxy to one gate, so logins and refreshes
    /// write the cache under the same lock.
    pub fn new(
        config: &ProxyConfig,
        cache: Arc<dyn TokenCache>,
        api: Arc<dyn MusicApi>,
    ) -> Result<Self, AuthError> {
        let accounts = Arc::new(AccountsClient::new(config)?);
        let gate = Arc::new(SessionGate::new(
            cache,
            accounts.clone(),
            config.clock_skew,
        ));

        Ok(Self {
            flow: AuthorizationFlow::new(config, accounts, gate.clone())?,
            proxy: OperationProxy::new(gate, api),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", get(routes::login))
        .route("/callback", get(routes::callback))
        .route("/search", get(routes::search))
        .route("/track/:id", get(routes::track))
        .route("/playlists", get(routes::playlists))
        .route("/playlists/:id/tracks", post(routes::add_to_playlist))
        .route("/play", put(routes::play))
        .route("/queue", post(routes::queue))
        .with_state(state)
        .layer(CorsLayer::permissive())
}
