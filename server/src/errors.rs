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


use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use proxy_core::{AuthError, ProxyError};
use serde_json::json;
use thiserror::Error;

/// Every failure a handler can return. Rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Proxy(ProxyError::NotAuthenticated(_)) => StatusCode::UNAUTHORIZED,
            AppError::Proxy(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::ClientConfig(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Auth(AuthError::ClientConfig(e)) => error!("Configuration error: {}", e),
            AppError::Auth(e) => warn!("Authorization failed: {}", e),
            AppError::Proxy(ProxyError::Remote(e)) => warn!("Spotify rejected request: {}", e),
            AppError::Proxy(_) => {}
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
