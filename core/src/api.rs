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
use crate::models::TokenRecord;
use async_trait::async_trait;
use log::debug;
use rspotify::model::{PlaylistId, TrackId};
use rspotify::prelude::*;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Spotify request failed: {0}")]
    Http(reqwest::Error),
    /// The Web API answered with an error status; `message` is its own text.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid Track ID: {0}")]
    InvalidTrackId(String),
    #[error("Invalid Playlist ID: {0}")]
    InvalidPlaylistId(String),
    #[error("Unexpected Spotify payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Spotify request timed out")]
    Timeout,
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Http(e)
        }
    }
}

/// Remote operations the proxy forwards.
///
/// Every call receives the token the session gate just approved; implementors
/// must not cache or refresh it themselves. Payloads are the remote JSON as
/// received.
#[async_trait]
pub trait MusicApi: Send + Sync {
    /// Raw track items of a track search.
    async fn search_tracks(
        &self,
        token: &TokenRecord,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Value>, ApiError>;

    async fn track(&self, token: &TokenRecord, track_id: &str) -> Result<Value, ApiError>;

    async fn current_user_playlists(&self, token: &TokenRecord) -> Result<Value, ApiError>;

    async fn add_to_playlist(
        &self,
        token: &TokenRecord,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), ApiError>;

    async fn start_playback(&self, token: &TokenRecord, track_id: &str) -> Result<(), ApiError>;

    async fn add_to_queue(&self, token: &TokenRecord, track_id: &str) -> Result<(), ApiError>;
}

/// `MusicApi` over the Spotify Web API.
///
/// IDs are validated with rspotify's typed IDs before anything is sent.
/// Responses are never decoded into typed models, so fields the SDK does not
/// model still reach the caller.
pub struct SpotifyApi {
    http: reqwest::Client,
    base_url: String,
}

impl SpotifyApi {
    pub fn new(config: &ProxyConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message: remote_message(&body).unwrap_or_else(|| format!("HTTP {}", status)),
        })
    }

    async fn get_json(
        &self,
        token: &TokenRecord,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let request = self
            .http
            .get(self.endpoint(path))
            .bearer_auth(&token.access_token)
            .query(query);
        Ok(self.send(request).await?.json().await?)
    }
}

/// Pulls `error.message` (or a bare `error` string) out of a Web API error body.
fn remote_message(body: &str) -> Option<String> {
    let body: Value = serde_json::from_str(body).ok()?;
    let error = body.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn track_id(id: &str) -> Result<TrackId<'_>, ApiError> {
    TrackId::from_id(id).map_err(|_| ApiError::InvalidTrackId(id.to_string()))
}

#[async_trait]
impl MusicApi for SpotifyApi {
    async fn search_tracks(
        &self,
        token: &TokenRecord,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Value>, ApiError> {
        debug!("Searching tracks (limit {})", limit);
        let limit = limit.to_string();
        let mut body = self
            .get_json(token, "search", &[("q", query), ("type", "track"), ("limit", &limit)])
            .await?;

        match body.pointer_mut("/tracks/items").map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    async fn track(&self, token: &TokenRecord, track_id_str: &str) -> Result<Value, ApiError> {
        let id = track_id(track_id_str)?;
        debug!("Fetching track {}", track_id_str);
        self.get_json(token, &format!("tracks/{}", id.id()), &[]).await
    }

    async fn current_user_playlists(&self, token: &TokenRecord) -> Result<Value, ApiError> {
        self.get_json(token, "me/playlists", &[("limit", "50")]).await
    }

    async fn add_to_playlist(
        &self,
        token: &TokenRecord,
        playlist_id_str: &str,
        track_ids: &[String],
    ) -> Result<(), ApiError> {
        let playlist_id = PlaylistId::from_id(playlist_id_str)
            .map_err(|_| ApiError::InvalidPlaylistId(playlist_id_str.to_string()))?;
        let uris = track_ids
            .iter()
            .map(|id| track_id(id).map(|id| id.uri()))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Adding {} tracks to playlist {}", uris.len(), playlist_id_str);
        let request = self
            .http
            .post(self.endpoint(&format!("playlists/{}/tracks", playlist_id.id())))
            .bearer_auth(&token.access_token)
            .json(&json!({ "uris": uris }));
        self.send(request).await?;
        Ok(())
    }

    async fn start_playback(&self, token: &TokenRecord, track_id_str: &str) -> Result<(), ApiError> {
        let uri = track_id(track_id_str)?.uri();
        debug!("Starting playback of {}", uri);

        let request = self
            .http
            .put(self.endpoint("me/player/play"))
            .bearer_auth(&token.access_token)
            .json(&json!({ "uris": [uri] }));
        self.send(request).await?;
        Ok(())
    }

    async fn add_to_queue(&self, token: &TokenRecord, track_id_str: &str) -> Result<(), ApiError> {
        let uri = track_id(track_id_str)?.uri();
        debug!("Queueing {}", uri);

        let request = self
            .http
            .post(self.endpoint("me/player/queue"))
            .bearer_auth(&token.access_token)
            .query(&[("uri", uri.as_str())])
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.send(request).await?;
        Ok(())
    }
}
