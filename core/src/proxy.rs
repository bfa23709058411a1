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

use crate::api::{ApiError, MusicApi};
use crate::models::SimplifiedTrack;
use crate::session::{SessionError, SessionGate};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
const MAX_SEARCH_LIMIT: u32 = 50;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error(transparent)]
    NotAuthenticated(#[from] SessionError),
    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),
    #[error("Invalid {0} parameter")]
    InvalidParameter(&'static str),
    #[error("{0}")]
    InvalidId(String),
    #[error("{0}")]
    Remote(String),
}

impl From<ApiError> for ProxyError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::InvalidTrackId(_) | ApiError::InvalidPlaylistId(_) => {
                ProxyError::InvalidId(e.to_string())
            }
            ApiError::Rejected { message, .. } => ProxyError::Remote(message),
            other => ProxyError::Remote(other.to_string()),
        }
    }
}

/// Gated pass-through to the remote API.
///
/// Every operation passes the session gate before its input is even looked
/// at, and nothing reaches `MusicApi` without a token approved for this call.
pub struct OperationProxy {
    gate: Arc<SessionGate>,
    api: Arc<dyn MusicApi>,
}

impl OperationProxy {
    pub fn new(gate: Arc<SessionGate>, api: Arc<dyn MusicApi>) -> Self {
        Self { gate, api }
    }

    pub async fn search(
        &self,
        query: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Vec<SimplifiedTrack>, ProxyError> {
        let token = self.gate.require_valid_token().await?;
        let query = required(query, "query")?;
        let limit = search_limit(limit)?;

        let items = self.api.search_tracks(&token, query, limit).await?;
        items
            .into_iter()
            .map(SimplifiedTrack::from_remote)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProxyError::Remote(ApiError::from(e).to_string()))
    }

    /// Track object exactly as the remote API returned it.
    pub async fn track(&self, id: &str) -> Result<Value, ProxyError> {
        let token = self.gate.require_valid_token().await?;
        let id = required(Some(id), "id")?;
        Ok(self.api.track(&token, id).await?)
    }

    pub async fn playlists(&self) -> Result<Value, ProxyError> {
        let token = self.gate.require_valid_token().await?;
        Ok(self.api.current_user_playlists(&token).await?)
    }

    pub async fn add_to_playlist(
        &self,
        playlist_id: &str,
        track_ids: Option<&[String]>,
    ) -> Result<(), ProxyError> {
        let token = self.gate.require_valid_token().await?;
        let playlist_id = required(Some(playlist_id), "id")?;
        let track_ids = match track_ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => return Err(ProxyError::MissingParameter("track_ids")),
        };
        Ok(self
            .api
            .add_to_playlist(&token, playlist_id, track_ids)
            .await?)
    }

    pub async fn play(&self, track_id: Option<&str>) -> Result<(), ProxyError> {
        let token = self.gate.require_valid_token().await?;
        let track_id = required(track_id, "track_id")?;
        Ok(self.api.start_playback(&token, track_id).await?)
    }

    pub async fn queue(&self, track_id: Option<&str>) -> Result<(), ProxyError> {
        let token = self.gate.require_valid_token().await?;
        let track_id = required(track_id, "track_id")?;
        Ok(self.api.add_to_queue(&token, track_id).await?)
    }
}

/// Blank means the default; anything else must be a number and is clamped.
fn search_limit(raw: Option<&str>) -> Result<u32, ProxyError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_SEARCH_LIMIT),
        Some(v) => v
            .parse::<u32>()
            .map(|n| n.clamp(1, MAX_SEARCH_LIMIT))
            .map_err(|_| ProxyError::InvalidParameter("limit")),
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, ProxyError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ProxyError::MissingParameter(name))
}
