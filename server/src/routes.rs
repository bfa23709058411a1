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


use crate::errors::AppError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use log::info;
use proxy_core::{CallbackParams, SimplifiedTrack};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

type Shared = State<Arc<AppState>>;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    /// Kept as text so a bad value is reported after the session check.
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackBody {
    pub track_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackIdsBody {
    pub track_ids: Option<Vec<String>>,
}

fn success() -> Json<Value> {
    Json(json!({ "status": "success" }))
}

/// GET /login
pub async fn login(State(state): Shared) -> impl IntoResponse {
    info!("Redirecting to Spotify authorization page");
    Redirect::to(state.flow.authorize_url())
}

/// GET /callback
pub async fn callback(
    State(state): Shared,
    Query(params): Query<CallbackParams>,
) -> Result<Json<Value>, AppError> {
    state.flow.handle_callback(params).await?;
    Ok(Json(json!({ "status": "Authenticated successfully." })))
}

/// GET /search?q=
pub async fn search(
    State(state): Shared,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SimplifiedTrack>>, AppError> {
    let tracks = state
        .proxy
        .search(query.q.as_deref(), query.limit.as_deref())
        .await?;
    Ok(Json(tracks))
}

/// GET /track/:id
pub async fn track(State(state): Shared, Path(id): Path<String>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.proxy.track(&id).await?))
}

/// GET /playlists
pub async fn playlists(State(state): Shared) -> Result<Json<Value>, AppError> {
    Ok(Json(state.proxy.playlists().await?))
}

/// POST /playlists/:id/tracks
///
/// An absent or unparsable body is treated like one without `track_ids`.
pub async fn add_to_playlist(
    State(state): Shared,
    Path(id): Path<String>,
    body: Option<Json<TrackIdsBody>>,
) -> Result<Json<Value>, AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    state
        .proxy
        .add_to_playlist(&id, body.track_ids.as_deref())
        .await?;
    Ok(success())
}

/// PUT /play
pub async fn play(
    State(state): Shared,
    body: Option<Json<TrackBody>>,
) -> Result<Json<Value>, AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    state.proxy.play(body.track_id.as_deref()).await?;
    Ok(success())
}

/// POST /queue
pub async fn queue(
    State(state): Shared,
    body: Option<Json<TrackBody>>,
) -> Result<Json<Value>, AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    state.proxy.queue(body.track_id.as_deref()).await?;
    Ok(success())
}
