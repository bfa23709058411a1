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

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod proxy;
pub mod session;

// Re-export key items for convenience
pub use api::{ApiError, MusicApi, SpotifyApi};
pub use auth::{AccountsClient, AuthError, AuthorizationFlow, CallbackParams};
pub use cache::{FileTokenCache, MemoryTokenCache, TokenCache};
pub use config::ProxyConfig;
pub use models::{SimplifiedTrack, TokenRecord};
pub use proxy::{OperationProxy, ProxyError};
pub use session::{SessionError, SessionGate};
pub use rspotify::Credentials;
