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

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// The most recent set of credentials obtained from the accounts service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub scope: HashSet<String>,
}

impl TokenRecord {
    /// Builds a record from a fresh `authorization_code` grant.
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.unwrap_or_default(),
            expires_at: now + Duration::seconds(grant.expires_in),
            scope: parse_scope(grant.scope.as_deref()),
        }
    }

    /// Applies a `refresh_token` grant on top of this record.
    ///
    /// The refresh token is kept unless the accounts service rotated it, and
    /// the scope is kept when the response omits it.
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.refresh_token.clone()),
            expires_at: now + Duration::seconds(grant.expires_in),
            scope: match grant.scope.as_deref() {
                Some(s) if !s.trim().is_empty() => parse_scope(Some(s)),
                _ => self.scope.clone(),
            },
        }
    }

    /// A record without an access token never counts as a session.
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// True once `now + skew` has reached `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now + skew >= self.expires_at
    }
}

fn parse_scope(scope: Option<&str>) -> HashSet<String> {
    scope
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Body returned by the accounts service `/api/token` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Error body returned by the accounts service on a rejected grant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Reduced projection of a track returned by `/search`.
///
/// Every leaf is optional: fields the remote item lacks are emitted as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedTrack {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Vec<ArtistSummary>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub album: AlbumSummary,
    pub href: Option<String>,
    pub uri: Option<String>,
    pub preview_url: Option<String>,
    pub popularity: Option<u32>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub id: Option<String>,
    pub name: Option<String>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumSummary {
    pub id: Option<String>,
    pub name: Option<String>,
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
    pub images: Option<Vec<AlbumImage>>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumImage {
    pub url: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

impl SimplifiedTrack {
    /// Projects one remote track item down to the search field set.
    pub fn from_remote(item: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(item)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grant(access: &str, refresh: Option<&str>, scope: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: access.to_string(),
            token_type: Some("Bearer".to_string()),
            scope: scope.map(str::to_string),
            expires_in: 3600,
            refresh_token: refresh.map(str::to_string),
        }
    }

    #[test]
    fn test_record_from_grant_sets_expiry_and_scope() {
        let now = Utc::now();
        let record = TokenRecord::from_grant(
            grant("acc", Some("ref"), Some("user-library-read user-read-playback-state")),
            now,
        );

        assert_eq!(record.expires_at, now + Duration::seconds(3600));
        assert_eq!(record.refresh_token, "ref");
        assert!(record.scope.contains("user-library-read"));
        assert!(record.scope.contains("user-read-playback-state"));
        assert_eq!(record.scope.len(), 2);
    }

    #[test]
    fn test_refresh_keeps_refresh_token_unless_rotated() {
        let now = Utc::now();
        let record = TokenRecord::from_grant(grant("old", Some("ref-1"), Some("a b")), now);

        let kept = record.refreshed(grant("new", None, None), now);
        assert_eq!(kept.access_token, "new");
        assert_eq!(kept.refresh_token, "ref-1");
        assert_eq!(kept.scope, record.scope);

        let rotated = record.refreshed(grant("newer", Some("ref-2"), Some("c")), now);
        assert_eq!(rotated.refresh_token, "ref-2");
        assert_eq!(rotated.scope.len(), 1);
    }

    #[test]
    fn test_expiry_respects_skew() {
        let now = Utc::now();
        let record = TokenRecord {
            access_token: "acc".to_string(),
            refresh_token: String::new(),
            expires_at: now + Duration::seconds(30),
            scope: HashSet::new(),
        };

        assert!(!record.is_expired_at(now, Duration::zero()));
        assert!(record.is_expired_at(now, Duration::seconds(60)));
        assert!(!record.has_refresh_token());
    }

    #[test]
    fn test_simplified_track_keeps_only_projection() {
        let item = json!({
            "id": "t1",
            "name": "Song",
            "artists": [{"id": "a1", "name": "Artist", "href": "https://api/a1", "type": "artist"}],
            "album": {
                "id": "al1",
                "name": "Album",
                "release_date": "2020-01-01",
                "total_tracks": 12,
                "images": [{"url": "https://img", "height": 640, "width": 640}],
                "href": "https://api/al1",
                "album_type": "album"
            },
            "href": "https://api/t1",
            "uri": "spotify:track:t1",
            "preview_url": "https://p.scdn.co/t1",
            "popularity": 42,
            "duration_ms": 210000,
            "explicit": false,
            "available_markets": ["MX"]
        });

        let track = SimplifiedTrack::from_remote(item).unwrap();
        let out = serde_json::to_value(&track).unwrap();

        assert_eq!(out["album"]["total_tracks"], 12);
        assert_eq!(out["artists"][0]["name"], "Artist");
        assert!(out.get("explicit").is_none());
        assert!(out.get("available_markets").is_none());
        assert!(out["artists"][0].get("type").is_none());
    }

    #[test]
    fn test_simplified_track_missing_fields_become_null() {
        let track = SimplifiedTrack::from_remote(json!({"id": "t2", "album": null})).unwrap();
        let out = serde_json::to_value(&track).unwrap();

        assert_eq!(out["id"], "t2");
        assert!(out["name"].is_null());
        assert!(out["preview_url"].is_null());
        assert!(out["popularity"].is_null());
        assert!(out["album"]["name"].is_null());
        assert!(out["album"]["images"].is_null());
        assert_eq!(out["artists"], json!([]));
    }
}
