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

use crate::models::TokenRecord;
use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Single-slot storage for the current token record.
///
/// Absence is a normal state (nobody has logged in yet). `put` always
/// overwrites whatever was stored before.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self) -> Option<TokenRecord>;
    async fn put(&self, record: TokenRecord);
}

/// Process-local cache; empty at startup and lost on exit.
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    slot: RwLock<Option<TokenRecord>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a record already in place.
    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            slot: RwLock::new(Some(record)),
        }
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self) -> Option<TokenRecord> {
        self.slot.read().await.clone()
    }

    async fn put(&self, record: TokenRecord) {
        *self.slot.write().await = Some(record);
    }
}

/// Cache that mirrors the slot to a JSON file so a login survives restarts.
///
/// The in-memory copy is authoritative; disk failures are logged and
/// otherwise ignored. The file holds a refresh token, so it is created
/// owner-only and replaced by rename, never rewritten in place.
#[derive(Debug)]
pub struct FileTokenCache {
    path: PathBuf,
    memory: MemoryTokenCache,
}

impl FileTokenCache {
    /// Opens the cache at `path`, loading any record already written there.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let memory = match load_record(&path).await {
            Some(record) => {
                debug!("Loaded cached token from {}", path.display());
                MemoryTokenCache::with_record(record)
            }
            None => MemoryTokenCache::new(),
        };
        Self { path, memory }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn load_record(path: &Path) -> Option<TokenRecord> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read token cache {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Ignoring corrupt token cache {}: {}", path.display(), e);
            None
        }
    }
}

async fn write_record(path: &Path, json: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&tmp).await?;
    file.write_all(json).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl TokenCache for FileTokenCache {
    async fn get(&self) -> Option<TokenRecord> {
        self.memory.get().await
    }

    async fn put(&self, record: TokenRecord) {
        match serde_json::to_vec_pretty(&record) {
            Ok(json) => {
                if let Err(e) = write_record(&self.path, &json).await {
                    warn!("Failed to write token cache {}: {}", self.path.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize token record: {}", e),
        }
        self.memory.put(record).await;
    }
}
