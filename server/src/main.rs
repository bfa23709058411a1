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


use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use log::info;
use proxy_core::{FileTokenCache, MemoryTokenCache, ProxyConfig, SpotifyApi, TokenCache};
use proxy_server::{router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "spotify-proxy")]
#[command(about = "HTTP proxy for the Spotify Web API with a single cached login", long_about = None)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "PROXY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, short = 'p', env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Persist the session to this JSON file instead of keeping it in memory
    #[arg(long, env = "PROXY_TOKEN_CACHE", value_name = "PATH")]
    token_cache: Option<PathBuf>,

    /// Base URL of the Spotify accounts service
    #[arg(long, env = "SPOTIFY_ACCOUNTS_URL", default_value = proxy_core::config::DEFAULT_ACCOUNTS_URL)]
    accounts_url: String,

    /// Base URL of the Spotify Web API
    #[arg(long, env = "SPOTIFY_API_URL", default_value = proxy_core::config::DEFAULT_API_URL)]
    api_url: String,

    /// Timeout for every outbound request, in seconds
    #[arg(long, default_value_t = 10)]
    http_timeout_secs: u64,

    /// Refresh tokens this many seconds before they expire
    #[arg(long, default_value_t = 60)]
    clock_skew_secs: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        // Silently ignore
    }

    env_logger::init();

    let cli = Cli::parse();

    let config = ProxyConfig::from_env()?
        .with_accounts_url(cli.accounts_url)
        .with_api_url(cli.api_url)
        .with_http_timeout(Duration::from_secs(cli.http_timeout_secs))
        .with_clock_skew(chrono::Duration::seconds(cli.clock_skew_secs));

    let cache: Arc<dyn TokenCache> = match &cli.token_cache {
        Some(path) => {
            info!("Using token cache file {}", path.display());
            Arc::new(FileTokenCache::open(path).await)
        }
        None => Arc::new(MemoryTokenCache::new()),
    };

    let api = Arc::new(SpotifyApi::new(&config)?);
    let state = AppState::new(&config, cache, api)?;
    let app = router(Arc::new(state));

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Spotify proxy listening on http://{} (log in via /login)", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
