mod config;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use canvas::fonts::FontBook;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::services::assets::HttpAssetFetcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal outside local development.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let fonts = match &config.font_dir {
        Some(dir) => FontBook::with_dir(dir),
        None => FontBook::system(),
    };
    if fonts.face_count() == 0 {
        tracing::warn!("no font faces found; text will be measured but not drawn");
    } else {
        tracing::info!(faces = fonts.face_count(), "fonts loaded");
    }

    let fetcher = HttpAssetFetcher::new(config.asset_fetch_timeout, config.max_asset_bytes, config.allow_private_asset_hosts)?;
    let port = config.port;
    let state = state::AppState::new(config, fonts, Arc::new(fetcher));

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "pinstudio listening");
    axum::serve(listener, app).await?;
    Ok(())
}
