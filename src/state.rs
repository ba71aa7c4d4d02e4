//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It is
//! read-only after startup: every request builds its own engine and raster
//! cache, so handlers share nothing mutable and need no locks.

use std::sync::Arc;

use canvas::fonts::FontBook;
use canvas::raster::AssetFetcher;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub fonts: Arc<FontBook>,
    pub fetcher: Arc<dyn AssetFetcher>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, fonts: FontBook, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self { config: Arc::new(config), fonts: Arc::new(fonts), fetcher }
    }
}
