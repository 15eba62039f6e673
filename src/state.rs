//! Shared state handed to pipeline stages and system routes.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::infrastructure::{AssetStore, DirAssetStore, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PipelineConfig>,
    pub limiter: RateLimiter,
    pub assets: Arc<dyn AssetStore>,
}

impl AppState {
    /// Builds state with a directory asset store rooted at `config.static_root`.
    pub fn new(config: PipelineConfig) -> Self {
        let assets = Arc::new(DirAssetStore::new(config.static_root.clone()));
        Self::with_assets(config, assets)
    }

    pub fn with_assets(config: PipelineConfig, assets: Arc<dyn AssetStore>) -> Self {
        let limiter = RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window);
        Self {
            config: Arc::new(config),
            limiter,
            assets,
        }
    }
}
