use std::sync::Arc;

use crate::app::error::Result;
use crate::cache::ArticleCache;
use crate::config::Config;
use crate::sync::{RefreshOutcome, SyncEngine};
use crate::transport::{FeedEndpoint, HttpTransport, Transport};

/// Everything a UI shell needs, wired from one [`Config`].
pub struct SyncContext {
    pub config: Config,
    pub cache: Arc<ArticleCache>,
    pub engine: SyncEngine,
}

impl SyncContext {
    /// Load the config file and build an engine talking HTTP.
    pub fn from_default_config() -> Result<Self> {
        Self::new(Config::load()?)
    }

    pub fn new(config: Config) -> Result<Self> {
        let transport: Arc<dyn Transport + Send + Sync> =
            Arc::new(HttpTransport::new(&config.transport)?);
        Self::with_transport(config, transport)
    }

    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport + Send + Sync>,
    ) -> Result<Self> {
        let endpoint = FeedEndpoint::new(&config.endpoint)?;
        let cache = Arc::new(ArticleCache::new());
        let engine = SyncEngine::new(transport, endpoint, cache.clone(), &config.sync);

        Ok(Self {
            config,
            cache,
            engine,
        })
    }

    /// Refresh every configured section, as the combined "all" tab does on
    /// first display.
    pub async fn refresh_all(&self) -> Vec<(String, RefreshOutcome)> {
        self.engine.refresh_many(&self.config.section_tags()).await
    }
}
