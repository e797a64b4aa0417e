use std::sync::Arc;

use tradecard_core::cache::ArtifactCache;
use tradecard_core::memory::ProcessMemory;
use tradecard_core::queue::ExecutionQueue;
use tradecard_core::sources::TradeAdSource;
use tradecard_pipeline::catalog::CatalogCell;
use tradecard_pipeline::icons::IconResolver;
use tradecard_pipeline::pipeline::RenderPipeline;
use tradecard_pipeline::raster::ResvgRasterizer;
use tradecard_pipeline::template::load_template;
use tradecard_sources::http::build_client;
use tradecard_sources::images::HttpImageFetcher;
use tradecard_sources::items::{CachedCatalog, RolimonsCatalog};
use tradecard_sources::thumbnails::ThumbnailClient;
use tradecard_sources::trade_ads::TradeAdsClient;

use crate::config::WorkerConfig;
use crate::error::StartupError;
use crate::monitor::ResourceMonitor;
use crate::restart::{ProcessTerminator, RestartScheduler};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WorkerConfig>,
    /// Admission, in-flight sampling and restart policy.
    pub monitor: Arc<ResourceMonitor>,
    /// Serializes pipeline runs.
    pub queue: Arc<ExecutionQueue>,
    pub pipeline: Arc<RenderPipeline>,
    /// Recent trade ads feed.
    pub trade_ads: Arc<dyn TradeAdSource>,
}

impl AppState {
    /// Wire the production collaborators described by `config`.
    pub fn from_config(config: WorkerConfig) -> Result<Self, StartupError> {
        let client = build_client(config.http_timeout())?;

        let cache = Arc::new(ArtifactCache::open(&config.image_cache_dir, config.cache_limits())?);
        let stats = cache.stats();
        tracing::info!(
            dir = %config.image_cache_dir.display(),
            files = stats.files,
            bytes = stats.bytes,
            "Image cache opened"
        );

        let catalog = CatalogCell::new(Arc::new(CachedCatalog::new(
            &config.items_cache_path,
            RolimonsCatalog::new(client.clone()),
        )));
        let icons = IconResolver::new(
            cache,
            Arc::new(ThumbnailClient::new(client.clone())),
            Arc::new(HttpImageFetcher::new(client.clone())),
        );
        let template = load_template(config.template_path.as_deref())?;
        let rasterizer = Arc::new(ResvgRasterizer::new(config.render_density));
        let pipeline = RenderPipeline::new(catalog, icons, template, rasterizer);

        let restart = Arc::new(RestartScheduler::new(
            config.restart_grace(),
            Arc::new(ProcessTerminator),
        ));
        let monitor = ResourceMonitor::new(
            Arc::new(ProcessMemory),
            restart,
            config.ram_limit_mb,
            config.max_jobs,
        );

        Ok(Self {
            queue: Arc::new(ExecutionQueue::new(config.queue_concurrency)),
            monitor: Arc::new(monitor),
            pipeline: Arc::new(pipeline),
            trade_ads: Arc::new(TradeAdsClient::new(client)),
            config: Arc::new(config),
        })
    }
}
