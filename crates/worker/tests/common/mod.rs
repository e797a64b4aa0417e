#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tradecard_core::cache::{ArtifactCache, CacheLimits};
use tradecard_core::memory::MemoryProbe;
use tradecard_core::queue::ExecutionQueue;
use tradecard_core::sources::{
    ImageFetcher, ItemCatalogSource, SourceError, ThumbnailSource, TradeAdSource,
};
use tradecard_core::types::{ItemCatalog, ItemId, ItemRecord};
use tradecard_pipeline::catalog::CatalogCell;
use tradecard_pipeline::error::PipelineError;
use tradecard_pipeline::icons::IconResolver;
use tradecard_pipeline::pipeline::RenderPipeline;
use tradecard_pipeline::raster::{Rasterizer, ResvgRasterizer, DEFAULT_DENSITY};
use tradecard_pipeline::template::DEFAULT_TEMPLATE;
use tradecard_worker::config::WorkerConfig;
use tradecard_worker::monitor::ResourceMonitor;
use tradecard_worker::restart::{RestartScheduler, Terminator};
use tradecard_worker::router::build_app_router;
use tradecard_worker::state::AppState;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Replays scripted memory readings, then repeats the last one.
pub struct ScriptedProbe {
    readings: Mutex<VecDeque<u64>>,
    last: AtomicU64,
}

impl ScriptedProbe {
    pub fn new(readings: &[u64]) -> Self {
        Self {
            readings: Mutex::new(readings.iter().copied().collect()),
            last: AtomicU64::new(readings.last().copied().unwrap_or(0)),
        }
    }
}

impl MemoryProbe for ScriptedProbe {
    fn current_mb(&self) -> u64 {
        self.readings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub struct RecordingTerminator {
    pub codes: Mutex<Vec<i32>>,
}

impl RecordingTerminator {
    pub fn count(&self) -> usize {
        self.codes.lock().unwrap().len()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, exit_code: i32) {
        self.codes.lock().unwrap().push(exit_code);
    }
}

pub struct FakeCatalog;

#[async_trait]
impl ItemCatalogSource for FakeCatalog {
    async fn load_catalog(&self) -> Result<ItemCatalog, SourceError> {
        let mut catalog = ItemCatalog::new();
        catalog.insert(
            1,
            ItemRecord {
                value: Some(12_000),
                rap: Some(9_000),
                ..Default::default()
            },
        );
        catalog.insert(
            2,
            ItemRecord {
                rap: Some(3_500),
                ..Default::default()
            },
        );
        catalog.insert(
            3,
            ItemRecord {
                value: Some(20_000),
                rap: Some(18_000),
                ..Default::default()
            },
        );
        Ok(catalog)
    }
}

pub struct FakeThumbnails;

#[async_trait]
impl ThumbnailSource for FakeThumbnails {
    async fn thumbnail_urls(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, String>, SourceError> {
        Ok(ids
            .iter()
            .map(|id| (*id, format!("https://thumbs.test/{id}.png")))
            .collect())
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(tiny_png())
    }
}

pub struct FakeTradeAds;

#[async_trait]
impl TradeAdSource for FakeTradeAds {
    async fn recent_ads(&self, limit: u32) -> Result<Vec<Value>, SourceError> {
        if limit == 0 {
            return Err(SourceError::UnrecognizedShape("no ads array among keys []".into()));
        }
        Ok((0..limit.min(3))
            .map(|i| serde_json::json!([i, 0, 1, "u", { "items": [1] }, { "tags": [1] }]))
            .collect())
    }
}

/// Sleeps before delegating, to keep a job in flight.
pub struct SlowRasterizer {
    pub delay: Duration,
    pub inner: Arc<dyn Rasterizer>,
}

impl Rasterizer for SlowRasterizer {
    fn render(&self, svg: &str) -> Result<Vec<u8>, PipelineError> {
        std::thread::sleep(self.delay);
        self.inner.render(svg)
    }
}

pub struct FailingRasterizer;

impl Rasterizer for FailingRasterizer {
    fn render(&self, _svg: &str) -> Result<Vec<u8>, PipelineError> {
        Err(PipelineError::Raster("pixmap allocation failed".into()))
    }
}

pub fn tiny_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 40, 40, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

/// Shape-only rasterizer; no system fonts are needed in tests.
pub fn test_rasterizer() -> Arc<dyn Rasterizer> {
    Arc::new(ResvgRasterizer::with_fonts(Arc::new(Default::default()), DEFAULT_DENSITY))
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Knobs for [`TestApp::build`].
pub struct TestOptions {
    pub readings: Vec<u64>,
    pub max_jobs: usize,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub restart_grace: Duration,
    pub cors_origins: Vec<String>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            readings: vec![100],
            max_jobs: 1,
            rasterizer: test_rasterizer(),
            restart_grace: Duration::from_millis(100),
            cors_origins: vec!["*".to_string()],
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub terminator: Arc<RecordingTerminator>,
    pub fetcher: Arc<FakeFetcher>,
    _cache_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(TestOptions::default())
    }

    /// Build the full application router on in-memory collaborators.
    pub fn build(options: TestOptions) -> Self {
        let cache_dir = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: options.cors_origins,
            ram_limit_mb: 400,
            max_jobs: options.max_jobs,
            image_cache_dir: cache_dir.path().to_path_buf(),
            restart_grace_ms: options.restart_grace.as_millis() as u64,
            ..Default::default()
        };

        let cache = Arc::new(ArtifactCache::open(cache_dir.path(), CacheLimits::default()).unwrap());
        let fetcher = Arc::new(FakeFetcher::default());
        let icons = IconResolver::new(cache, Arc::new(FakeThumbnails), fetcher.clone());
        let pipeline = RenderPipeline::new(
            CatalogCell::new(Arc::new(FakeCatalog)),
            icons,
            DEFAULT_TEMPLATE,
            options.rasterizer,
        );

        let terminator = Arc::new(RecordingTerminator::default());
        let restart = Arc::new(RestartScheduler::new(config.restart_grace(), terminator.clone()));
        let monitor = ResourceMonitor::new(
            Arc::new(ScriptedProbe::new(&options.readings)),
            restart,
            config.ram_limit_mb,
            config.max_jobs,
        )
        .with_sample_interval(Duration::from_millis(5));

        let state = AppState {
            queue: Arc::new(ExecutionQueue::new(config.queue_concurrency)),
            monitor: Arc::new(monitor),
            pipeline: Arc::new(pipeline),
            trade_ads: Arc::new(FakeTradeAds),
            config: Arc::new(config),
        };

        Self {
            router: build_app_router(state.clone()).unwrap(),
            state,
            terminator,
            fetcher,
            _cache_dir: cache_dir,
        }
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// `[adId, createdAt, userId, username, offer, request]` with two offered
/// items and one tag plus one item requested.
pub fn sample_trade_data() -> Value {
    serde_json::json!([
        9001,
        1_700_000_000,
        42,
        "trader",
        { "items": [1, 2] },
        { "items": [3], "tags": [1] }
    ])
}
