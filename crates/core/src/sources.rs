//! Interfaces to the external collaborators of the render pipeline.
//!
//! Implementations live in `tradecard-sources` (HTTP + local cache file);
//! tests use in-memory fakes. Failures are reported as [`SourceError`] and
//! the pipeline decides whether they degrade a slot or abort a job.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::{ItemCatalog, ItemId};

/// Errors from an external data or image source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The upstream answered with a non-2xx status.
    #[error("Upstream returned {status} for {url}")]
    Status { status: u16, url: String },

    /// The body could not be decoded into the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// None of the known response envelopes matched.
    #[error("Unrecognized response shape: {0}")]
    UnrecognizedShape(String),

    /// The upstream answered but reported failure in its body.
    #[error("Upstream reported failure: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Item reference data (id -> value/RAP/name).
#[async_trait]
pub trait ItemCatalogSource: Send + Sync {
    async fn load_catalog(&self) -> Result<ItemCatalog, SourceError>;
}

/// Batch resolution of item ids to hosted thumbnail URLs.
#[async_trait]
pub trait ThumbnailSource: Send + Sync {
    /// Ids without a usable thumbnail are simply absent from the map.
    async fn thumbnail_urls(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, String>, SourceError>;
}

/// Raw image download.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

/// Recent trade ads feed.
#[async_trait]
pub trait TradeAdSource: Send + Sync {
    /// Up to `limit` raw positional ad records, newest first.
    async fn recent_ads(&self, limit: u32) -> Result<Vec<serde_json::Value>, SourceError>;
}
