//! Batch item thumbnail lookup.
//!
//! Resolves item ids to hosted 420x420 PNG thumbnail URLs with one request
//! per batch of up to [`MAX_BATCH`] ids.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tradecard_core::sources::{SourceError, ThumbnailSource};
use tradecard_core::types::ItemId;

use crate::http::get_json;

/// Default thumbnail endpoint.
pub const DEFAULT_THUMBNAIL_URL: &str = "https://thumbnails.roblox.com/v1/assets";

/// Requested thumbnail size.
pub const THUMBNAIL_SIZE: &str = "420x420";

/// Upper bound on ids per request accepted by the thumbnail API.
pub const MAX_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
struct ThumbnailBatch {
    #[serde(default)]
    data: Vec<ThumbnailEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailEntry {
    #[serde(default)]
    target_id: Option<ItemId>,
    #[serde(default)]
    image_url: Option<String>,
}

/// Build the batch request URL for `ids`.
pub fn batch_url(base_url: &str, ids: &[ItemId]) -> String {
    let joined = ids
        .iter()
        .map(ItemId::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("{base_url}?assetIds={joined}&size={THUMBNAIL_SIZE}&format=Png&isCircular=false")
}

/// HTTP client for the thumbnail API.
#[derive(Debug, Clone)]
pub struct ThumbnailClient {
    client: reqwest::Client,
    base_url: String,
}

impl ThumbnailClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_THUMBNAIL_URL.to_string())
    }

    pub fn with_base_url(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl ThumbnailSource for ThumbnailClient {
    async fn thumbnail_urls(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, String>, SourceError> {
        let mut urls = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_BATCH) {
            let batch: ThumbnailBatch = get_json(&self.client, &batch_url(&self.base_url, chunk)).await?;
            collect_into(batch, &mut urls);
        }
        Ok(urls)
    }
}

/// Entries missing either the id or the URL (e.g. still pending) are skipped.
fn collect_into(batch: ThumbnailBatch, urls: &mut HashMap<ItemId, String>) {
    for entry in batch.data {
        if let (Some(id), Some(url)) = (entry.target_id, entry.image_url) {
            if !url.is_empty() {
                urls.insert(id, url);
            }
        }
    }
}
