//! Item reference data.
//!
//! [`RolimonsCatalog`] downloads the full item table; [`CachedCatalog`]
//! wraps any remote source with a local JSON file that is read first and
//! rewritten after every successful remote load.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tradecard_core::sources::{ItemCatalogSource, SourceError};
use tradecard_core::types::{ItemCatalog, ItemId, ItemRecord};

use crate::http::get_json;

/// Default item details endpoint.
pub const DEFAULT_ITEM_DETAILS_URL: &str = "https://api.rolimons.com/items/v1/itemdetails";

/// Default location of the local catalog file.
pub const DEFAULT_ITEMS_CACHE_PATH: &str = "./items.json";

/// Item details response: `items` maps id -> positional row
/// `[name, acronym, rap, value, default_value, demand, trend, projected, hyped, rare]`.
#[derive(Debug, Deserialize)]
struct ItemDetailsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    items: HashMap<String, Vec<Value>>,
}

/// Convert one positional row into an [`ItemRecord`].
pub fn record_from_row(id: ItemId, row: &[Value]) -> ItemRecord {
    let text = |i: usize| row.get(i).and_then(Value::as_str).map(str::to_owned);
    let int = |i: usize| row.get(i).and_then(Value::as_i64);

    ItemRecord {
        id: Some(id),
        name: text(0),
        acronym: text(1),
        rap: int(2),
        value: int(3),
        default_value: int(4),
        demand: int(5),
        trend: int(6),
        projected: int(7),
        hyped: int(8),
        rare: int(9),
    }
}

fn catalog_from_response(response: ItemDetailsResponse) -> Result<ItemCatalog, SourceError> {
    if !response.success {
        return Err(SourceError::Rejected(
            "item details response has success=false".into(),
        ));
    }

    let mut catalog = ItemCatalog::with_capacity(response.items.len());
    for (key, row) in response.items {
        match key.parse::<ItemId>() {
            Ok(id) => {
                catalog.insert(id, record_from_row(id, &row));
            }
            Err(_) => tracing::warn!(key = %key, "Skipping item with non-numeric id"),
        }
    }
    Ok(catalog)
}

/// Remote item table from the public item details API.
#[derive(Debug, Clone)]
pub struct RolimonsCatalog {
    client: reqwest::Client,
    url: String,
}

impl RolimonsCatalog {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, DEFAULT_ITEM_DETAILS_URL.to_string())
    }

    pub fn with_url(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl ItemCatalogSource for RolimonsCatalog {
    async fn load_catalog(&self) -> Result<ItemCatalog, SourceError> {
        let response: ItemDetailsResponse = get_json(&self.client, &self.url).await?;
        catalog_from_response(response)
    }
}

/// Local JSON file in front of a remote catalog source.
pub struct CachedCatalog<S> {
    path: PathBuf,
    remote: S,
}

impl<S: ItemCatalogSource> CachedCatalog<S> {
    pub fn new(path: impl Into<PathBuf>, remote: S) -> Self {
        Self {
            path: path.into(),
            remote,
        }
    }

    async fn read_file(&self) -> Option<ItemCatalog> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read items cache file");
                return None;
            }
        };

        match serde_json::from_slice::<ItemCatalog>(&contents) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to parse items cache file");
                None
            }
        }
    }

    async fn write_file(&self, catalog: &ItemCatalog) {
        let result = match serde_json::to_vec(catalog) {
            Ok(bytes) => tokio::fs::write(&self.path, bytes).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist items cache file");
        }
    }
}

#[async_trait]
impl<S: ItemCatalogSource> ItemCatalogSource for CachedCatalog<S> {
    async fn load_catalog(&self) -> Result<ItemCatalog, SourceError> {
        if let Some(catalog) = self.read_file().await {
            tracing::info!(path = %self.path.display(), items = catalog.len(), "Loaded items from cache file");
            return Ok(catalog);
        }

        let catalog = self.remote.load_catalog().await?;
        tracing::info!(items = catalog.len(), "Fetched items from remote API");
        self.write_file(&catalog).await;
        Ok(catalog)
    }
}
