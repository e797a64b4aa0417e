//! Process-wide item reference table.
//!
//! The table is loaded lazily on first use. Concurrent callers share the
//! in-flight load instead of starting their own. A failed load is not
//! cached: the caller gets an empty table (every item counts as zero) and
//! the next job retries.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tradecard_core::sources::ItemCatalogSource;
use tradecard_core::types::ItemCatalog;

pub struct CatalogCell {
    source: Arc<dyn ItemCatalogSource>,
    table: OnceCell<Arc<ItemCatalog>>,
}

impl CatalogCell {
    pub fn new(source: Arc<dyn ItemCatalogSource>) -> Self {
        Self {
            source,
            table: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.table.initialized()
    }

    /// The loaded table, loading it first if needed.
    pub async fn get(&self) -> Arc<ItemCatalog> {
        let loaded = self
            .table
            .get_or_try_init(|| async {
                let started = std::time::Instant::now();
                let catalog = self.source.load_catalog().await?;
                tracing::info!(
                    items = catalog.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Item reference table loaded"
                );
                Ok::<_, tradecard_core::sources::SourceError>(Arc::new(catalog))
            })
            .await;

        match loaded {
            Ok(table) => Arc::clone(table),
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch item data, rendering with an empty table");
                Arc::new(ItemCatalog::new())
            }
        }
    }
}
