//! Icon resolution through the artifact cache.
//!
//! Every icon goes through the same path: cache lookup by source URL, and on
//! a miss download, normalize to PNG and store. A failure at any step only
//! costs that one slot its icon.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use image::ImageFormat;
use tradecard_core::cache::ArtifactCache;
use tradecard_core::sources::{ImageFetcher, ThumbnailSource};
use tradecard_core::tags::tag_info;
use tradecard_core::types::{ItemId, TagId};

/// Normalized PNG bytes of one icon.
pub type Icon = Arc<[u8]>;

/// Resolved icons keyed by item or tag id. Missing keys mean "no icon".
pub type IconMap<K> = HashMap<K, Icon>;

/// Decode any supported raster format and re-encode it as PNG.
pub fn normalize_png(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let mut png = Vec::new();
    decoded.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// Resolves item and tag ids to icons.
pub struct IconResolver {
    cache: Arc<ArtifactCache>,
    thumbnails: Arc<dyn ThumbnailSource>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl IconResolver {
    pub fn new(
        cache: Arc<ArtifactCache>,
        thumbnails: Arc<dyn ThumbnailSource>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            cache,
            thumbnails,
            fetcher,
        }
    }

    /// Icons for `ids`, resolved through one batch thumbnail lookup.
    pub async fn item_icons(&self, ids: &[ItemId]) -> IconMap<ItemId> {
        let mut icons = IconMap::new();
        if ids.is_empty() {
            return icons;
        }

        let urls = match self.thumbnails.thumbnail_urls(ids).await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!(error = %e, count = ids.len(), "Failed to fetch item thumbnails");
                return icons;
            }
        };

        for id in ids {
            let Some(url) = urls.get(id) else {
                tracing::debug!(item_id = id, "No thumbnail for item");
                continue;
            };
            if let Some(icon) = self.download_icon(url).await {
                icons.insert(*id, icon);
            }
        }
        icons
    }

    /// Icons for tag ids from the static tag table. Unknown tags get none.
    pub async fn tag_icons(&self, ids: &[TagId]) -> IconMap<TagId> {
        let mut icons = IconMap::new();
        for id in ids {
            let Some(url) = tag_info(*id).image_url else {
                continue;
            };
            if let Some(icon) = self.download_icon(url).await {
                icons.insert(*id, icon);
            }
        }
        icons
    }

    /// Cached bytes for `url`, downloading and caching them on a miss.
    pub async fn download_icon(&self, url: &str) -> Option<Icon> {
        if url.is_empty() {
            return None;
        }

        let cache = Arc::clone(&self.cache);
        let key = url.to_owned();
        match tokio::task::spawn_blocking(move || cache.get(&key)).await {
            Ok(Some(bytes)) => return Some(bytes.into()),
            Ok(None) => {}
            Err(e) => tracing::warn!(url, error = %e, "Cache lookup task failed"),
        }

        let raw = match self.fetcher.fetch(url).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(url, error = %e, "Failed to download image");
                return None;
            }
        };

        let cache = Arc::clone(&self.cache);
        let key = url.to_owned();
        let stored = tokio::task::spawn_blocking(move || {
            let png = normalize_png(&raw)?;
            if let Err(e) = cache.put(&key, &png) {
                tracing::warn!(url = %key, error = %e, "Failed to write image cache entry");
            }
            Ok::<_, image::ImageError>(png)
        })
        .await;

        match stored {
            Ok(Ok(png)) => Some(png.into()),
            Ok(Err(e)) => {
                tracing::warn!(url, error = %e, "Failed to convert image to PNG");
                None
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Image conversion task failed");
                None
            }
        }
    }
}
