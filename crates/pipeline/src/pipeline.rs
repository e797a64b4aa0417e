//! Render orchestration for one trade ad.
//!
//! Reference data and icons are resolved first and folded into a
//! [`CardLayout`]; the filled template is then rasterized on the blocking
//! pool so the runtime stays responsive during a render.

use std::sync::Arc;
use std::time::Instant;

use tradecard_core::types::TradeAd;

use crate::card::CardLayout;
use crate::catalog::CatalogCell;
use crate::error::PipelineError;
use crate::icons::IconResolver;
use crate::raster::Rasterizer;
use crate::template::render_svg;

/// Output of one render job.
#[derive(Debug, Clone)]
pub struct RenderedCard {
    pub png: Vec<u8>,
    pub layout: CardLayout,
}

/// Trade ad in, PNG out.
pub struct RenderPipeline {
    catalog: CatalogCell,
    icons: IconResolver,
    template: Arc<str>,
    rasterizer: Arc<dyn Rasterizer>,
}

impl RenderPipeline {
    pub fn new(
        catalog: CatalogCell,
        icons: IconResolver,
        template: impl Into<Arc<str>>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        Self {
            catalog,
            icons,
            template: template.into(),
            rasterizer,
        }
    }

    /// Resolve reference data and icons into the card layout.
    pub async fn compose(&self, ad: &TradeAd) -> CardLayout {
        let started = Instant::now();
        let catalog = self.catalog.get().await;
        let catalog_ms = started.elapsed().as_millis() as u64;

        let item_ids = ad.distinct_item_ids();
        let tag_ids = ad.distinct_tag_ids();

        let started = Instant::now();
        let item_icons = self.icons.item_icons(&item_ids).await;
        let tag_icons = self.icons.tag_icons(&tag_ids).await;
        tracing::debug!(
            catalog_ms,
            icons_ms = started.elapsed().as_millis() as u64,
            items = item_ids.len(),
            item_icons = item_icons.len(),
            tags = tag_ids.len(),
            tag_icons = tag_icons.len(),
            "Resolved card inputs"
        );

        CardLayout::build(ad, &catalog, &item_icons, &tag_icons)
    }

    /// Run the whole pipeline for one ad.
    ///
    /// Only SVG and rasterization problems fail the job; missing icons or
    /// reference data degrade the card instead.
    pub async fn render(&self, ad: &TradeAd) -> Result<RenderedCard, PipelineError> {
        let layout = self.compose(ad).await;
        let svg = render_svg(&self.template, &layout);
        tracing::trace!(svg = %svg, "Composed card SVG");

        let started = Instant::now();
        let rasterizer = Arc::clone(&self.rasterizer);
        let png = tokio::task::spawn_blocking(move || rasterizer.render(&svg))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;
        tracing::debug!(
            render_ms = started.elapsed().as_millis() as u64,
            bytes = png.len(),
            "Rasterized card"
        );

        Ok(RenderedCard { png, layout })
    }
}
