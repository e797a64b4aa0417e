//! SVG to PNG rasterization.

use std::sync::Arc;

use resvg::tiny_skia;
use resvg::usvg;

use crate::error::PipelineError;

/// Default output density in dots per inch. SVG user units are 96 dpi.
pub const DEFAULT_DENSITY: f32 = 150.0;

/// Largest output accepted, in pixels.
pub const MAX_OUTPUT_PIXELS: u64 = 10_000_000;

const SVG_DPI: f32 = 96.0;

/// Turns a complete SVG document into PNG bytes.
///
/// Implementations are CPU bound and are called from the blocking pool.
pub trait Rasterizer: Send + Sync {
    fn render(&self, svg: &str) -> Result<Vec<u8>, PipelineError>;
}

/// [`Rasterizer`] backed by `resvg`.
pub struct ResvgRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
    scale: f32,
    max_pixels: u64,
}

impl ResvgRasterizer {
    /// Rasterizer at `density` dpi with the system fonts loaded.
    pub fn new(density: f32) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        tracing::debug!(faces = fontdb.len(), "Loaded system fonts");
        Self::with_fonts(Arc::new(fontdb), density)
    }

    pub fn with_fonts(fontdb: Arc<usvg::fontdb::Database>, density: f32) -> Self {
        Self {
            fontdb,
            scale: density / SVG_DPI,
            max_pixels: MAX_OUTPUT_PIXELS,
        }
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_DENSITY)
    }
}

impl Rasterizer for ResvgRasterizer {
    fn render(&self, svg: &str) -> Result<Vec<u8>, PipelineError> {
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(svg, &options).map_err(|e| PipelineError::Svg(e.to_string()))?;

        let size = tree.size();
        let width = (size.width() * self.scale).ceil() as u32;
        let height = (size.height() * self.scale).ceil() as u32;
        if u64::from(width) * u64::from(height) > self.max_pixels {
            return Err(PipelineError::TooLarge {
                width,
                height,
                limit: self.max_pixels,
            });
        }

        let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
            PipelineError::Raster(format!("cannot allocate a {width}x{height} pixmap"))
        })?;
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(self.scale, self.scale),
            &mut pixmap.as_mut(),
        );

        pixmap
            .encode_png()
            .map_err(|e| PipelineError::Raster(e.to_string()))
    }
}
