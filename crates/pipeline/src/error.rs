use std::path::PathBuf;

/// Failures that abort a render job.
///
/// Icon and reference-data problems never show up here: they degrade the
/// card instead of failing it.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to parse SVG: {0}")]
    Svg(String),

    #[error("Output {width}x{height} exceeds the {limit} pixel limit")]
    TooLarge { width: u32, height: u32, limit: u64 },

    #[error("Rasterization failed: {0}")]
    Raster(String),

    /// The blocking render task panicked or was cancelled.
    #[error("Render task failed: {0}")]
    Task(String),

    #[error("Failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },
}
