//! Trade ad card render pipeline.
//!
//! Turns a parsed [`TradeAd`](tradecard_core::types::TradeAd) into PNG
//! bytes:
//!
//! 1. [`catalog`]: item reference table, loaded once per process.
//! 2. [`icons`]: item and tag icons through the artifact cache.
//! 3. [`card`]: totals and the two fixed four-slot rows.
//! 4. [`template`]: SVG placeholder substitution.
//! 5. [`raster`]: SVG to PNG.
//!
//! [`pipeline::RenderPipeline`] wires the steps together.

pub mod card;
pub mod catalog;
pub mod error;
pub mod icons;
pub mod pipeline;
pub mod raster;
pub mod template;
