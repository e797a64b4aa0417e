//! HTTP and file-backed implementations of the collaborator traits defined
//! in [`tradecard_core::sources`].
//!
//! - [`trade_ads`]: recent trade ads feed with envelope normalization.
//! - [`thumbnails`]: batch item thumbnail lookup.
//! - [`items`]: item reference data, cached in a local JSON file.
//! - [`images`]: plain image download.

pub mod http;
pub mod images;
pub mod items;
pub mod thumbnails;
pub mod trade_ads;
