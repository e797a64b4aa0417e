//! Plain image download.

use async_trait::async_trait;
use tradecard_core::sources::{ImageFetcher, SourceError};

use crate::http::{ensure_success, request_error};

/// Downloads image bytes over HTTP. Non-2xx responses are errors.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let response = self.client.get(url).send().await.map_err(request_error)?;
        let response = ensure_success(response)?;
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }
}
