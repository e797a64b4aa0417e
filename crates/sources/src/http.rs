//! Shared `reqwest` plumbing for every upstream client.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tradecard_core::sources::SourceError;

/// Default timeout applied to every outbound request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Some upstreams reject requests without a browser-like user agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Build the pooled client shared by all upstream clients.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(request_error)
}

/// Classify a `reqwest` error into a [`SourceError`].
pub(crate) fn request_error(err: reqwest::Error) -> SourceError {
    if err.is_decode() {
        SourceError::Decode(err.to_string())
    } else {
        SourceError::Request(err.to_string())
    }
}

/// Ensure the response has a success status code, returning it unchanged.
pub(crate) fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

/// `GET` a URL and decode its JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, SourceError> {
    let response = client.get(url).send().await.map_err(request_error)?;
    let response = ensure_success(response)?;
    response.json::<T>().await.map_err(request_error)
}
