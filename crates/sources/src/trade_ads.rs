//! Recent trade ads feed.
//!
//! The feed has answered with several envelope shapes over time. Rather than
//! probing them ad hoc, [`normalize_ads_envelope`] tries the known shapes in
//! a fixed priority order and fails with
//! [`SourceError::UnrecognizedShape`] when none match:
//!
//! 1. `{ "trade_ads": [...] }`
//! 2. `{ "ads": [...] }`
//! 3. `[...]`
//! 4. `{ "data": [...] }`
//! 5. the first array-valued property of an object (in key order)

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tradecard_core::sources::{SourceError, TradeAdSource};

use crate::http::get_json;

/// Default recent-ads endpoint.
pub const DEFAULT_TRADE_ADS_URL: &str = "https://api.rolimons.com/tradeads/v1/getrecentads";

/// Ads change quickly; responses are reused for this long per `limit`.
const MEMO_TTL: Duration = Duration::from_secs(1);

/// Envelope keys tried before falling back to a bare array.
const PRIMARY_KEYS: &[&str] = &["trade_ads", "ads"];

/// Envelope keys tried after a bare array.
const SECONDARY_KEYS: &[&str] = &["data"];

/// Extract the ads array from any known response envelope.
pub fn normalize_ads_envelope(body: Value) -> Result<Vec<Value>, SourceError> {
    let mut object = match body {
        Value::Array(ads) => return Ok(ads),
        Value::Object(object) => object,
        other => {
            return Err(SourceError::UnrecognizedShape(format!(
                "expected an object or array, got {}",
                json_kind(&other)
            )))
        }
    };

    for key in PRIMARY_KEYS.iter().chain(SECONDARY_KEYS) {
        if let Some(Value::Array(ads)) = object.remove(*key) {
            return Ok(ads);
        }
    }

    let keys: Vec<String> = object.keys().cloned().collect();
    object
        .into_iter()
        .find_map(|(_, value)| match value {
            Value::Array(ads) => Some(ads),
            _ => None,
        })
        .ok_or_else(|| {
            SourceError::UnrecognizedShape(format!("no ads array among keys {keys:?}"))
        })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Recently fetched responses, keyed by `limit`.
///
/// Expired entries are dropped on every insert, so the map never holds more
/// than the keys fetched within the last [`MEMO_TTL`].
#[derive(Default)]
struct AdsMemo {
    entries: HashMap<u32, (Instant, Vec<Value>)>,
}

impl AdsMemo {
    fn get(&self, limit: u32, now: Instant) -> Option<Vec<Value>> {
        self.entries
            .get(&limit)
            .filter(|(fetched_at, _)| now.duration_since(*fetched_at) < MEMO_TTL)
            .map(|(_, ads)| ads.clone())
    }

    fn insert(&mut self, limit: u32, ads: Vec<Value>, now: Instant) {
        self.entries
            .retain(|_, (fetched_at, _)| now.duration_since(*fetched_at) < MEMO_TTL);
        self.entries.insert(limit, (now, ads));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// HTTP client for the recent trade ads feed.
pub struct TradeAdsClient {
    client: reqwest::Client,
    base_url: String,
    memo: Mutex<AdsMemo>,
}

impl TradeAdsClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_TRADE_ADS_URL.to_string())
    }

    pub fn with_base_url(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url,
            memo: Mutex::new(AdsMemo::default()),
        }
    }

    fn memo(&self) -> std::sync::MutexGuard<'_, AdsMemo> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TradeAdSource for TradeAdsClient {
    async fn recent_ads(&self, limit: u32) -> Result<Vec<Value>, SourceError> {
        if let Some(ads) = self.memo().get(limit, Instant::now()) {
            return Ok(ads);
        }

        let url = format!("{}?limit={limit}", self.base_url);
        let body: Value = get_json(&self.client, &url).await.inspect_err(|e| {
            tracing::error!(error = %e, "Error fetching recent trade ads");
        })?;

        let ads = normalize_ads_envelope(body).inspect_err(|e| {
            tracing::error!(error = %e, "Invalid response from recent ads API");
        })?;

        tracing::debug!(count = ads.len(), limit, "Fetched recent trade ads");
        self.memo().insert(limit, ads.clone(), Instant::now());

        Ok(ads)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ad(id: u64) -> Value {
        json!([id, 1_700_000_000, 1, "u", { "items": [1] }, { "tags": [1] }])
    }

    #[test]
    fn trade_ads_key_wins() {
        let body = json!({ "success": true, "trade_ads": [ad(1)], "ads": [ad(2)] });
        assert_eq!(normalize_ads_envelope(body).unwrap(), vec![ad(1)]);
    }

    #[test]
    fn ads_key_is_second() {
        let body = json!({ "ads": [ad(2)], "data": [ad(3)] });
        assert_eq!(normalize_ads_envelope(body).unwrap(), vec![ad(2)]);
    }

    #[test]
    fn bare_array_is_accepted() {
        assert_eq!(normalize_ads_envelope(json!([ad(4)])).unwrap(), vec![ad(4)]);
    }

    #[test]
    fn data_key_beats_other_arrays() {
        let body = json!({ "data": [ad(5)], "aaa": [ad(6)] });
        assert_eq!(normalize_ads_envelope(body).unwrap(), vec![ad(5)]);
    }

    #[test]
    fn falls_back_to_first_array_property() {
        let body = json!({ "success": true, "recent": [ad(7)] });
        assert_eq!(normalize_ads_envelope(body).unwrap(), vec![ad(7)]);
    }

    #[test]
    fn non_array_primary_key_is_skipped() {
        let body = json!({ "ads": { "nested": true }, "list": [ad(8)] });
        assert_eq!(normalize_ads_envelope(body).unwrap(), vec![ad(8)]);
    }

    #[test]
    fn object_without_arrays_fails_loudly() {
        let body = json!({ "success": false, "message": "rate limited" });
        let err = normalize_ads_envelope(body).unwrap_err();
        assert!(matches!(err, SourceError::UnrecognizedShape(_)));
        assert!(err.to_string().contains("message"));
    }

    #[test]
    fn memo_serves_fresh_entries_only() {
        let start = Instant::now();
        let mut memo = AdsMemo::default();
        memo.insert(10, vec![ad(1)], start);

        assert_eq!(memo.get(10, start + Duration::from_millis(500)), Some(vec![ad(1)]));
        assert_eq!(memo.get(11, start), None);
        assert_eq!(memo.get(10, start + MEMO_TTL), None);
    }

    #[test]
    fn memo_prunes_expired_entries_on_insert() {
        let start = Instant::now();
        let mut memo = AdsMemo::default();
        for limit in 1..=200 {
            memo.insert(limit, vec![ad(u64::from(limit))], start);
        }
        assert_eq!(memo.len(), 200);

        let later = start + MEMO_TTL + Duration::from_millis(100);
        memo.insert(500, vec![ad(500)], later);

        assert_eq!(memo.len(), 1);
        assert_eq!(memo.get(500, later), Some(vec![ad(500)]));
        assert_eq!(memo.get(1, later), None);
    }

    #[test]
    fn scalar_body_fails_loudly() {
        let err = normalize_ads_envelope(json!("oops")).unwrap_err();
        assert!(err.to_string().contains("string"));
    }
}
