//! Trade ad payloads and item reference data.
//!
//! A trade ad arrives on the wire as a positional JSON array:
//!
//! ```text
//! [adId, createdAt, userId, username, {items:[..]}, {items:[..], tags:[..]}]
//! ```
//!
//! [`TradeAd::from_value`] turns that array into a typed record. The
//! metadata slots are read leniently; the two trade sides are strict because
//! they drive everything the card shows.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Catalog asset id of a limited item.
pub type ItemId = u64;

/// Numeric trade tag id (see [`crate::tags`]).
pub type TagId = u32;

/// Reference table keyed by item id.
pub type ItemCatalog = HashMap<ItemId, ItemRecord>;

/// Index of the offer side within the positional payload.
const OFFER_INDEX: usize = 4;

/// Index of the request side within the positional payload.
const REQUEST_INDEX: usize = 5;

/// One side of a trade ad.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TradeSide {
    pub items: Vec<ItemId>,
    pub tags: Vec<TagId>,
    pub robux: Option<u64>,
}

/// Wire form of a side. `null` arrays are treated the same as missing ones.
#[derive(Debug, Deserialize)]
struct RawSide {
    #[serde(default)]
    items: Option<Vec<ItemId>>,
    #[serde(default)]
    tags: Option<Vec<TagId>>,
    #[serde(default)]
    robux: Option<u64>,
}

impl From<RawSide> for TradeSide {
    fn from(raw: RawSide) -> Self {
        Self {
            items: raw.items.unwrap_or_default(),
            tags: raw.tags.unwrap_or_default(),
            robux: raw.robux,
        }
    }
}

/// A parsed trade ad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeAd {
    pub ad_id: Option<u64>,
    pub created_at: Option<i64>,
    pub user_id: Option<u64>,
    pub username: Option<String>,
    pub offer: TradeSide,
    pub request: TradeSide,
}

impl TradeAd {
    /// Parse the positional wire payload.
    ///
    /// Fails with [`CoreError::Validation`] when the value is not an array
    /// of at least six elements or either trade side is malformed.
    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        let fields = value
            .as_array()
            .ok_or_else(|| CoreError::Validation("tradeData must be an array".into()))?;

        if fields.len() <= REQUEST_INDEX {
            return Err(CoreError::Validation(format!(
                "tradeData must have at least {} elements, got {}",
                REQUEST_INDEX + 1,
                fields.len()
            )));
        }

        Ok(Self {
            ad_id: fields[0].as_u64(),
            created_at: fields[1].as_i64(),
            user_id: fields[2].as_u64(),
            username: fields[3].as_str().map(str::to_owned),
            offer: parse_side(&fields[OFFER_INDEX], "offer")?,
            request: parse_side(&fields[REQUEST_INDEX], "request")?,
        })
    }

    /// Distinct item ids across offer then request, in first-seen order.
    pub fn distinct_item_ids(&self) -> Vec<ItemId> {
        let mut seen = Vec::new();
        for id in self.offer.items.iter().chain(&self.request.items) {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        seen
    }

    /// Distinct tag ids of the request side, in first-seen order.
    pub fn distinct_tag_ids(&self) -> Vec<TagId> {
        let mut seen = Vec::new();
        for id in &self.request.tags {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        seen
    }
}

fn parse_side(value: &Value, name: &str) -> Result<TradeSide, CoreError> {
    if !value.is_object() {
        return Err(CoreError::Validation(format!(
            "{name} side must be an object"
        )));
    }
    RawSide::deserialize(value)
        .map(TradeSide::from)
        .map_err(|e| CoreError::Validation(format!("{name} side is malformed: {e}")))
}

/// Reference data for a single item.
///
/// Every numeric field is optional: many items have no explicit value and
/// are priced by their recent average price (RAP) alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub acronym: Option<String>,
    #[serde(default)]
    pub rap: Option<i64>,
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub default_value: Option<i64>,
    #[serde(default)]
    pub demand: Option<i64>,
    #[serde(default)]
    pub trend: Option<i64>,
    #[serde(default)]
    pub projected: Option<i64>,
    #[serde(default)]
    pub hyped: Option<i64>,
    #[serde(default)]
    pub rare: Option<i64>,
}

impl ItemRecord {
    /// Value used for totals: the explicit value, else RAP, else zero.
    pub fn effective_value(&self) -> i64 {
        self.value.or(self.rap).unwrap_or(0)
    }

    /// RAP used for totals; zero when unknown.
    pub fn effective_rap(&self) -> i64 {
        self.rap.unwrap_or(0)
    }
}
