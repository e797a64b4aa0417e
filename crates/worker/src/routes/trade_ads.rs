use axum::extract::{Query, State};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 100;

/// Largest `limit` forwarded upstream.
pub const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct RecentAdsQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl RecentAdsQuery {
    /// The requested limit, capped at [`MAX_LIMIT`].
    pub fn effective_limit(&self) -> u32 {
        self.limit.min(MAX_LIMIT)
    }
}

/// GET /recent-ads?limit=N -- normalized recent trade ads feed.
async fn recent_ads(
    State(state): State<AppState>,
    Query(query): Query<RecentAdsQuery>,
) -> AppResult<Json<Value>> {
    let ads = state.trade_ads.recent_ads(query.effective_limit()).await?;
    Ok(Json(json!({ "count": ads.len(), "ads": ads })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/recent-ads", get(recent_ads))
}
