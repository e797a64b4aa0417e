//! `POST /generate`: render one trade ad card.
//!
//! Checks run in a fixed order: memory, concurrency, then the body. The
//! admitted job runs in its own task so a client that hangs up does not
//! abort a render that already holds a slot.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::{routing::post, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tradecard_core::job::Job;
use tradecard_core::types::TradeAd;

use crate::error::{AppError, AppResult};
use crate::monitor::JobPermit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "tradeData", default)]
    pub trade_data: Option<Value>,
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> AppResult<Response> {
    let permit = state.monitor.admit()?;

    let Json(request) = body.map_err(|e| AppError::InvalidBody(e.body_text()))?;
    let trade_data = match request.trade_data {
        None | Some(Value::Null) => return Err(AppError::MissingTradeData),
        Some(value) => value,
    };
    let ad = TradeAd::from_value(&trade_data)?;

    let job = Job::new(ad);
    tracing::info!(
        job_id = %job.id,
        offer_items = job.payload.offer.items.len(),
        request_items = job.payload.request.items.len(),
        request_tags = job.payload.request.tags.len(),
        "Job accepted"
    );

    let png = tokio::spawn(run_job(state, job, permit))
        .await
        .map_err(|e| AppError::InternalError(format!("render task failed: {e}")))??;

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (CONTENT_LENGTH, HeaderValue::from(png.len())),
        ],
        png,
    )
        .into_response())
}

/// Queue, render and apply the memory policy. `permit` is held until the
/// job has fully settled.
async fn run_job(state: AppState, mut job: Job, permit: JobPermit) -> AppResult<Vec<u8>> {
    let _permit = permit;
    let job_id = job.id;
    let started = Instant::now();
    let pipeline = Arc::clone(&state.pipeline);

    let queued = state.queue.submit(async {
        if let Err(e) = job.start() {
            tracing::warn!(job_id = %job_id, error = %e, "Ignoring job transition");
        }
        let result = pipeline.render(&job.payload).await;
        let transition = match &result {
            Ok(_) => job.complete(),
            Err(_) => job.fail(),
        };
        if let Err(e) = transition {
            tracing::warn!(job_id = %job_id, error = %e, "Ignoring job transition");
        }
        result
    });
    let (result, usage) = state.monitor.track(queued).await;
    state.monitor.after_job(job_id, usage);

    let card = result??;
    tracing::info!(
        job_id = %job_id,
        bytes = card.png.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Image generated"
    );
    Ok(card.png)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}
