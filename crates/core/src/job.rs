//! Render job lifecycle.
//!
//! A job lives only for the duration of one HTTP request:
//! `Queued -> Running -> Completed | Failed`. Nothing is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::TradeAd;

/// Lifecycle state of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid job transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// One rendering request.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub payload: TradeAd,
    pub accepted_at: DateTime<Utc>,
    state: JobState,
}

impl Job {
    /// Create a job in the `Queued` state, stamped with the admission time.
    pub fn new(payload: TradeAd) -> Self {
        Self {
            id: Uuid::now_v7(),
            payload,
            accepted_at: Utc::now(),
            state: JobState::Queued,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Queue dispatched the job.
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobState::Running)
    }

    /// Pipeline returned successfully.
    pub fn complete(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobState::Completed)
    }

    /// Pipeline returned an error.
    pub fn fail(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobState::Failed)
    }

    fn transition(&mut self, next: JobState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(job_id = %self.id, from = ?self.state, to = ?next, "Job state change");
        self.state = next;
        Ok(())
    }
}
