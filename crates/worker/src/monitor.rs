//! Admission control and memory policy.
//!
//! Every memory decision goes through the same [`MemoryProbe`]:
//!
//! - [`ResourceMonitor::admit`] rejects work when the process is already over
//!   the limit, then when the admitted-job count is at capacity.
//! - [`ResourceMonitor::track`] samples memory while a job runs and keeps
//!   the peak.
//! - [`ResourceMonitor::after_job`] and [`ResourceMonitor::check_periodic`]
//!   hand breaches to the [`RestartScheduler`].

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tradecard_core::memory::MemoryProbe;
use uuid::Uuid;

use crate::restart::{RestartReason, RestartScheduler};

/// Interval between in-flight memory samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// Why a request was turned away before touching the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("Worker overloaded")]
    Overloaded { ram_usage: u64, ram_limit: u64 },

    #[error("Worker busy")]
    Busy { active_jobs: usize, max_jobs: usize },
}

/// Memory observed over one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobMemory {
    pub before_mb: u64,
    pub peak_mb: u64,
    pub after_mb: u64,
}

/// Counts one admitted job until dropped.
#[derive(Debug)]
pub struct JobPermit {
    active: Arc<AtomicUsize>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ResourceMonitor {
    probe: Arc<dyn MemoryProbe>,
    restart: Arc<RestartScheduler>,
    ram_limit_mb: u64,
    max_jobs: usize,
    active: Arc<AtomicUsize>,
    sample_interval: Duration,
}

impl ResourceMonitor {
    pub fn new(
        probe: Arc<dyn MemoryProbe>,
        restart: Arc<RestartScheduler>,
        ram_limit_mb: u64,
        max_jobs: usize,
    ) -> Self {
        Self {
            probe,
            restart,
            ram_limit_mb,
            max_jobs,
            active: Arc::new(AtomicUsize::new(0)),
            sample_interval: SAMPLE_INTERVAL,
        }
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn current_mb(&self) -> u64 {
        self.probe.current_mb()
    }

    pub fn ram_limit_mb(&self) -> u64 {
        self.ram_limit_mb
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    /// Jobs admitted and not yet finished.
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn restart_scheduled(&self) -> bool {
        self.restart.is_scheduled()
    }

    /// Memory check, then an atomic check-and-increment of the job count.
    pub fn admit(&self) -> Result<JobPermit, AdmissionError> {
        let ram_usage = self.probe.current_mb();
        if ram_usage > self.ram_limit_mb {
            tracing::warn!(ram_usage, ram_limit = self.ram_limit_mb, "Rejecting job, memory over limit");
            return Err(AdmissionError::Overloaded {
                ram_usage,
                ram_limit: self.ram_limit_mb,
            });
        }

        let max_jobs = self.max_jobs;
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                (active < max_jobs).then_some(active + 1)
            })
            .map_err(|active_jobs| {
                tracing::warn!(active_jobs, max_jobs, "Rejecting job, max concurrency reached");
                AdmissionError::Busy {
                    active_jobs,
                    max_jobs,
                }
            })?;

        Ok(JobPermit {
            active: Arc::clone(&self.active),
        })
    }

    /// Drive `job` to completion while sampling memory.
    ///
    /// Sampling stops as soon as the job settles.
    pub async fn track<F: Future>(&self, job: F) -> (F::Output, JobMemory) {
        let before_mb = self.probe.current_mb();
        let mut peak_mb = before_mb;

        let mut ticker = tokio::time::interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(job);
        let output = loop {
            tokio::select! {
                biased;
                output = &mut job => break output,
                _ = ticker.tick() => {
                    peak_mb = peak_mb.max(self.probe.current_mb());
                }
            }
        };

        let after_mb = self.probe.current_mb();
        let usage = JobMemory {
            before_mb,
            peak_mb: peak_mb.max(after_mb),
            after_mb,
        };
        (output, usage)
    }

    /// Log the job's memory and schedule a restart if its peak broke the limit.
    ///
    /// Returns whether this job triggered a restart.
    pub fn after_job(&self, job_id: Uuid, usage: JobMemory) -> bool {
        tracing::info!(
            job_id = %job_id,
            peak_mb = usage.peak_mb,
            after_mb = usage.after_mb,
            delta_mb = usage.after_mb as i64 - usage.before_mb as i64,
            "RAM peak / RAM after / delta"
        );

        if usage.peak_mb <= self.ram_limit_mb {
            return false;
        }
        self.restart.schedule(RestartReason::JobPeak {
            job_id,
            peak_mb: usage.peak_mb,
            limit_mb: self.ram_limit_mb,
        })
    }

    /// One watchdog tick. Returns whether a restart was scheduled.
    pub fn check_periodic(&self) -> bool {
        let current_mb = self.probe.current_mb();
        tracing::debug!(current_mb, limit_mb = self.ram_limit_mb, "Periodic memory check");
        if current_mb <= self.ram_limit_mb {
            return false;
        }
        self.restart.schedule(RestartReason::Periodic {
            current_mb,
            limit_mb: self.ram_limit_mb,
        })
    }
}
