//! Deferred self-restart.
//!
//! The worker never tries to shrink its own heap. When memory goes over the
//! limit it logs the reason, waits a grace period so in-flight responses can
//! flush, and exits with [`RESTART_EXIT_CODE`]. The process supervisor is
//! expected to start a fresh instance.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

/// `EX_TEMPFAIL`: distinguishes a deliberate restart from a crash.
pub const RESTART_EXIT_CODE: i32 = 75;

/// What tripped the restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// A job's in-flight peak went over the limit.
    JobPeak { job_id: Uuid, peak_mb: u64, limit_mb: u64 },
    /// The periodic watchdog saw the process over the limit.
    Periodic { current_mb: u64, limit_mb: u64 },
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobPeak { job_id, peak_mb, limit_mb } => write!(
                f,
                "job {job_id} peaked at {peak_mb}MB (limit {limit_mb}MB)"
            ),
            Self::Periodic { current_mb, limit_mb } => write!(
                f,
                "periodic check saw {current_mb}MB (limit {limit_mb}MB)"
            ),
        }
    }
}

/// Ends the process.
pub trait Terminator: Send + Sync {
    fn terminate(&self, exit_code: i32);
}

/// Exits the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, exit_code: i32) {
        tracing::error!(exit_code, "Exiting for restart");
        std::process::exit(exit_code);
    }
}

/// Schedules at most one restart per process.
pub struct RestartScheduler {
    grace: Duration,
    terminator: Arc<dyn Terminator>,
    scheduled: AtomicBool,
}

impl RestartScheduler {
    pub fn new(grace: Duration, terminator: Arc<dyn Terminator>) -> Self {
        Self {
            grace,
            terminator,
            scheduled: AtomicBool::new(false),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Log `reason` and terminate after the grace period.
    ///
    /// Returns `false` when a restart is already pending; the trigger is
    /// logged and otherwise ignored. Must be called inside a tokio runtime.
    pub fn schedule(&self, reason: RestartReason) -> bool {
        if self.scheduled.swap(true, Ordering::SeqCst) {
            tracing::warn!(%reason, "Restart already scheduled, ignoring trigger");
            return false;
        }

        tracing::error!(
            %reason,
            grace_ms = self.grace.as_millis() as u64,
            "Memory limit exceeded, scheduling worker restart"
        );

        let terminator = Arc::clone(&self.terminator);
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            terminator.terminate(RESTART_EXIT_CODE);
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingTerminator {
        codes: Mutex<Vec<i32>>,
    }

    impl Terminator for RecordingTerminator {
        fn terminate(&self, exit_code: i32) {
            self.codes.lock().unwrap().push(exit_code);
        }
    }

    fn periodic() -> RestartReason {
        RestartReason::Periodic {
            current_mb: 512,
            limit_mb: 400,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn terminates_after_grace() {
        let terminator = Arc::new(RecordingTerminator::default());
        let scheduler = RestartScheduler::new(Duration::from_secs(2), terminator.clone());

        assert!(scheduler.schedule(periodic()));
        assert!(scheduler.is_scheduled());

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert!(terminator.codes.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*terminator.codes.lock().unwrap(), vec![RESTART_EXIT_CODE]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_trigger_is_ignored() {
        let terminator = Arc::new(RecordingTerminator::default());
        let scheduler = RestartScheduler::new(Duration::from_millis(10), terminator.clone());

        assert!(scheduler.schedule(periodic()));
        assert!(!scheduler.schedule(RestartReason::JobPeak {
            job_id: Uuid::nil(),
            peak_mb: 900,
            limit_mb: 400,
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(terminator.codes.lock().unwrap().len(), 1);
    }

    #[test]
    fn reason_names_the_trigger() {
        let reason = RestartReason::JobPeak {
            job_id: Uuid::nil(),
            peak_mb: 450,
            limit_mb: 400,
        };
        assert_eq!(
            reason.to_string(),
            "job 00000000-0000-0000-0000-000000000000 peaked at 450MB (limit 400MB)"
        );
    }
}
