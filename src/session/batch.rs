//! Single-flight batch stepping on a worker thread.
//!
//! Only one batch runs at a time; a second request while one is in flight is
//! rejected with [`SessionError::BatchAlreadyRunning`], never queued. A batch
//! takes the session lock once per step, so reads and paints interleave with
//! it at step granularity.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::Serialize;

use super::SessionError;
use super::shared::{SharedSession, TickOutcome};

/// Steps between progress log lines.
pub const CHUNK_STEPS: u64 = 10;

/// What a batch should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPlan {
    /// Take exactly this many steps.
    Steps(u64),
    /// Step until the maximum step index reaches this value.
    ToTarget(u64),
}

impl BatchPlan {
    /// Step count known before the start step is read: exact for `Steps`,
    /// zero for `ToTarget`.
    fn known_requested(self) -> u64 {
        match self {
            BatchPlan::Steps(n) => n,
            BatchPlan::ToTarget(_) => 0,
        }
    }
}

/// Live progress of the current or most recent batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatus {
    pub running: bool,
    pub requested: u64,
    pub completed: u64,
    pub start_step: u64,
}

/// Outcome of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub requested: u64,
    pub completed: u64,
    /// Last step committed by this batch. Not the session's maximum step when
    /// other writers interleave or the batch was interrupted.
    pub final_step: u64,
    /// The session was replaced by `init` or `reset` before the batch finished.
    pub interrupted: bool,
}

#[derive(Default)]
struct Progress {
    requested: AtomicU64,
    completed: AtomicU64,
    start_step: AtomicU64,
}

impl Progress {
    fn begin(&self, requested: u64, start_step: u64) {
        self.requested.store(requested, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.start_step.store(start_step, Ordering::Relaxed);
    }
}

/// Releases the single-flight flag on drop.
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

type BatchHandle = JoinHandle<Result<BatchReport, SessionError>>;

/// Single-flight batch executor.
pub struct BatchRunner {
    in_flight: Arc<AtomicBool>,
    progress: Arc<Progress>,
    handle: Mutex<Option<BatchHandle>>,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRunner {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(Progress::default()),
            handle: Mutex::new(None),
        }
    }

    fn acquire(&self) -> Result<FlightGuard, SessionError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                log::warn!("batch rejected: another batch is in flight");
                SessionError::BatchAlreadyRunning
            })?;
        Ok(FlightGuard(Arc::clone(&self.in_flight)))
    }

    /// Run `plan` on the calling thread.
    pub(crate) fn run_blocking(
        &self,
        shared: &SharedSession,
        plan: BatchPlan,
    ) -> Result<BatchReport, SessionError> {
        let _guard = self.acquire()?;
        self.progress.begin(plan.known_requested(), 0);
        execute(shared, plan, &self.progress)
    }

    /// Run `plan` on a worker thread. Collect the result with [`wait`](Self::wait).
    pub(crate) fn spawn(
        &self,
        shared: Arc<SharedSession>,
        plan: BatchPlan,
    ) -> Result<(), SessionError> {
        // The handle slot is locked before the flag is taken, so the stored
        // handle always belongs to the batch that last held the flag.
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = self.acquire()?;
        self.progress.begin(plan.known_requested(), 0);
        let progress = Arc::clone(&self.progress);

        let handle = thread::Builder::new()
            .name("gray-scott-batch".into())
            .spawn(move || {
                let _guard = guard;
                execute(&shared, plan, &progress)
            })
            .map_err(|_| SessionError::Spawn("batch"))?;

        if let Some(previous) = slot.replace(handle) {
            // The flag was free, so this worker has already returned.
            discard_unclaimed(previous.join());
        }
        Ok(())
    }

    /// True while a batch holds the single-flight flag.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn status(&self) -> BatchStatus {
        BatchStatus {
            running: self.is_running(),
            requested: self.progress.requested.load(Ordering::Relaxed),
            completed: self.progress.completed.load(Ordering::Relaxed),
            start_step: self.progress.start_step.load(Ordering::Relaxed),
        }
    }

    /// Block until the most recently spawned batch finishes and return its
    /// result. `None` if no spawned batch is pending.
    pub fn wait(&self) -> Option<Result<BatchReport, SessionError>> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        Some(
            handle
                .join()
                .unwrap_or(Err(SessionError::Panicked("batch"))),
        )
    }
}

/// Log the result of a batch nobody waited for.
fn discard_unclaimed(result: thread::Result<Result<BatchReport, SessionError>>) {
    match result {
        Ok(Ok(report)) => log::debug!("uncollected batch report superseded: {report:?}"),
        Ok(Err(err)) => log::warn!("uncollected batch failed: {err}"),
        Err(_) => log::error!("batch thread panicked"),
    }
}

fn execute(
    shared: &SharedSession,
    plan: BatchPlan,
    progress: &Progress,
) -> Result<BatchReport, SessionError> {
    let (generation, start_step) = shared.position()?;
    let requested = match plan {
        BatchPlan::Steps(n) => n,
        BatchPlan::ToTarget(target) => target.saturating_sub(start_step),
    };

    progress.begin(requested, start_step);
    log::info!("batch started: {plan:?} from step {start_step}");

    let started = Instant::now();
    let mut completed = 0u64;
    let mut final_step = start_step;
    let mut interrupted = false;

    'run: while completed < requested {
        let chunk_start = Instant::now();
        let chunk = CHUNK_STEPS.min(requested - completed);

        for _ in 0..chunk {
            match shared.step_if(Some(generation), || true)? {
                TickOutcome::Stepped(step) => {
                    completed += 1;
                    final_step = step;
                    progress.completed.store(completed, Ordering::Relaxed);
                }
                TickOutcome::Skipped => {
                    interrupted = true;
                    break 'run;
                }
            }
            if let BatchPlan::ToTarget(target) = plan {
                if final_step >= target {
                    break 'run;
                }
            }
        }

        log::debug!(
            "batch progress: {completed}/{requested} steps ({:.2}s for last chunk)",
            chunk_start.elapsed().as_secs_f32()
        );
    }

    if interrupted {
        log::info!("batch interrupted after {completed} steps: session was replaced");
    } else {
        log::info!(
            "batch complete: {completed} steps in {:.2}s, max step {final_step}",
            started.elapsed().as_secs_f32()
        );
    }

    Ok(BatchReport {
        requested,
        completed,
        final_step,
        interrupted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::schema::Pattern;
    use crate::session::Session;

    fn shared_session() -> Arc<SharedSession> {
        let shared = Arc::new(SharedSession::new());
        shared.install(Session::init(16, 16).unwrap());
        shared
    }

    #[test]
    fn test_blocking_steps() {
        let shared = shared_session();
        let runner = BatchRunner::new();

        let report = runner.run_blocking(&shared, BatchPlan::Steps(25)).unwrap();
        assert_eq!(report.completed, 25);
        assert_eq!(report.final_step, 25);
        assert!(!report.interrupted);
        assert!(!runner.is_running());
        assert_eq!(runner.status().completed, 25);
    }

    #[test]
    fn test_to_target_stops_at_target() {
        let shared = shared_session();
        let runner = BatchRunner::new();
        shared.with(|s| s.simulate_steps(4)).unwrap().unwrap();

        let report = runner.run_blocking(&shared, BatchPlan::ToTarget(13)).unwrap();
        assert_eq!(report.requested, 9);
        assert_eq!(report.final_step, 13);
        assert_eq!(shared.with(|s| s.max_step()).unwrap(), 13);

        let report = runner.run_blocking(&shared, BatchPlan::ToTarget(5)).unwrap();
        assert_eq!(report.completed, 0);
    }

    #[test]
    fn test_second_batch_rejected_while_in_flight() {
        let shared = shared_session();
        let runner = BatchRunner::new();

        // Hold the session lock so the worker cannot make progress.
        let slot = shared.lock();
        runner
            .spawn(Arc::clone(&shared), BatchPlan::Steps(7))
            .unwrap();
        assert!(runner.is_running());
        assert_eq!(
            runner.spawn(Arc::clone(&shared), BatchPlan::Steps(3)),
            Err(SessionError::BatchAlreadyRunning)
        );
        assert_eq!(
            runner.run_blocking(&shared, BatchPlan::Steps(3)),
            Err(SessionError::BatchAlreadyRunning)
        );
        drop(slot);

        let report = runner.wait().unwrap().unwrap();
        assert_eq!(report.completed, 7);
        assert!(!runner.is_running());

        let history = shared.with(|s| s.history().len()).unwrap();
        assert_eq!(history, 8);
        let dense = shared
            .with(|s| s.history().iter().enumerate().all(|(i, e)| e.step == i as u64))
            .unwrap();
        assert!(dense);
    }

    #[test]
    fn test_reset_interrupts_batch() {
        let shared = shared_session();
        let runner = BatchRunner::new();

        let slot = shared.lock();
        runner
            .spawn(Arc::clone(&shared), BatchPlan::Steps(50))
            .unwrap();
        drop(slot);
        shared.reset(Pattern::Stripes).unwrap();

        let report = runner.wait().unwrap().unwrap();
        assert!(report.completed <= 50);
        if report.completed < 50 {
            assert!(report.interrupted);
        }
    }

    #[test]
    fn test_status_resets_when_batch_is_spawned() {
        let shared = shared_session();
        let runner = BatchRunner::new();
        runner.run_blocking(&shared, BatchPlan::Steps(5)).unwrap();
        assert_eq!(runner.status().completed, 5);

        // With the lock held the worker cannot read its start step yet.
        let slot = shared.lock();
        runner
            .spawn(Arc::clone(&shared), BatchPlan::Steps(3))
            .unwrap();
        let status = runner.status();
        assert!(status.running);
        assert_eq!(status.requested, 3);
        assert_eq!(status.completed, 0);
        drop(slot);

        runner.wait().unwrap().unwrap();
        let status = runner.status();
        assert_eq!(status.start_step, 5);
        assert_eq!(status.completed, 3);
    }

    #[test]
    fn test_wait_returns_most_recent_batch() {
        let shared = shared_session();
        let runner = BatchRunner::new();

        runner
            .spawn(Arc::clone(&shared), BatchPlan::Steps(1))
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while runner.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!runner.is_running());

        // The first report is never collected; the next spawn supersedes it.
        let started = Instant::now();
        runner
            .spawn(Arc::clone(&shared), BatchPlan::Steps(6))
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        let report = runner.wait().unwrap().unwrap();
        assert_eq!(report.requested, 6);
        assert_eq!(report.final_step, 7);
        assert!(runner.wait().is_none());
    }

    #[test]
    fn test_batch_without_session_fails() {
        let runner = BatchRunner::new();
        let shared = Arc::new(SharedSession::new());
        assert_eq!(
            runner.run_blocking(&shared, BatchPlan::Steps(1)),
            Err(SessionError::NoActiveSession)
        );
        assert!(!runner.is_running());
        assert!(runner.wait().is_none());
    }
}
