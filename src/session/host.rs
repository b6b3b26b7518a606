//! Thread-safe session front end.
//!
//! [`SessionHost`] is the object external glue (an HTTP layer, a CLI) talks
//! to. It owns the lock-guarded session slot, the background tick thread and
//! the single-flight batch runner, and routes every operation through the
//! session lock so that operations never observe a half-applied step.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::SessionError;
use super::batch::{BatchPlan, BatchReport, BatchRunner, BatchStatus};
use super::scheduler::BackgroundScheduler;
use super::shared::SharedSession;
use super::state::{HistoryFrame, Session, StateSnapshot};
use crate::archive::{ArchiveOptions, ArchiveStats, ArchiveWriter, ExportError};
use crate::compute::FieldStats;
use crate::history::HistoryEntry;
use crate::schema::{ParamUpdate, Parameters, Pattern, SessionConfig};

/// Lifecycle state of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No session has been initialised.
    Empty,
    /// A session exists and is not stepping in the background.
    Ready,
    /// The background scheduler is stepping the session.
    Running,
}

/// Owner of one simulation session and its worker threads.
pub struct SessionHost {
    shared: Arc<SharedSession>,
    /// Settings for sessions created by [`init`](Self::init).
    template: SessionConfig,
    scheduler: BackgroundScheduler,
    batch: BatchRunner,
}

impl SessionHost {
    /// Host with no session. Sessions created by `init` take every setting
    /// except dimensions from `template`.
    pub fn new(template: SessionConfig) -> Result<Self, SessionError> {
        template.validate()?;
        let shared = Arc::new(SharedSession::new());
        let scheduler = BackgroundScheduler::spawn(Arc::clone(&shared), template.tick_rate_hz)?;
        Ok(Self {
            shared,
            template,
            scheduler,
            batch: BatchRunner::new(),
        })
    }

    /// Host with a session already built from `config`.
    pub fn with_session(config: SessionConfig) -> Result<Self, SessionError> {
        let host = Self::new(config.clone())?;
        host.shared.install(Session::new(config)?);
        Ok(host)
    }

    pub fn run_state(&self) -> RunState {
        if !self.shared.is_active() {
            RunState::Empty
        } else if self.scheduler.is_running() {
            RunState::Running
        } else {
            RunState::Ready
        }
    }

    /// Replace any session with a fresh `rows` x `cols` one. Leaves the host
    /// `Ready`.
    pub fn init(&self, rows: usize, cols: usize) -> Result<u64, SessionError> {
        let session = Session::new(self.template.with_dimensions(rows, cols))?;
        self.scheduler.pause();
        let max_step = session.max_step();
        self.shared.install(session);
        Ok(max_step)
    }

    /// Regenerate the initial field with the named pattern, keeping
    /// dimensions and coefficients. `None` and unknown names use stripes.
    /// Leaves the host `Ready`.
    pub fn reset(&self, pattern: Option<&str>) -> Result<u64, SessionError> {
        let pattern = pattern.map(Pattern::from_name).unwrap_or_default();
        self.scheduler.pause();
        self.shared.reset(pattern)
    }

    /// Merge `update` into the coefficients and return the result.
    pub fn update_params(&self, update: &ParamUpdate) -> Result<Parameters, SessionError> {
        self.shared.with(|s| s.update_params(update))
    }

    pub fn params(&self) -> Result<Parameters, SessionError> {
        self.shared.with(|s| s.params())
    }

    /// Advance `n` steps on the calling thread, holding the lock per step.
    /// Counts as a batch for single-flight purposes.
    ///
    /// Returns the session's maximum step once the batch ends. If `init` or
    /// `reset` replaced the session meanwhile, that is the new session's
    /// maximum step.
    pub fn simulate_steps(&self, n: i64) -> Result<u64, SessionError> {
        let Ok(n) = u64::try_from(n) else {
            return self.max_step();
        };
        if n == 0 {
            return self.max_step();
        }
        let report = self.batch.run_blocking(&self.shared, BatchPlan::Steps(n))?;
        if report.interrupted {
            log::info!(
                "simulate_steps stopped after {} of {n} steps: session was replaced",
                report.completed
            );
        }
        self.max_step()
    }

    /// Start a batch of `n` steps on the worker thread.
    pub fn spawn_batch(&self, n: u64) -> Result<(), SessionError> {
        self.start_batch(BatchPlan::Steps(n))
    }

    /// Start a batch on the worker thread that steps until the maximum step
    /// reaches `target`.
    pub fn run_to_target(&self, target: u64) -> Result<(), SessionError> {
        self.start_batch(BatchPlan::ToTarget(target))
    }

    fn start_batch(&self, plan: BatchPlan) -> Result<(), SessionError> {
        // A running batch implies a session; let the runner reject the request.
        if !self.batch.is_running() && !self.shared.is_active() {
            return Err(SessionError::NoActiveSession);
        }
        self.batch.spawn(Arc::clone(&self.shared), plan)
    }

    pub fn batch_status(&self) -> BatchStatus {
        self.batch.status()
    }

    /// Block until the last spawned batch finishes.
    pub fn wait_batch(&self) -> Option<Result<BatchReport, SessionError>> {
        self.batch.wait()
    }

    /// Paint inhibitor at column `x`, row `y` and record it as a new step.
    pub fn interact(&self, x: i64, y: i64, radius: Option<u32>) -> Result<u64, SessionError> {
        self.shared.with(|s| s.interact(x, y, radius))
    }

    /// Snapshot of `step`, or of the latest step.
    pub fn get_state(&self, step: Option<i64>) -> Result<StateSnapshot, SessionError> {
        self.shared.with(|s| s.get_state(step))?
    }

    /// Inhibitor frames for `[start, end)` every `stride` steps (default 1).
    pub fn get_history_range(
        &self,
        start: i64,
        end: Option<i64>,
        stride: Option<i64>,
    ) -> Result<Vec<HistoryFrame>, SessionError> {
        self.shared
            .with(|s| s.history_range(start, end, stride.unwrap_or(1)))
    }

    /// Full entries for a range query.
    pub fn history_entries(
        &self,
        start: i64,
        end: Option<i64>,
        stride: Option<i64>,
    ) -> Result<Vec<HistoryEntry>, SessionError> {
        self.shared
            .with(|s| s.history_entries(start, end, stride.unwrap_or(1)))
    }

    /// Stop background stepping. Valid in any state.
    pub fn pause(&self) -> RunState {
        self.scheduler.pause();
        self.run_state()
    }

    /// Start background stepping.
    pub fn resume(&self) -> Result<RunState, SessionError> {
        if !self.shared.is_active() {
            return Err(SessionError::NoActiveSession);
        }
        self.scheduler.resume();
        Ok(self.run_state())
    }

    pub fn max_step(&self) -> Result<u64, SessionError> {
        self.shared.with(|s| s.max_step())
    }

    /// Statistics of the live field.
    pub fn stats(&self) -> Result<FieldStats, SessionError> {
        self.shared.with(|s| s.stats())
    }

    /// Write every `stride`-th history entry to an archive at `path`.
    ///
    /// Entries are collected under the lock and written after releasing it,
    /// so stepping continues during the export.
    pub fn export_history<P: AsRef<Path>>(
        &self,
        path: P,
        stride: i64,
        options: ArchiveOptions,
    ) -> Result<ArchiveStats, ExportError> {
        let (rows, cols, dt, retains, entries) = self.shared.with(|s| {
            (
                s.rows(),
                s.cols(),
                s.params().dt,
                s.config().retain_activator,
                s.history_entries(0, None, stride),
            )
        })?;
        let options = ArchiveOptions {
            include_activator: options.include_activator && retains,
            ..options
        };

        let mut writer = ArchiveWriter::create(path, rows, cols, dt, options)?;
        writer.write_all(&entries)?;
        Ok(writer.finish()?)
    }
}

impl Drop for SessionHost {
    fn drop(&mut self) {
        self.scheduler.pause();
        self.shared.invalidate();
        if let Some(Err(err)) = self.batch.wait() {
            log::warn!("batch ended with error during shutdown: {err}");
        }
    }
}
