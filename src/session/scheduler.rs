//! Background tick thread.
//!
//! While running, the thread takes one step per tick at the configured rate,
//! acquiring the session lock for the duration of each step. Pausing never
//! interrupts a step in progress: the running flag is rechecked under the
//! lock, so once [`BackgroundScheduler::pause`] returns and the current step
//! commits, no further steps are taken.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::SessionError;
use super::shared::{SharedSession, TickOutcome};

/// Steps between debug timing lines.
const LOG_EVERY: u64 = 30;

/// Flags shared between the owner and the tick thread.
struct Control {
    running: AtomicBool,
    shutdown: AtomicBool,
    ticks: AtomicU64,
}

/// Handle to the tick thread. Dropping it stops and joins the thread.
pub struct BackgroundScheduler {
    control: Arc<Control>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundScheduler {
    /// Start a paused tick thread stepping `shared` at `tick_rate_hz`.
    pub(crate) fn spawn(
        shared: Arc<SharedSession>,
        tick_rate_hz: f64,
    ) -> Result<Self, SessionError> {
        let control = Arc::new(Control {
            running: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
        });

        let tick_loop = TickLoop {
            shared,
            control: Arc::clone(&control),
            budget: Duration::from_secs_f64(1.0 / tick_rate_hz),
        };
        let thread = thread::Builder::new()
            .name("gray-scott-tick".into())
            .spawn(move || tick_loop.run())
            .map_err(|_| SessionError::Spawn("tick"))?;

        log::debug!("tick thread started at {tick_rate_hz} Hz");
        Ok(Self {
            control,
            thread: Some(thread),
        })
    }

    /// Stop stepping. Returns whether the scheduler was running.
    pub fn pause(&self) -> bool {
        let was_running = self.control.running.swap(false, Ordering::AcqRel);
        if was_running {
            log::info!("simulation paused");
            self.wake();
        }
        was_running
    }

    /// Start stepping. Returns whether the scheduler was already running.
    pub fn resume(&self) -> bool {
        let was_running = self.control.running.swap(true, Ordering::AcqRel);
        if !was_running {
            log::info!("simulation resumed");
            self.wake();
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::Acquire)
    }

    /// Steps taken by this scheduler since it was spawned.
    pub fn ticks(&self) -> u64 {
        self.control.ticks.load(Ordering::Relaxed)
    }

    fn wake(&self) {
        if let Some(thread) = &self.thread {
            thread.thread().unpark();
        }
    }
}

impl Drop for BackgroundScheduler {
    fn drop(&mut self) {
        self.control.running.store(false, Ordering::Release);
        self.control.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                log::error!("tick thread panicked");
            }
        }
    }
}

struct TickLoop {
    shared: Arc<SharedSession>,
    control: Arc<Control>,
    budget: Duration,
}

impl TickLoop {
    fn run(self) {
        while !self.control.shutdown.load(Ordering::Acquire) {
            if !self.control.running.load(Ordering::Acquire) {
                thread::park();
                continue;
            }

            let tick_start = Instant::now();
            self.tick(tick_start);
            self.sleep_until(tick_start + self.budget);
        }
        log::debug!("tick thread stopped");
    }

    fn tick(&self, tick_start: Instant) {
        let running = &self.control.running;
        match self
            .shared
            .step_if(None, || running.load(Ordering::Acquire))
        {
            Ok(TickOutcome::Stepped(step)) => {
                self.control.ticks.fetch_add(1, Ordering::Relaxed);
                if step % LOG_EVERY == 0 {
                    log::debug!(
                        "step {step}: computed in {:.2}ms of a {:.2}ms budget",
                        tick_start.elapsed().as_secs_f64() * 1e3,
                        self.budget.as_secs_f64() * 1e3
                    );
                }
            }
            Ok(TickOutcome::Skipped) => {}
            Err(err) => {
                log::error!("background stepping stopped: {err}");
                running.store(false, Ordering::Release);
            }
        }
    }

    /// Park until `deadline`, returning early on pause or shutdown.
    fn sleep_until(&self, deadline: Instant) {
        loop {
            if self.control.shutdown.load(Ordering::Acquire)
                || !self.control.running.load(Ordering::Acquire)
            {
                return;
            }
            let now = Instant::now();
            match deadline.checked_duration_since(now) {
                Some(remaining) if !remaining.is_zero() => thread::park_timeout(remaining),
                _ => return,
            }
        }
    }
}
