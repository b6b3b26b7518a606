//! Single-owner session state.
//!
//! A [`Session`] owns the current field, the coefficients and the history.
//! Every method takes `&mut self` or `&self`; serialising access across
//! threads is the job of [`SessionHost`](super::SessionHost).

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::SessionError;
use crate::compute::{Field, FieldStats, Grid, Integrator, NoiseSource};
use crate::history::{HistoryEntry, HistoryStore};
use crate::schema::{ParamUpdate, Parameters, Pattern, SessionConfig};

/// Read-only view of one recorded step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub step: u64,
    pub max_step: u64,
    pub rows: usize,
    pub cols: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activator: Option<Arc<Grid>>,
    pub inhibitor: Arc<Grid>,
}

/// One frame of a history range query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryFrame {
    pub step: u64,
    pub inhibitor: Arc<Grid>,
}

/// Gray-Scott simulation with full step history.
pub struct Session {
    config: SessionConfig,
    params: Parameters,
    current: Field,
    history: HistoryStore,
    integrator: Integrator,
}

impl Session {
    /// Build a session from `config`: initial field from the configured
    /// pattern, history holding only step 0.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;

        let current = config.pattern.generate(config.rows, config.cols, config.seed);
        let history = HistoryStore::with_initial(&current, config.retain_activator);
        log::info!(
            "session initialised: {}x{}, {} pattern, seed {}",
            config.rows,
            config.cols,
            config.pattern.name(),
            config.seed
        );

        Ok(Self {
            params: config.params,
            integrator: Integrator::new(config.rows, config.cols),
            config,
            current,
            history,
        })
    }

    /// Session with default settings and the given dimensions.
    pub fn init(rows: usize, cols: usize) -> Result<Self, SessionError> {
        Self::new(SessionConfig::default().with_dimensions(rows, cols))
    }

    /// Regenerate the initial field with `pattern`, keeping dimensions and
    /// coefficients. History is replaced by the new step 0.
    pub fn reset(&mut self, pattern: Pattern) {
        self.config.pattern = pattern;
        self.current = pattern.generate(self.config.rows, self.config.cols, self.config.seed);
        self.history = HistoryStore::with_initial(&self.current, self.config.retain_activator);
        log::info!("session reset with {} pattern", pattern.name());
    }

    /// Merge `update` into the coefficients. Takes effect on the next step.
    pub fn update_params(&mut self, update: &ParamUpdate) -> Parameters {
        self.params.apply(update);
        log::debug!("parameters updated: {:?}", self.params);
        self.params
    }

    /// Advance one step and record it. Returns the new step index.
    ///
    /// On a numerical fault nothing is committed.
    pub fn step(&mut self) -> Result<u64, SessionError> {
        let step = self.max_step() + 1;
        let fault = |fault| SessionError::NumericalFault { step, fault };

        let mut noise =
            NoiseSource::for_step(self.config.seed, step, self.params.noise).map_err(fault)?;
        let next = self
            .integrator
            .step(&self.current, &self.params, noise.as_mut())
            .map_err(fault)?;

        self.history
            .push_field(&next, self.config.retain_activator);
        self.current = next;
        Ok(step)
    }

    /// Advance `n` steps, recording each. `n <= 0` is a no-op. Returns the new
    /// maximum step.
    ///
    /// Steps are committed one at a time; if step `i` faults, steps before it
    /// remain in history.
    pub fn simulate_steps(&mut self, n: i64) -> Result<u64, SessionError> {
        let start = Instant::now();
        for _ in 0..n.max(0) {
            self.step()?;
        }
        if n > 0 {
            log::debug!(
                "simulated {n} steps in {:.4}s (max step {})",
                start.elapsed().as_secs_f32(),
                self.max_step()
            );
        }
        Ok(self.max_step())
    }

    /// Paint a disk of inhibitor at column `x`, row `y` onto the current
    /// field and record the result as a new step.
    ///
    /// Always applies at the history frontier, whatever step a caller last
    /// viewed.
    pub fn interact(&mut self, x: i64, y: i64, radius: Option<u32>) -> u64 {
        let radius = radius.unwrap_or(self.config.brush_radius);
        self.current.paint_disk(x, y, radius);
        let step = self
            .history
            .push_field(&self.current, self.config.retain_activator);
        log::debug!("painted radius {radius} at ({x}, {y}) as step {step}");
        step
    }

    /// Snapshot of step `step`, or of the latest step when `None`.
    pub fn get_state(&self, step: Option<i64>) -> Result<StateSnapshot, SessionError> {
        let max_step = self.max_step();
        let invalid = |step| SessionError::InvalidStep { step, max_step };

        let index = match step {
            Some(s) => Some(u64::try_from(s).map_err(|_| invalid(s))?),
            None => None,
        };
        let entry = self
            .history
            .get(index)
            .ok_or_else(|| invalid(step.unwrap_or(-1)))?;

        Ok(StateSnapshot {
            step: entry.step,
            max_step,
            rows: self.rows(),
            cols: self.cols(),
            activator: entry.activator.clone(),
            inhibitor: Arc::clone(&entry.inhibitor),
        })
    }

    /// Inhibitor frames at `start, start + stride, ...` below `end`.
    ///
    /// Negative `start` is treated as 0; `end` defaults to and is clamped by
    /// the history length; `start > end` or `stride <= 0` yields no frames.
    pub fn history_range(&self, start: i64, end: Option<i64>, stride: i64) -> Vec<HistoryFrame> {
        self.history_entries(start, end, stride)
            .into_iter()
            .map(|e| HistoryFrame {
                step: e.step,
                inhibitor: e.inhibitor,
            })
            .collect()
    }

    /// Full entries for a range query, with the same bounds handling as
    /// [`history_range`](Self::history_range).
    pub fn history_entries(&self, start: i64, end: Option<i64>, stride: i64) -> Vec<HistoryEntry> {
        if stride <= 0 {
            return Vec::new();
        }
        let to_index = |v: i64| usize::try_from(v.max(0)).unwrap_or(usize::MAX);
        self.history
            .range(to_index(start), end.map(to_index), to_index(stride))
            .cloned()
            .collect()
    }

    /// Index of the most recent step.
    #[inline]
    pub fn max_step(&self) -> u64 {
        self.history.max_step().unwrap_or(0)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.config.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.config.cols
    }

    pub fn params(&self) -> Parameters {
        self.params
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Live field at the history frontier.
    pub fn current(&self) -> &Field {
        &self.current
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Statistics of the current field.
    pub fn stats(&self) -> FieldStats {
        FieldStats::from_field(&self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_session() -> Session {
        Session::new(SessionConfig {
            rows: 24,
            cols: 40,
            ..Default::default()
        })
        .unwrap()
    }

    fn assert_bounded(field: &Field) {
        for &v in field
            .activator
            .as_slice()
            .iter()
            .chain(field.inhibitor.as_slice())
        {
            assert!((0.0..=1.0).contains(&v), "value {} out of range", v);
        }
    }

    #[test]
    fn test_init_has_single_entry() {
        let session = Session::init(16, 16).unwrap();
        assert_eq!(session.max_step(), 0);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.params(), Parameters::default());
    }

    #[test]
    fn test_init_rejects_zero_dimensions() {
        assert!(matches!(
            Session::init(0, 8),
            Err(SessionError::InvalidDimensions { rows: 0, cols: 8 })
        ));
        assert!(matches!(
            Session::init(8, 0),
            Err(SessionError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_step_count_invariant() {
        let mut session = small_session();
        session.simulate_steps(5).unwrap();
        session.interact(3, 3, Some(2));
        session.simulate_steps(4).unwrap();
        session.interact(10, 1, None);
        session.interact(0, 0, Some(1));

        assert_eq!(session.max_step(), 5 + 4 + 3);
        assert_eq!(session.history().len() as u64, session.max_step() + 1);
    }

    #[test]
    fn test_non_positive_steps_are_noop() {
        let mut session = small_session();
        assert_eq!(session.simulate_steps(0).unwrap(), 0);
        assert_eq!(session.simulate_steps(-3).unwrap(), 0);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_history_and_current_stay_bounded() {
        let mut session = small_session();
        session.update_params(&ParamUpdate {
            dt: Some(3.0),
            da: Some(0.9),
            ..Default::default()
        });
        session.simulate_steps(20).unwrap();

        assert_bounded(session.current());
        for entry in session.history().iter() {
            for &v in entry.inhibitor.as_slice() {
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_deterministic_without_noise() {
        let mut a = small_session();
        let mut b = small_session();
        a.simulate_steps(15).unwrap();
        b.simulate_steps(15).unwrap();

        for (ea, eb) in a.history().iter().zip(b.history().iter()) {
            assert_eq!(ea, eb);
        }
    }

    #[test]
    fn test_deterministic_with_noise_from_same_seed() {
        let config = SessionConfig {
            rows: 16,
            cols: 16,
            params: Parameters {
                noise: 0.01,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut a = Session::new(config.clone()).unwrap();
        let mut b = Session::new(config).unwrap();
        a.simulate_steps(5).unwrap();
        b.simulate_steps(5).unwrap();
        assert_eq!(a.current(), b.current());
    }

    #[test]
    fn test_update_params_merges_and_keeps_history() {
        let mut session = small_session();
        session.simulate_steps(3).unwrap();

        let params = session.update_params(&ParamUpdate {
            k: Some(0.05),
            ..Default::default()
        });
        assert_eq!(params.k, 0.05);
        assert_eq!(params.f, Parameters::default().f);
        assert_eq!(session.max_step(), 3);
    }

    #[test]
    fn test_get_state_bounds() {
        let mut session = small_session();
        session.simulate_steps(4).unwrap();

        let latest = session.get_state(None).unwrap();
        assert_eq!(latest.step, 4);
        assert_eq!(latest.max_step, 4);
        assert_eq!((latest.rows, latest.cols), (24, 40));
        assert!(latest.activator.is_some());

        assert_eq!(session.get_state(Some(2)).unwrap().step, 2);
        assert_eq!(
            session.get_state(Some(5)),
            Err(SessionError::InvalidStep {
                step: 5,
                max_step: 4
            })
        );
        assert_eq!(
            session.get_state(Some(-1)),
            Err(SessionError::InvalidStep {
                step: -1,
                max_step: 4
            })
        );
    }

    #[test]
    fn test_history_range_query() {
        let mut session = small_session();
        session.simulate_steps(9).unwrap();

        let steps: Vec<u64> = session
            .history_range(2, Some(5), 2)
            .iter()
            .map(|f| f.step)
            .collect();
        assert_eq!(steps, vec![2, 4]);

        assert!(session.history_range(6, Some(3), 1).is_empty());
        assert!(session.history_range(0, None, 0).is_empty());
        assert!(session.history_range(0, None, -2).is_empty());
        assert_eq!(session.history_range(-5, Some(2), 1).len(), 2);
        assert_eq!(session.history_range(8, Some(500), 1).len(), 2);
    }

    #[test]
    fn test_paint_locality_and_wraparound() {
        let mut session = small_session();
        let before = session.current().clone();

        let step = session.interact(0, 0, Some(2));
        assert_eq!(step, 1);

        let after = session.current();
        let (rows, cols) = (24i64, 40i64);
        for r in 0..rows {
            for c in 0..cols {
                // Wrapped offsets from the origin.
                let dy = r.min(rows - r);
                let dx = c.min(cols - c);
                let (r, c) = (r as usize, c as usize);
                if dx * dx + dy * dy <= 4 {
                    assert_eq!(after.inhibitor.get(r, c), 1.0);
                    assert_eq!(after.activator.get(r, c), 0.0);
                } else {
                    assert_eq!(after.inhibitor.get(r, c), before.inhibitor.get(r, c));
                    assert_eq!(after.activator.get(r, c), before.activator.get(r, c));
                }
            }
        }
        assert_eq!(after.inhibitor.get(23, 0), 1.0);
        assert_eq!(after.inhibitor.get(0, 38), 1.0);

        let recorded = session.get_state(Some(1)).unwrap();
        assert_eq!(recorded.inhibitor.as_ref(), &after.inhibitor);
    }

    #[test]
    fn test_paint_applies_at_frontier_not_viewed_step() {
        let mut session = small_session();
        session.simulate_steps(6).unwrap();
        let old = session.get_state(Some(2)).unwrap();

        let step = session.interact(5, 5, Some(1));
        assert_eq!(step, 7);
        // Earlier entries are untouched.
        assert_eq!(session.get_state(Some(2)).unwrap(), StateSnapshot {
            max_step: 7,
            ..old
        });
    }

    #[test]
    fn test_reset_reproducible_and_keeps_params() {
        let mut session = small_session();
        session.update_params(&ParamUpdate {
            f: Some(0.03),
            ..Default::default()
        });
        session.simulate_steps(5).unwrap();

        session.reset(Pattern::Stripes);
        let first = session.get_state(Some(0)).unwrap();
        session.simulate_steps(2).unwrap();
        session.reset(Pattern::Stripes);
        let second = session.get_state(Some(0)).unwrap();

        assert_eq!(session.max_step(), 0);
        assert_eq!(first, second);
        assert_eq!(session.params().f, 0.03);
    }

    #[test]
    fn test_numerical_fault_commits_nothing() {
        let mut session = small_session();
        session.simulate_steps(2).unwrap();
        session.update_params(&ParamUpdate {
            dt: Some(f32::NAN),
            ..Default::default()
        });

        let err = session.simulate_steps(3).unwrap_err();
        assert!(matches!(err, SessionError::NumericalFault { step: 3, .. }));
        assert_eq!(session.max_step(), 2);
        assert_bounded(session.current());
    }

    #[test]
    fn test_activator_not_retained_when_disabled() {
        let mut session = Session::new(SessionConfig {
            rows: 8,
            cols: 8,
            retain_activator: false,
            ..Default::default()
        })
        .unwrap();
        session.simulate_steps(1).unwrap();
        assert!(session.get_state(None).unwrap().activator.is_none());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let session = Session::init(2, 2).unwrap();
        let json = serde_json::to_value(session.get_state(None).unwrap()).unwrap();
        assert_eq!(json["maxStep"], 0);
        assert_eq!(json["rows"], 2);
        assert!(json.get("inhibitor").is_some());
    }
}
