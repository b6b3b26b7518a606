//! Lock-guarded session slot shared by the host, the tick thread and batch
//! workers.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Session, SessionError};
use crate::schema::Pattern;

/// Contents of the session lock.
pub(crate) struct Slot {
    /// `None` until the first `init`.
    pub session: Option<Session>,
    /// Bumped whenever the session is replaced by `init` or `reset`.
    pub generation: u64,
}

/// Result of a guarded step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// A step was committed with this index.
    Stepped(u64),
    /// The guard declined, or the session was replaced since the caller started.
    Skipped,
}

pub(crate) struct SharedSession {
    slot: Mutex<Slot>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                session: None,
                generation: 0,
            }),
        }
    }

    /// Acquire the session lock. Commits are all-or-nothing, so a poisoned
    /// lock still guards a consistent session.
    pub fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the active session under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Result<R, SessionError> {
        let mut slot = self.lock();
        let session = slot.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        Ok(f(session))
    }

    /// Replace the active session wholesale.
    pub fn install(&self, session: Session) -> u64 {
        let mut slot = self.lock();
        slot.session = Some(session);
        slot.generation += 1;
        slot.generation
    }

    /// Reset the active session in place.
    pub fn reset(&self, pattern: Pattern) -> Result<u64, SessionError> {
        let mut slot = self.lock();
        let session = slot.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.reset(pattern);
        let max_step = session.max_step();
        slot.generation += 1;
        Ok(max_step)
    }

    /// Bump the generation so in-flight batches stop at their next step.
    pub fn invalidate(&self) {
        self.lock().generation += 1;
    }

    pub fn is_active(&self) -> bool {
        self.lock().session.is_some()
    }

    /// Generation and maximum step of the active session.
    pub fn position(&self) -> Result<(u64, u64), SessionError> {
        let slot = self.lock();
        let session = slot.session.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok((slot.generation, session.max_step()))
    }

    /// Take one step under the lock if `allow` agrees and, when `generation`
    /// is given, the session has not been replaced since.
    ///
    /// `allow` is evaluated while the lock is held.
    pub fn step_if(
        &self,
        generation: Option<u64>,
        allow: impl FnOnce() -> bool,
    ) -> Result<TickOutcome, SessionError> {
        let mut slot = self.lock();
        if generation.is_some_and(|g| g != slot.generation) || !allow() {
            return Ok(TickOutcome::Skipped);
        }
        let session = slot.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.step().map(TickOutcome::Stepped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot_reports_no_session() {
        let shared = SharedSession::new();
        assert_eq!(
            shared.with(|s| s.max_step()),
            Err(SessionError::NoActiveSession)
        );
        assert_eq!(
            shared.step_if(None, || true),
            Err(SessionError::NoActiveSession)
        );
        assert_eq!(
            shared.reset(Pattern::Stripes),
            Err(SessionError::NoActiveSession)
        );
    }

    #[test]
    fn test_generation_guards_steps() {
        let shared = SharedSession::new();
        let generation = shared.install(Session::init(8, 8).unwrap());

        assert_eq!(
            shared.step_if(Some(generation), || true),
            Ok(TickOutcome::Stepped(1))
        );
        shared.reset(Pattern::Random).unwrap();
        assert_eq!(
            shared.step_if(Some(generation), || true),
            Ok(TickOutcome::Skipped)
        );
        assert_eq!(shared.step_if(None, || false), Ok(TickOutcome::Skipped));
        assert_eq!(shared.position(), Ok((generation + 1, 0)));
    }
}
