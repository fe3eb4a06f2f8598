// ============================================================================
// src/util/deadline.rs – Caller-supplied deadlines and bounded lock acquisition
// ============================================================================

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{StoreError, StoreResult};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Point in time after which a store operation must give up.
///
/// Created once by the caller and threaded through every store access that
/// belongs to the same request, so the whole request shares one budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    /// `StoreError::Timeout` once the budget is spent.
    pub fn check(&self) -> StoreResult<()> {
        if self.expired() {
            Err(StoreError::Timeout(self.budget))
        } else {
            Ok(())
        }
    }

    /// Retry `attempt` until it yields a value or the deadline passes.
    /// `attempt` returns `Ok(None)` for "busy, try again".
    pub(crate) fn poll<T>(
        &self,
        mut attempt: impl FnMut() -> StoreResult<Option<T>>,
    ) -> StoreResult<T> {
        self.check()?;
        loop {
            if let Some(value) = attempt()? {
                return Ok(value);
            }
            self.check()?;
            thread::sleep(POLL_INTERVAL.min(self.remaining()));
        }
    }
}

/// Acquire `mutex` before `deadline`.
///
/// Polls instead of blocking so a wedged holder turns into a
/// `StoreError::Timeout` rather than a hung authentication call.
pub fn lock_by<T>(mutex: &Mutex<T>, deadline: Deadline) -> StoreResult<MutexGuard<'_, T>> {
    deadline.poll(|| match mutex.try_lock() {
        Ok(guard) => Ok(Some(guard)),
        Err(TryLockError::Poisoned(_)) => Err(StoreError::Unavailable(
            "store lock poisoned by an earlier panic".into(),
        )),
        Err(TryLockError::WouldBlock) => Ok(None),
    })
}

/// Acquire `mutex`, giving up once `timeout` has elapsed.
pub fn lock_within<T>(mutex: &Mutex<T>, timeout: Duration) -> StoreResult<MutexGuard<'_, T>> {
    lock_by(mutex, Deadline::after(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_lock_is_acquired() {
        let m = Mutex::new(1);
        let guard = lock_within(&m, Duration::from_millis(10)).unwrap();
        assert_eq!(*guard, 1);
    }

    #[test]
    fn held_lock_times_out() {
        let m = Mutex::new(());
        let _held = m.lock().unwrap();
        let err = lock_within(&m, Duration::from_millis(20)).unwrap_err();
        assert_eq!(err, StoreError::Timeout(Duration::from_millis(20)));
    }

    #[test]
    fn spent_deadline_refuses_even_a_free_lock() {
        let m = Mutex::new(());
        let spent = Deadline::after(Duration::ZERO);
        assert!(spent.expired());
        assert_eq!(
            lock_by(&m, spent).unwrap_err(),
            StoreError::Timeout(Duration::ZERO)
        );
    }

    #[test]
    fn one_deadline_bounds_several_waits() {
        let m = Mutex::new(());
        let _held = m.lock().unwrap();
        let deadline = Deadline::after(Duration::from_millis(30));
        let start = Instant::now();
        assert!(lock_by(&m, deadline).is_err());
        assert!(lock_by(&m, deadline).is_err());
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
