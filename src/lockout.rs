// ============================================================================
// src/lockout.rs – Per-identity progressive and injection lockout
// ============================================================================
//! Lockout state machine over persisted [`SecurityRecord`]s.
//!
//! Every mutation is a single [`SecurityStateStore::update`] call so that
//! concurrent attempts against one identity cannot lose an increment or skip
//! an escalation tier. Expiry is lazy: a lock is over once `locked_until`
//! passes, whether or not anything has rewritten the record since.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::model::{LockoutReason, SecurityRecord};
use crate::store::SecurityStateStore;
use crate::util::deadline::Deadline;

/// Store budget for operations called without an explicit deadline.
pub const DEFAULT_STORE_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// Escalation tiers for consecutive failures plus the fixed injection window.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// `(min_failures, lock_for)`, ascending by `min_failures`.
    tiers: Vec<(u32, Duration)>,
    injection_lock: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                (3, Duration::minutes(15)),
                (4, Duration::hours(1)),
                (5, Duration::hours(24)),
            ],
            injection_lock: Duration::hours(24),
        }
    }
}

impl LockoutPolicy {
    /// Lock window for the given failure count; `None` below the first tier.
    pub fn lock_duration(&self, failures: u32) -> Option<Duration> {
        self.tiers
            .iter()
            .rev()
            .find(|(min, _)| failures >= *min)
            .map(|(_, duration)| *duration)
    }

    pub fn injection_lock(&self) -> Duration {
        self.injection_lock
    }
}

/// Read-only snapshot of an identity's lockout state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockoutInfo {
    pub locked: bool,
    pub seconds_remaining: i64,
    pub failures: u32,
    pub reason: Option<LockoutReason>,
    pub detail: Option<String>,
    pub is_injection_reason: bool,
}

impl LockoutInfo {
    fn from_record(record: Option<&SecurityRecord>, now: DateTime<Utc>) -> Self {
        match record {
            Some(r) => Self {
                locked: r.is_locked_at(now),
                seconds_remaining: r.seconds_remaining_at(now),
                failures: r.consecutive_failures,
                reason: r.lockout_reason,
                detail: r.lockout_detail.clone(),
                is_injection_reason: r.is_injection_flagged(),
            },
            None => Self {
                locked: false,
                seconds_remaining: 0,
                failures: 0,
                reason: None,
                detail: None,
                is_injection_reason: false,
            },
        }
    }
}

pub struct LockoutEngine {
    store: Arc<dyn SecurityStateStore>,
    clock: Arc<dyn Clock>,
    policy: LockoutPolicy,
    timeout: StdDuration,
}

impl LockoutEngine {
    pub fn new(store: Arc<dyn SecurityStateStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            policy: LockoutPolicy::default(),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Budget for operations that are not handed a [`Deadline`].
    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A fresh deadline spanning the configured store budget.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }

    pub fn is_locked(&self, identity: &str) -> StoreResult<bool> {
        Ok(self.lockout_info(identity)?.locked)
    }

    pub fn lockout_info(&self, identity: &str) -> StoreResult<LockoutInfo> {
        self.lockout_info_by(identity, self.deadline())
    }

    pub fn lockout_info_by(
        &self,
        identity: &str,
        deadline: Deadline,
    ) -> StoreResult<LockoutInfo> {
        let now = self.clock.now();
        let record = self.store.get(identity, deadline)?;
        Ok(LockoutInfo::from_record(record.as_ref(), now))
    }

    /// Count a failed credential check. Ignored while the identity is locked.
    pub fn record_failure(&self, identity: &str) -> StoreResult<LockoutInfo> {
        self.record_failure_by(identity, self.deadline())
    }

    pub fn record_failure_by(
        &self,
        identity: &str,
        deadline: Deadline,
    ) -> StoreResult<LockoutInfo> {
        let now = self.clock.now();
        let policy = &self.policy;
        let mut transition = |current: Option<&SecurityRecord>| {
            if current.is_some_and(|r| r.is_locked_at(now)) {
                return None;
            }
            let mut next = current
                .cloned()
                .unwrap_or_else(|| SecurityRecord::new(identity));
            next.consecutive_failures = next.consecutive_failures.saturating_add(1);
            next.last_failure_at = Some(now);
            if let Some(lock_for) = policy.lock_duration(next.consecutive_failures) {
                next.locked_until = Some(now + lock_for);
                if !next.is_injection_flagged() {
                    next.lockout_reason = Some(LockoutReason::Progressive);
                    next.lockout_detail = Some(format!(
                        "{} consecutive failed attempts",
                        next.consecutive_failures
                    ));
                }
            }
            Some(next)
        };
        let stored = self.store.update(identity, &mut transition, deadline)?;

        let info = LockoutInfo::from_record(stored.as_ref(), now);
        if info.locked {
            warn!(
                identity,
                failures = info.failures,
                seconds = info.seconds_remaining,
                "account locked after repeated failures"
            );
        } else {
            info!(identity, failures = info.failures, "failed login recorded");
        }
        Ok(info)
    }

    /// Clear progressive state after a successful login. Injection-flagged
    /// records are left exactly as they are.
    pub fn record_success(&self, identity: &str) -> StoreResult<LockoutInfo> {
        self.record_success_by(identity, self.deadline())
    }

    pub fn record_success_by(
        &self,
        identity: &str,
        deadline: Deadline,
    ) -> StoreResult<LockoutInfo> {
        let now = self.clock.now();
        let mut transition = |current: Option<&SecurityRecord>| {
            let record = current?;
            if record.is_injection_flagged() {
                return None;
            }
            if record.consecutive_failures == 0
                && record.locked_until.is_none()
                && record.lockout_reason.is_none()
            {
                return None;
            }
            let mut next = record.clone();
            next.consecutive_failures = 0;
            next.locked_until = None;
            next.lockout_reason = None;
            next.lockout_detail = None;
            Some(next)
        };
        let stored = self.store.update(identity, &mut transition, deadline)?;
        Ok(LockoutInfo::from_record(stored.as_ref(), now))
    }

    pub fn record_outcome(&self, identity: &str, success: bool) -> StoreResult<LockoutInfo> {
        if success {
            self.record_success(identity)
        } else {
            self.record_failure(identity)
        }
    }

    /// Lock `identity` for the injection window, whatever its current state.
    pub fn force_injection_lock(&self, identity: &str, pattern: &str) -> StoreResult<LockoutInfo> {
        self.force_injection_lock_by(identity, pattern, self.deadline())
    }

    pub fn force_injection_lock_by(
        &self,
        identity: &str,
        pattern: &str,
        deadline: Deadline,
    ) -> StoreResult<LockoutInfo> {
        let now = self.clock.now();
        let until = now + self.policy.injection_lock();
        let mut transition = |current: Option<&SecurityRecord>| {
            let mut next = current
                .cloned()
                .unwrap_or_else(|| SecurityRecord::new(identity));
            next.consecutive_failures = 0;
            next.locked_until = Some(until);
            next.lockout_reason = Some(LockoutReason::Injection);
            next.lockout_detail = Some(format!("SQL injection attempt: {pattern}"));
            next.last_failure_at = Some(now);
            Some(next)
        };
        let stored = self.store.update(identity, &mut transition, deadline)?;
        warn!(identity, pattern, until = %until, "immediate injection lockout applied");
        Ok(LockoutInfo::from_record(stored.as_ref(), now))
    }

    /// Manual reset. Same rules as a successful login: injection flags stay.
    pub fn reset(&self, identity: &str) -> StoreResult<LockoutInfo> {
        info!(identity, "manual lockout reset requested");
        self.record_success(identity)
    }

    /// Administrative override: clears counters, any lock and the injection
    /// flag.
    pub fn admin_override(&self, identity: &str) -> StoreResult<LockoutInfo> {
        let now = self.clock.now();
        let mut transition = |current: Option<&SecurityRecord>| {
            let mut next = current?.clone();
            next.consecutive_failures = 0;
            next.locked_until = None;
            next.lockout_reason = None;
            next.lockout_detail = None;
            Some(next)
        };
        let stored = self
            .store
            .update(identity, &mut transition, self.deadline())?;
        warn!(identity, "administrative lockout override applied");
        Ok(LockoutInfo::from_record(stored.as_ref(), now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::store::MemorySecurityStore;
    use std::sync::Barrier;
    use std::thread;

    fn engine() -> (LockoutEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = LockoutEngine::new(Arc::new(MemorySecurityStore::new()))
            .with_clock(clock.clone());
        (engine, clock)
    }

    #[test]
    fn policy_tiers() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.lock_duration(0), None);
        assert_eq!(policy.lock_duration(2), None);
        assert_eq!(policy.lock_duration(3), Some(Duration::minutes(15)));
        assert_eq!(policy.lock_duration(4), Some(Duration::hours(1)));
        assert_eq!(policy.lock_duration(5), Some(Duration::hours(24)));
        assert_eq!(policy.lock_duration(40), Some(Duration::hours(24)));
    }

    #[test]
    fn unseen_identity_is_clear() {
        let (engine, _) = engine();
        assert!(!engine.is_locked("nobody").unwrap());
        let info = engine.lockout_info("nobody").unwrap();
        assert_eq!(info.failures, 0);
        assert!(!info.locked);
        assert_eq!(info.reason, None);
    }

    #[test]
    fn escalates_through_three_tiers() {
        let (engine, clock) = engine();

        engine.record_failure("bob").unwrap();
        engine.record_failure("bob").unwrap();
        assert!(!engine.is_locked("bob").unwrap());

        let third = engine.record_failure("bob").unwrap();
        assert!(third.locked);
        assert_eq!(third.seconds_remaining, 15 * 60);
        assert_eq!(third.reason, Some(LockoutReason::Progressive));
        assert!(!third.is_injection_reason);

        clock.advance(Duration::minutes(15));
        assert!(!engine.is_locked("bob").unwrap());
        let fourth = engine.record_failure("bob").unwrap();
        assert_eq!(fourth.failures, 4);
        assert_eq!(fourth.seconds_remaining, 3600);

        clock.advance(Duration::hours(1));
        let fifth = engine.record_failure("bob").unwrap();
        assert_eq!(fifth.seconds_remaining, 24 * 3600);

        clock.advance(Duration::hours(24));
        let sixth = engine.record_failure("bob").unwrap();
        assert_eq!(sixth.failures, 6);
        assert_eq!(sixth.seconds_remaining, 24 * 3600);
    }

    #[test]
    fn failures_during_a_lock_are_not_counted() {
        let (engine, clock) = engine();
        for _ in 0..3 {
            engine.record_failure("bob").unwrap();
        }
        clock.advance(Duration::minutes(5));
        let info = engine.record_failure("bob").unwrap();
        assert_eq!(info.failures, 3);
        assert_eq!(info.seconds_remaining, 10 * 60);
    }

    #[test]
    fn expired_lock_keeps_stored_count() {
        let (engine, clock) = engine();
        for _ in 0..3 {
            engine.record_failure("bob").unwrap();
        }
        clock.advance(Duration::minutes(16));
        let info = engine.lockout_info("bob").unwrap();
        assert!(!info.locked);
        assert_eq!(info.seconds_remaining, 0);
        assert_eq!(info.failures, 3);
        assert_eq!(info.reason, Some(LockoutReason::Progressive));
    }

    #[test]
    fn injection_lock_overrides_progressive_state() {
        let (engine, _) = engine();
        engine.record_failure("eve").unwrap();
        engine.record_failure("eve").unwrap();

        let info = engine
            .force_injection_lock("eve", "UNION-based injection")
            .unwrap();
        assert!(info.locked);
        assert!(info.is_injection_reason);
        assert_eq!(info.failures, 0);
        assert_eq!(info.seconds_remaining, 24 * 3600);
        assert_eq!(
            info.detail.as_deref(),
            Some("SQL injection attempt: UNION-based injection")
        );
    }

    #[test]
    fn success_clears_progressive_but_not_injection() {
        let (engine, clock) = engine();
        for _ in 0..3 {
            engine.record_failure("bob").unwrap();
        }
        let cleared = engine.record_success("bob").unwrap();
        assert!(!cleared.locked);
        assert_eq!(cleared.failures, 0);
        assert_eq!(cleared.reason, None);

        engine.force_injection_lock("eve", "SQL Comment").unwrap();
        let kept = engine.record_success("eve").unwrap();
        assert!(kept.locked);
        assert!(kept.is_injection_reason);

        // The flag outlives the window.
        clock.advance(Duration::hours(25));
        let expired = engine.record_success("eve").unwrap();
        assert!(!expired.locked);
        assert!(expired.is_injection_reason);
    }

    #[test]
    fn manual_reset_respects_injection_flag_but_override_does_not() {
        let (engine, _) = engine();
        engine.force_injection_lock("eve", "SQL Comment").unwrap();

        assert!(engine.reset("eve").unwrap().locked);

        let cleared = engine.admin_override("eve").unwrap();
        assert!(!cleared.locked);
        assert!(!cleared.is_injection_reason);
        assert_eq!(cleared.detail, None);
    }

    #[test]
    fn failures_after_injection_expiry_keep_the_flag() {
        let (engine, clock) = engine();
        engine.force_injection_lock("eve", "SQL Comment").unwrap();
        clock.advance(Duration::hours(24));

        for _ in 0..3 {
            engine.record_failure("eve").unwrap();
        }
        let info = engine.lockout_info("eve").unwrap();
        assert!(info.locked);
        assert_eq!(info.seconds_remaining, 15 * 60);
        assert!(info.is_injection_reason);
    }

    #[test]
    fn reset_on_unknown_identity_creates_nothing() {
        let store = Arc::new(MemorySecurityStore::new());
        let engine = LockoutEngine::new(store.clone());
        engine.reset("ghost").unwrap();
        engine.admin_override("ghost").unwrap();
        assert!(store.get("ghost", engine.deadline()).unwrap().is_none());
    }

    #[test]
    fn spent_deadline_fails_without_counting() {
        let (engine, _) = engine();
        let spent = Deadline::after(StdDuration::ZERO);
        assert!(matches!(
            engine.record_failure_by("bob", spent),
            Err(StoreError::Timeout(_))
        ));
        assert!(matches!(
            engine.force_injection_lock_by("bob", "SQL Comment", spent),
            Err(StoreError::Timeout(_))
        ));
        let info = engine.lockout_info("bob").unwrap();
        assert_eq!(info.failures, 0);
        assert_eq!(info.reason, None);
    }

    #[test]
    fn racing_failures_cross_the_first_tier_once() {
        let (engine, _) = engine();
        let engine = Arc::new(engine);
        let start = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    engine.record_failure("bob").unwrap()
                })
            })
            .collect();
        let results: Vec<LockoutInfo> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        let mut before_lock: Vec<u32> = results
            .iter()
            .filter(|i| !i.locked)
            .map(|i| i.failures)
            .collect();
        before_lock.sort_unstable();
        assert_eq!(before_lock, vec![1, 2]);
        assert!(results.iter().filter(|i| i.locked).all(|i| i.failures == 3));

        // One caller set the 15 minute lock; nobody escalated past it.
        let info = engine.lockout_info("bob").unwrap();
        assert_eq!(info.failures, 3);
        assert_eq!(info.seconds_remaining, 15 * 60);
    }
}
