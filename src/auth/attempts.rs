//! Per-identity failed attempt tracking with lockout.
//!
//! Every failed authentication increments a counter for the caller's
//! identity. Once the counter reaches the configured threshold the identity
//! is locked out for a fixed window. A background reaper keeps the map
//! bounded; a hard capacity cap protects against massively distributed
//! probing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Failures allowed before an identity is locked.
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
/// Length of a lockout window.
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(15 * 60);
/// How long past its lockout a record is kept before it is reaped.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30 * 60);
/// Hard cap on tracked identities.
pub const DEFAULT_MAX_TRACKED_IDENTITIES: usize = 10_000;
/// Interval between reaper sweeps.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Stand-in deadline when `now + duration` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Tunables for the attempt tracker.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    /// Failures that trigger a lockout.
    pub max_failures: u32,
    /// Duration of a lockout.
    pub lockout: Duration,
    /// Grace period after a lockout ends before the record is reaped.
    pub stale_after: Duration,
    /// Maximum number of identities tracked at once.
    pub max_identities: usize,
    /// Reaper sweep interval.
    pub reap_interval: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout: DEFAULT_LOCKOUT,
            stale_after: DEFAULT_STALE_AFTER,
            max_identities: DEFAULT_MAX_TRACKED_IDENTITIES,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

/// Failure history for a single identity.
#[derive(Debug, Clone, Copy)]
pub struct AttemptRecord {
    /// Consecutive failures since the last success.
    pub failure_count: u32,
    /// End of the current lockout, set only once the threshold is reached.
    pub locked_until: Option<Instant>,
    /// Time of the most recent failure.
    pub last_attempt: Instant,
}

impl AttemptRecord {
    fn new(now: Instant) -> Self {
        Self {
            failure_count: 0,
            locked_until: None,
            last_attempt: now,
        }
    }

    fn is_locked_at(&self, now: Instant) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// Tracks failed attempts per identity.
pub struct AttemptTracker {
    records: RwLock<HashMap<String, AttemptRecord>>,
    policy: LockoutPolicy,
}

impl AttemptTracker {
    /// Create a tracker with the given policy.
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// The policy this tracker enforces.
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Record a failed attempt.
    ///
    /// Returns `true` when this failure puts the identity into lockout. When
    /// the tracker is at capacity and an inline sweep frees nothing, the
    /// failure is dropped and `false` is returned.
    pub fn record_failure(&self, identity: &str) -> bool {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        if !records.contains_key(identity) && records.len() >= self.policy.max_identities {
            records.retain(|_, record| record.is_locked_at(now));

            if records.len() >= self.policy.max_identities {
                warn!(
                    identity = %identity,
                    tracked = records.len(),
                    "Attempt tracker at capacity, dropping failure record"
                );
                return false;
            }
        }

        let record = records
            .entry(identity.to_string())
            .or_insert_with(|| AttemptRecord::new(now));
        record.failure_count = record.failure_count.saturating_add(1);
        record.last_attempt = now;

        if record.failure_count >= self.policy.max_failures {
            record.locked_until = Some(deadline(now, self.policy.lockout));
            return true;
        }

        false
    }

    /// Whether the identity is currently locked out.
    pub fn is_locked(&self, identity: &str) -> bool {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .get(identity)
            .is_some_and(|record| record.is_locked_at(Instant::now()))
    }

    /// Forget all failures for the identity.
    pub fn reset(&self, identity: &str) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.remove(identity);
    }

    /// Current failure count for the identity (0 when untracked).
    pub fn failure_count(&self, identity: &str) -> u32 {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(identity).map_or(0, |record| record.failure_count)
    }

    /// Snapshot of the record for the identity.
    pub fn record(&self, identity: &str) -> Option<AttemptRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(identity).copied()
    }

    /// Number of identities being tracked.
    pub fn tracked_identities(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Purge stale records. Returns the number removed.
    ///
    /// A record is removed when its lockout (if any) has passed and it never
    /// reached the threshold, or when it is more than `stale_after` past the
    /// end of its lockout.
    pub fn reap(&self) -> usize {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let before = records.len();
        let max_failures = self.policy.max_failures;
        let stale_after = self.policy.stale_after;

        records.retain(|_, record| {
            let lock_passed = !record.is_locked_at(now);
            if lock_passed && record.failure_count < max_failures {
                return false;
            }
            match record.locked_until {
                // No representable purge time: keep it.
                Some(until) => until
                    .checked_add(stale_after)
                    .map_or(true, |purge_at| now <= purge_at),
                None => true,
            }
        });

        before - records.len()
    }

    /// Start the background reaper.
    ///
    /// The returned handle owns the task; stop it on shutdown.
    pub fn start_reaper(self: &Arc<Self>) -> ReaperHandle {
        let tracker = Arc::clone(self);
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);
        let period = self.policy.reap_interval.clamp(Duration::from_secs(1), FAR_FUTURE);

        let task = tokio::spawn(async move {
            let mut interval_timer =
                tokio::time::interval_at(deadline(Instant::now(), period), period);
            interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let removed = tracker.reap();
                        if removed > 0 {
                            debug!(
                                removed,
                                remaining = tracker.tracked_identities(),
                                "Reaped stale attempt records"
                            );
                        }
                    }
                    _ = stop_signal.notified() => break,
                }
            }
        });

        ReaperHandle {
            stop,
            task: Some(task),
        }
    }
}

/// `now + duration`, capped at a far-future instant instead of overflowing.
fn deadline(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

impl Default for AttemptTracker {
    fn default() -> Self {
        Self::new(LockoutPolicy::default())
    }
}

/// Owner of the reaper task.
///
/// Dropping the handle aborts the task.
pub struct ReaperHandle {
    stop: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Signal the reaper to stop and wait for it to exit.
    pub async fn stop(mut self) {
        self.stop.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Whether the reaper task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
