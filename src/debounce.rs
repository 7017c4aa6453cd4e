use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Handle for one pending action. Issuing a new action for the same key
/// invalidates the previous token, so a holder can also cancel explicitly
/// without racing a reschedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token(u64);

struct Pending<A> {
    token: Token,
    deadline: Instant,
    action: A,
}

/// Keyed single-shot timers driven by the UI loop.
///
/// At most one pending action exists per key: scheduling again for the same
/// key drops the earlier action before arming the new one. The scheduler
/// spawns no threads; the owner calls `fire_due` from its event loop and
/// executes whatever came due. Time is passed in explicitly so behavior is
/// deterministic under test.
pub struct DebounceScheduler<K, A> {
    pending: HashMap<K, Pending<A>>,
    next_token: u64,
}

impl<K: Eq + Hash + Clone, A> DebounceScheduler<K, A> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_token: 0,
        }
    }

    /// Arm `action` to fire once `delay` after `now`, replacing any action
    /// previously pending for `key`.
    pub fn schedule(&mut self, key: K, delay: Duration, action: A, now: Instant) -> Token {
        self.next_token += 1;
        let token = Token(self.next_token);
        self.pending.insert(
            key,
            Pending {
                token,
                deadline: now + delay,
                action,
            },
        );
        token
    }

    /// Scroll-settle variant: repeated calls keep pushing the deadline out,
    /// so the action fires exactly once, after the last call's quiet window.
    /// Identical to `schedule` under the one-pending-per-key invariant; the
    /// separate name keeps call sites honest about intent.
    pub fn settle(&mut self, key: K, delay: Duration, action: A, now: Instant) -> Token {
        self.schedule(key, delay, action, now)
    }

    /// Drop the pending action identified by `token`, if it is still the
    /// current one for its key. A stale token (already superseded or fired)
    /// is a no-op.
    pub fn cancel(&mut self, token: Token) {
        self.pending.retain(|_, p| p.token != token);
    }

    /// Drop whatever is pending for `key`.
    pub fn cancel_key(&mut self, key: &K) {
        self.pending.remove(key);
    }

    /// Remove and return every action whose deadline has passed.
    pub fn fire_due(&mut self, now: Instant) -> Vec<A> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        due.into_iter()
            .filter_map(|k| self.pending.remove(&k))
            .map(|p| p.action)
            .collect()
    }

    /// Earliest pending deadline, used to pick a repaint delay.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
