//! Keyed deadline queue.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use tracing::trace;

/// A set of pending deadlines, at most one per key.
///
/// Scheduling a key that is already pending moves it to the new deadline;
/// cancelling is by key. Keys that share a deadline come out in the order
/// they were scheduled.
#[derive(Debug)]
pub struct Timers<K> {
    /// Deadline order. The sequence number breaks ties.
    queue: BTreeMap<(Duration, u64), K>,
    /// Where each key sits in `queue`.
    index: HashMap<K, (Duration, u64)>,
    next_seq: u64,
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<K> Timers<K>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `key` to fire at `at`, replacing any earlier deadline for it.
    pub fn schedule(&mut self, key: K, at: Duration) {
        if let Some(slot) = self.index.remove(&key) {
            self.queue.remove(&slot);
        }
        let slot = (at, self.next_seq);
        self.next_seq += 1;
        trace!(?key, ?at, "timer scheduled");
        self.queue.insert(slot, key.clone());
        self.index.insert(key, slot);
    }

    /// Disarms `key`. Returns whether it was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(slot) => {
                self.queue.remove(&slot);
                trace!(?key, "timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// When `key` will fire, if it's pending.
    pub fn deadline(&self, key: &K) -> Option<Duration> {
        self.index.get(key).map(|(at, _)| *at)
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    /// Removes and returns one key whose deadline is at or before `now`.
    ///
    /// Call in a loop: handling one timer may schedule or cancel others,
    /// so the queue is re-read every time.
    pub fn pop_due(&mut self, now: Duration) -> Option<K> {
        let (&slot, _) = self.queue.first_key_value()?;
        if slot.0 > now {
            return None;
        }
        let key = self.queue.remove(&slot)?;
        self.index.remove(&key);
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
