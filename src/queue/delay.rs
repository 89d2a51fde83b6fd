//! # Coalescing delay queue.
//!
//! [`DelayQueue`] holds pending entries ordered by their eligibility time
//! ("stamp"). A second offer with the same identity key does not add an entry:
//! it pushes the existing entry's stamp forward, bounded by a hard deadline
//! ("max stamp") fixed at first occurrence.
//!
//! ## Timeline
//! ```text
//! min = 2s, max = 10s
//!
//! t=0   offer(k)   → Inserted  stamp=2  max=10
//! t=1   offer(k)   → Merged    stamp=3
//! t=9   offer(k)   → Merged    stamp=min(11, 10)=10
//! t=10  take()     → Live(k)   (deadline reached, cannot be deferred further)
//! ```
//!
//! ## Rules
//! - `stamp ≤ max_stamp` always; only the forced merge may raise `max_stamp`.
//! - A plain merge never moves `stamp` backwards, even after `set_delays` lowered `min`.
//! - The poison sentinel orders before every live entry and is always due.
//! - Equal stamps are ordered by insertion (no other fairness guarantee).
//! - Merging keeps the payload built at first occurrence; `make` runs only on insert.
//! - `offer_*` and `drain_to` never block; `take` is the only waiting operation.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::error::BusError;

/// Eligibility delay and deferral ceiling applied to offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delays {
    min: Duration,
    max: Duration,
}

impl Delays {
    /// Creates validated delays; `min` must not exceed `max`.
    pub fn new(min: Duration, max: Duration) -> Result<Self, BusError> {
        if min > max {
            return Err(BusError::InvalidDelays { min, max });
        }
        Ok(Self { min, max })
    }

    /// Delay applied to a fresh entry and re-applied on every merge.
    #[inline]
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Cap on how long an entry may be deferred from its first occurrence.
    #[inline]
    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for Delays {
    /// `min = 2s`, `max = 10s`.
    fn default() -> Self {
        Self {
            min: Duration::from_secs(2),
            max: Duration::from_secs(10),
        }
    }
}

/// Outcome of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// No pending entry matched; a new one was queued.
    Inserted,
    /// A pending entry matched and its stamp was reset.
    Merged,
}

/// A live queued value with its eligibility window.
#[derive(Debug)]
pub struct Delayed<T> {
    value: T,
    stamp: Instant,
    max_stamp: Instant,
    merges: u32,
}

impl<T> Delayed<T> {
    fn new(value: T, now: Instant, delays: Delays) -> Self {
        Self {
            value,
            stamp: now + delays.min,
            max_stamp: now + delays.max,
            merges: 0,
        }
    }

    /// Moves the stamp to `now + min`, never past `max_stamp` and never backwards.
    fn reset(&mut self, now: Instant, min: Duration) {
        let next = (now + min).min(self.max_stamp);
        self.stamp = self.stamp.max(next);
        self.merges = self.merges.saturating_add(1);
    }

    /// Like [`reset`](Self::reset), but an entry already past its deadline gets a new one.
    fn force_reset(&mut self, now: Instant, min: Duration) {
        let next = now + min;
        if now >= self.max_stamp {
            self.max_stamp = next;
        }
        self.stamp = next.min(self.max_stamp);
        self.merges = self.merges.saturating_add(1);
    }

    /// Borrow the payload.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Take the payload.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Earliest instant at which the entry was eligible.
    pub fn stamp(&self) -> Instant {
        self.stamp
    }

    /// Deadline the stamp was bounded by.
    pub fn max_stamp(&self) -> Instant {
        self.max_stamp
    }

    /// Number of offers merged into this entry after the first.
    pub fn merges(&self) -> u32 {
        self.merges
    }

    /// Remaining delay at `now` (zero once eligible).
    pub fn delay(&self, now: Instant) -> Duration {
        self.stamp.saturating_duration_since(now)
    }
}

/// Item handed out by [`DelayQueue::take`] and [`DelayQueue::drain_to`].
#[derive(Debug)]
pub enum QueueEntry<T> {
    /// Shutdown sentinel.
    Poison,
    /// An entry whose delay has elapsed.
    Live(Delayed<T>),
}

impl<T> QueueEntry<T> {
    /// True for the shutdown sentinel.
    pub fn is_poison(&self) -> bool {
        matches!(self, QueueEntry::Poison)
    }

    /// Returns the live entry, `None` for the sentinel.
    pub fn into_live(self) -> Option<Delayed<T>> {
        match self {
            QueueEntry::Live(d) => Some(d),
            QueueEntry::Poison => None,
        }
    }
}

/// Ordering key. Variant order makes `Poison` sort before every `Live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Poison,
    Live { stamp: Instant, seq: u64 },
}

impl Slot {
    #[inline]
    fn is_due(&self, now: Instant) -> bool {
        match self {
            Slot::Poison => true,
            Slot::Live { stamp, .. } => *stamp <= now,
        }
    }
}

enum Stored<K, T> {
    Poison,
    Live { key: K, entry: Delayed<T> },
}

struct State<K, T> {
    order: BTreeMap<Slot, Stored<K, T>>,
    index: HashMap<K, Slot>,
    next_seq: u64,
    delays: Delays,
}

impl<K: Hash + Eq + Clone, T> State<K, T> {
    fn offer(&mut self, key: K, make: impl FnOnce() -> T, now: Instant, forced: bool) -> Offer {
        let existing = self
            .index
            .remove(&key)
            .and_then(|slot| self.order.remove(&slot).map(|stored| (slot, stored)));

        if let Some((Slot::Live { seq, .. }, Stored::Live { key, mut entry })) = existing {
            if forced {
                entry.force_reset(now, self.delays.min);
            } else {
                entry.reset(now, self.delays.min);
            }
            let slot = Slot::Live {
                stamp: entry.stamp,
                seq,
            };
            self.index.insert(key.clone(), slot);
            self.order.insert(slot, Stored::Live { key, entry });
            return Offer::Merged;
        }

        let entry = Delayed::new(make(), now, self.delays);
        let slot = Slot::Live {
            stamp: entry.stamp,
            seq: self.next_seq,
        };
        self.next_seq = self.next_seq.wrapping_add(1);
        self.index.insert(key.clone(), slot);
        self.order.insert(slot, Stored::Live { key, entry });
        Offer::Inserted
    }

    fn pop_due(&mut self, now: Instant) -> Option<QueueEntry<T>> {
        let first = self.order.first_entry()?;
        if !first.key().is_due(now) {
            return None;
        }
        match first.remove() {
            Stored::Poison => Some(QueueEntry::Poison),
            Stored::Live { key, entry } => {
                self.index.remove(&key);
                Some(QueueEntry::Live(entry))
            }
        }
    }

    fn next_stamp(&self) -> Option<Instant> {
        match self.order.first_key_value()? {
            (Slot::Poison, _) => Some(Instant::now()),
            (Slot::Live { stamp, .. }, _) => Some(*stamp),
        }
    }
}

/// Thread-safe, identity-coalescing priority queue keyed by eligibility time.
///
/// ### Properties
/// - **Coalescing**: offers with an equal key merge into the pending entry.
/// - **Bounded deferral**: a merged entry is due no later than `max` after its first offer.
/// - **Single waiter**: `take` is meant for one consumer; producers may be many.
pub struct DelayQueue<K, T> {
    state: Mutex<State<K, T>>,
    wake: Notify,
    running: AtomicBool,
}

impl<K: Hash + Eq + Clone, T> DelayQueue<K, T> {
    /// Creates an empty, running queue.
    pub fn new(delays: Delays) -> Self {
        Self {
            state: Mutex::new(State {
                order: BTreeMap::new(),
                index: HashMap::new(),
                next_seq: 0,
                delays,
            }),
            wake: Notify::new(),
            running: AtomicBool::new(true),
        }
    }

    /// Inserts a new entry for `key`, or resets the stamp of the pending one.
    ///
    /// `make` builds the payload and is only called on insert.
    pub fn offer_or_merge(&self, key: K, make: impl FnOnce() -> T) -> Offer {
        self.offer(key, make, false)
    }

    /// Same as [`offer_or_merge`](Self::offer_or_merge), but a matching entry
    /// already past its deadline gets a fresh one (`now + min`) instead of
    /// staying due.
    pub fn offer_or_force_merge(&self, key: K, make: impl FnOnce() -> T) -> Offer {
        self.offer(key, make, true)
    }

    fn offer(&self, key: K, make: impl FnOnce() -> T, forced: bool) -> Offer {
        let now = Instant::now();
        let offer = self.state.lock().offer(key, make, now, forced);
        tracing::trace!(?offer, forced, "delay queue offer");
        self.wake.notify_one();
        offer
    }

    /// Waits until the head entry is due, then removes and returns it.
    ///
    /// The poison sentinel is returned as soon as it reaches the head.
    pub async fn take(&self) -> QueueEntry<T> {
        loop {
            let next = {
                let mut state = self.state.lock();
                if let Some(entry) = state.pop_due(Instant::now()) {
                    return entry;
                }
                state.next_stamp()
            };

            match next {
                Some(at) => {
                    tokio::select! {
                        _ = self.wake.notified() => {}
                        _ = time::sleep_until(at) => {}
                    }
                }
                None => self.wake.notified().await,
            }
        }
    }

    /// Moves every currently due entry into `out`, stopping at the first one
    /// that is not due yet. Returns how many were moved.
    pub fn drain_to(&self, out: &mut Vec<QueueEntry<T>>) -> usize {
        let mut state = self.state.lock();
        let now = Instant::now();
        let before = out.len();
        while let Some(entry) = state.pop_due(now) {
            out.push(entry);
        }
        out.len() - before
    }

    /// Clears the running flag and queues the poison so a blocked `take` returns.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.state.lock().order.insert(Slot::Poison, Stored::Poison);
        self.wake.notify_one();
    }

    /// False once [`shutdown`](Self::shutdown) was called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of live pending entries.
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// True if no live entry is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delays applied to offers.
    pub fn delays(&self) -> Delays {
        self.state.lock().delays
    }

    /// Replaces the delays used by later offers; pending stamps are untouched.
    pub fn set_delays(&self, delays: Delays) {
        self.state.lock().delays = delays;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn queue() -> DelayQueue<&'static str, u32> {
        DelayQueue::new(Delays::default())
    }

    fn drain(q: &DelayQueue<&'static str, u32>) -> Vec<QueueEntry<u32>> {
        let mut out = Vec::new();
        q.drain_to(&mut out);
        out
    }

    #[test]
    fn delays_reject_min_above_max() {
        let err = Delays::new(Duration::from_secs(5), Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.as_label(), "bus_invalid_delays");
        assert!(Delays::new(Duration::from_secs(1), Duration::from_secs(1)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_waits_min_delay() {
        let q = queue();
        assert_eq!(q.offer_or_merge("a", || 1), Offer::Inserted);

        time::advance(Duration::from_millis(1999)).await;
        assert!(drain(&q).is_empty());

        time::advance(Duration::from_millis(1)).await;
        let out = drain(&q);
        assert_eq!(out.len(), 1);
        assert!(q.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn merge_pushes_stamp_and_keeps_first_payload() {
        let q = queue();
        let built = AtomicUsize::new(0);
        let make = |v: u32| {
            built.fetch_add(1, Ordering::SeqCst);
            v
        };

        assert_eq!(q.offer_or_merge("a", || make(1)), Offer::Inserted);
        time::advance(Duration::from_secs(1)).await;
        assert_eq!(q.offer_or_merge("a", || make(2)), Offer::Merged);
        assert_eq!(q.len(), 1);

        time::advance(Duration::from_secs(1)).await;
        assert!(drain(&q).is_empty(), "merge must defer past the original stamp");

        time::advance(Duration::from_secs(1)).await;
        let entry = drain(&q).pop().and_then(QueueEntry::into_live).unwrap();
        assert_eq!(*entry.value(), 1);
        assert_eq!(entry.merges(), 1);
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn merge_is_clamped_by_max_stamp() {
        let q = queue();
        let start = Instant::now();
        q.offer_or_merge("a", || 1);
        for _ in 0..9 {
            time::advance(Duration::from_secs(1)).await;
            assert_eq!(q.offer_or_merge("a", || 0), Offer::Merged);
        }
        // t=9: next stamp would be 11, clamped to 10.
        time::advance(Duration::from_millis(999)).await;
        assert!(drain(&q).is_empty());

        time::advance(Duration::from_millis(1)).await;
        let entry = drain(&q).pop().and_then(QueueEntry::into_live).unwrap();
        assert_eq!(entry.stamp(), entry.max_stamp());
        assert_eq!(entry.max_stamp() - start, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn merge_on_overdue_entry_keeps_it_due() {
        let q = queue();
        q.offer_or_merge("a", || 1);
        time::advance(Duration::from_secs(12)).await;

        assert_eq!(q.offer_or_merge("a", || 2), Offer::Merged);
        assert_eq!(drain(&q).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_merge_extends_overdue_deadline() {
        let q = queue();
        let start = Instant::now();
        q.offer_or_merge("a", || 1);
        time::advance(Duration::from_secs(10)).await;

        assert_eq!(q.offer_or_force_merge("a", || 2), Offer::Merged);
        assert!(drain(&q).is_empty());

        time::advance(Duration::from_secs(2)).await;
        let entry = drain(&q).pop().and_then(QueueEntry::into_live).unwrap();
        assert_eq!(entry.max_stamp() - start, Duration::from_secs(12));
        assert_eq!(entry.stamp(), entry.max_stamp());
    }

    #[tokio::test(start_paused = true)]
    async fn forced_merge_within_deadline_is_clamped() {
        let q = queue();
        let start = Instant::now();
        q.offer_or_merge("a", || 1);
        time::advance(Duration::from_secs(9)).await;

        q.offer_or_force_merge("a", || 2);
        time::advance(Duration::from_secs(1)).await;
        let entry = drain(&q).pop().and_then(QueueEntry::into_live).unwrap();
        assert_eq!(entry.stamp() - start, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_stops_at_first_entry_not_due() {
        let q = queue();
        q.offer_or_merge("a", || 1);
        time::advance(Duration::from_secs(1)).await;
        q.offer_or_merge("b", || 2);
        time::advance(Duration::from_secs(1)).await;

        let out = drain(&q);
        assert_eq!(out.len(), 1);
        assert_eq!(q.len(), 1);

        // "a" left the index, so it starts a new entry.
        assert_eq!(q.offer_or_merge("a", || 3), Offer::Inserted);
    }

    #[tokio::test(start_paused = true)]
    async fn poison_sorts_before_due_entries() {
        let q = queue();
        q.offer_or_merge("a", || 1);
        time::advance(Duration::from_secs(3)).await;
        q.shutdown();

        let out = drain(&q);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_poison());
        assert!(!out[1].is_poison());
        assert!(!q.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn take_waits_for_the_stamp() {
        let q = queue();
        let start = Instant::now();
        q.offer_or_merge("a", || 7);

        let entry = q.take().await.into_live().unwrap();
        assert_eq!(*entry.value(), 7);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn take_follows_a_merge_made_while_waiting() {
        let q = Arc::new(queue());
        let start = Instant::now();
        q.offer_or_merge("a", || 1);

        let taker = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.take().await.into_live().map(Delayed::into_inner) })
        };

        time::sleep(Duration::from_secs(1)).await;
        q.offer_or_merge("a", || 2);

        assert_eq!(taker.await.unwrap(), Some(1));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_wakes_a_blocked_take() {
        let q = Arc::new(queue());
        let start = Instant::now();
        let taker = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.take().await.is_poison() })
        };

        tokio::task::yield_now().await;
        q.shutdown();

        assert!(taker.await.unwrap());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn new_delays_apply_to_later_offers_only() {
        let q = queue();
        let start = Instant::now();
        q.offer_or_merge("a", || 1);
        q.set_delays(Delays::new(Duration::from_secs(5), Duration::from_secs(20)).unwrap());
        q.offer_or_merge("b", || 2);

        let first = q.take().await.into_live().unwrap();
        assert_eq!(first.stamp() - start, Duration::from_secs(2));
        let second = q.take().await.into_live().unwrap();
        assert_eq!(second.stamp() - start, Duration::from_secs(5));
        assert_eq!(q.delays().max(), Duration::from_secs(20));
    }
}
