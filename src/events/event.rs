//! # Cache change events.
//!
//! A [`CacheEvent`] says "something in this region changed": which region (or
//! the whole cache), which keys (or the whole region), what kind of change,
//! and optionally a [`Condition`] listeners may use to decide relevance.
//!
//! Events are built with consuming `with_*` setters and then handed to
//! [`EventBus::notify`](crate::EventBus::notify), which freezes them behind an `Arc`.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! `seq` and `at` are diagnostic only; they never take part in [`EventIdentity`].
//!
//! ## Example
//! ```rust
//! use cachebus::{CacheEvent, ChangeKind};
//!
//! let ev = CacheEvent::new(ChangeKind::Invalidate)
//!     .with_region("users")
//!     .with_key("user:42");
//!
//! assert_eq!(ev.kind(), ChangeKind::Invalidate);
//! assert_eq!(ev.region(), Some("users"));
//! assert!(ev.keys().any(|k| k == "user:42"));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Global id counter for conditions (identity of a predicate instance).
static CONDITION_ID: AtomicU64 = AtomicU64::new(0);

/// Classification of cache changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    /// A new entry was stored.
    Put,
    /// An existing entry was replaced.
    Update,
    /// Entries were marked stale and must be reloaded.
    Invalidate,
    /// Entries were removed.
    Remove,
    /// The whole scope (region or cache) was emptied.
    Clear,
}

impl ChangeKind {
    /// Short stable label for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ChangeKind::Put => "put",
            ChangeKind::Update => "update",
            ChangeKind::Invalidate => "invalidate",
            ChangeKind::Remove => "remove",
            ChangeKind::Clear => "clear",
        }
    }
}

/// Named predicate over cache keys carried by conditional events.
///
/// The bus never evaluates it; listeners call [`Condition::matches`] to filter.
/// Every `Condition::new` produces a distinct identity, clones share it.
#[derive(Clone)]
pub struct Condition {
    id: u64,
    name: Arc<str>,
    predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl Condition {
    /// Creates a new condition with a human-readable name.
    pub fn new<F>(name: impl Into<Arc<str>>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            id: CONDITION_ID.fetch_add(1, AtomicOrdering::Relaxed),
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluates the predicate against one key.
    #[inline]
    pub fn matches(&self, key: &str) -> bool {
        (self.predicate)(key)
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique identity of this predicate instance.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Key used by the delay queue to decide whether two local events coalesce.
///
/// Two events match when region, key set, change kind and condition instance
/// are all equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventIdentity {
    region: Option<Arc<str>>,
    keys: BTreeSet<Arc<str>>,
    kind: ChangeKind,
    condition: Option<u64>,
}

/// A change to a cache region.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - empty key set means the whole region (or the whole cache if `region` is `None`)
#[derive(Clone)]
pub struct CacheEvent {
    seq: u64,
    at: SystemTime,
    kind: ChangeKind,
    region: Option<Arc<str>>,
    keys: BTreeSet<Arc<str>>,
    condition: Option<Condition>,
}

impl CacheEvent {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: ChangeKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            region: None,
            keys: BTreeSet::new(),
            condition: None,
        }
    }

    /// Shorthand for an invalidation of `key` in `region`.
    pub fn invalidate(region: impl Into<Arc<str>>, key: impl Into<Arc<str>>) -> Self {
        Self::new(ChangeKind::Invalidate)
            .with_region(region)
            .with_key(key)
    }

    /// Shorthand for clearing a whole region.
    pub fn clear(region: impl Into<Arc<str>>) -> Self {
        Self::new(ChangeKind::Clear).with_region(region)
    }

    /// Scopes the event to a region.
    #[inline]
    pub fn with_region(mut self, region: impl Into<Arc<str>>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Adds one affected key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.keys.insert(key.into());
        self
    }

    /// Adds several affected keys.
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Attaches a relevance predicate.
    #[inline]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Global sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Wall-clock creation time.
    pub fn at(&self) -> SystemTime {
        self.at
    }

    /// Change classification.
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Region name, `None` for cache-wide events.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Affected keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.keys.iter().map(|k| k.as_ref())
    }

    /// True if the event targets the whole scope rather than specific keys.
    pub fn is_scope_wide(&self) -> bool {
        self.keys.is_empty()
    }

    /// Optional relevance predicate.
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Coalescing identity of this event.
    pub fn identity(&self) -> EventIdentity {
        EventIdentity {
            region: self.region.clone(),
            keys: self.keys.clone(),
            kind: self.kind,
            condition: self.condition.as_ref().map(Condition::id),
        }
    }
}

impl fmt::Debug for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEvent")
            .field("seq", &self.seq)
            .field("kind", &self.kind)
            .field("region", &self.region)
            .field("keys", &self.keys)
            .field("condition", &self.condition.as_ref().map(Condition::name))
            .finish()
    }
}
