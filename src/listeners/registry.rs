//! # Listener registry: global and per-region listener lists.
//!
//! ## Architecture
//! ```text
//! ListenerRegistry
//!   ├── global:  ArcSwap<Vec<ListenerRef>>                    (copy-on-write)
//!   └── regions: DashMap<region, ArcSwap<Vec<ListenerRef>>>   (created lazily)
//!
//! resolve(region, sender) = regions[region] ∪ global − {sender}
//! ```
//!
//! ## Rules
//! - Reads (`resolve`) never take a lock that writers hold for long: a reader
//!   loads a snapshot `Arc<Vec<_>>` and iterates it.
//! - Writers replace the list (`rcu`); a concurrent reader sees either the old
//!   or the new list, never a partial one.
//! - A region list is created atomically on first registration and removed
//!   once its last listener is removed.
//! - Add/remove are idempotent and report whether anything changed.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use super::listener::{ListenerRef, same_listener};

type ListenerList = ArcSwap<Vec<ListenerRef>>;

/// Concurrent registry of global and region-scoped listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    global: ListenerList,
    regions: DashMap<Arc<str>, ListenerList>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for every event. Returns `false` if already present.
    pub fn add(&self, listener: ListenerRef) -> bool {
        push_unique(&self.global, &listener)
    }

    /// Unregisters a global listener. Returns `false` if it was absent.
    pub fn remove(&self, listener: &ListenerRef) -> bool {
        remove_one(&self.global, listener)
    }

    /// Registers a listener for events of one region. Returns `false` if already present.
    pub fn add_to_region(&self, region: &str, listener: ListenerRef) -> bool {
        let list = self
            .regions
            .entry(Arc::from(region))
            .or_insert_with(|| ArcSwap::from_pointee(Vec::new()));
        push_unique(list.value(), &listener)
    }

    /// Unregisters a region listener. Returns `false` if it was absent.
    pub fn remove_from_region(&self, region: &str, listener: &ListenerRef) -> bool {
        let removed = match self.regions.get(region) {
            Some(list) => remove_one(list.value(), listener),
            None => false,
        };
        if removed {
            self.regions
                .remove_if(region, |_, list| list.load().is_empty());
        }
        removed
    }

    /// Snapshot of the listeners interested in an event of `region`, minus `sender`.
    ///
    /// Region listeners come first (registration order), then global ones not
    /// already present.
    pub fn resolve(&self, region: Option<&str>, sender: Option<&ListenerRef>) -> Vec<ListenerRef> {
        let mut out: Vec<ListenerRef> = Vec::new();

        if let Some(list) = region.and_then(|r| self.regions.get(r)) {
            out.extend(list.load().iter().cloned());
        }

        for listener in self.global.load().iter() {
            if !out.iter().any(|l| same_listener(l, listener)) {
                out.push(Arc::clone(listener));
            }
        }

        if let Some(sender) = sender {
            out.retain(|l| !same_listener(l, sender));
        }
        out
    }

    /// Number of global listeners.
    pub fn global_len(&self) -> usize {
        self.global.load().len()
    }

    /// Number of listeners registered for `region` (global ones excluded).
    pub fn region_len(&self, region: &str) -> usize {
        self.regions
            .get(region)
            .map(|list| list.load().len())
            .unwrap_or(0)
    }

    /// Sorted list of regions that currently have listeners.
    pub fn regions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.regions.iter().map(|e| e.key().to_string()).collect();
        names.sort_unstable();
        names
    }
}

fn push_unique(list: &ListenerList, listener: &ListenerRef) -> bool {
    let mut added = false;
    list.rcu(|current| {
        added = !current.iter().any(|l| same_listener(l, listener));
        if !added {
            return Arc::clone(current);
        }
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::clone(listener));
        Arc::new(next)
    });
    added
}

fn remove_one(list: &ListenerList, listener: &ListenerRef) -> bool {
    let mut removed = false;
    list.rcu(|current| {
        removed = current.iter().any(|l| same_listener(l, listener));
        if !removed {
            return Arc::clone(current);
        }
        let next: Vec<ListenerRef> = current
            .iter()
            .filter(|l| !same_listener(l, listener))
            .cloned()
            .collect();
        Arc::new(next)
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListenerError;
    use crate::events::CacheEvent;
    use crate::listeners::Listener;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl Listener for Named {
        async fn on_event(
            &self,
            _sender: Option<&ListenerRef>,
            _event: &CacheEvent,
            _from_remote: bool,
        ) -> Result<(), ListenerError> {
            Ok(())
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    fn listener(name: &'static str) -> ListenerRef {
        Arc::new(Named(name))
    }

    fn names(list: &[ListenerRef]) -> Vec<&str> {
        list.iter().map(|l| l.name()).collect()
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let reg = ListenerRegistry::new();
        let a = listener("a");

        assert!(reg.add(Arc::clone(&a)));
        assert!(!reg.add(Arc::clone(&a)));
        assert_eq!(reg.global_len(), 1);

        assert!(reg.remove(&a));
        assert!(!reg.remove(&a));
        assert_eq!(reg.global_len(), 0);
    }

    #[test]
    fn identity_is_the_allocation_not_the_name() {
        let reg = ListenerRegistry::new();
        assert!(reg.add(listener("same")));
        assert!(reg.add(listener("same")));
        assert_eq!(reg.global_len(), 2);
    }

    #[test]
    fn region_lists_are_created_and_dropped_lazily() {
        let reg = ListenerRegistry::new();
        let a = listener("a");

        assert!(reg.regions().is_empty());
        assert!(reg.add_to_region("r1", Arc::clone(&a)));
        assert!(!reg.add_to_region("r1", Arc::clone(&a)));
        assert_eq!(reg.regions(), vec!["r1".to_string()]);
        assert_eq!(reg.region_len("r1"), 1);

        assert!(!reg.remove_from_region("r2", &a));
        assert!(reg.remove_from_region("r1", &a));
        assert!(!reg.remove_from_region("r1", &a));
        assert!(reg.regions().is_empty());
    }

    #[test]
    fn resolve_unions_region_and_global_without_duplicates() {
        let reg = ListenerRegistry::new();
        let (r, g, both) = (listener("r"), listener("g"), listener("both"));
        reg.add_to_region("r1", Arc::clone(&r));
        reg.add_to_region("r1", Arc::clone(&both));
        reg.add(Arc::clone(&g));
        reg.add(Arc::clone(&both));

        assert_eq!(names(&reg.resolve(Some("r1"), None)), vec!["r", "both", "g"]);
        assert_eq!(names(&reg.resolve(Some("r2"), None)), vec!["g", "both"]);
        assert_eq!(names(&reg.resolve(None, None)), vec!["g", "both"]);
    }

    #[test]
    fn resolve_excludes_the_sender() {
        let reg = ListenerRegistry::new();
        let (a, b) = (listener("a"), listener("b"));
        reg.add(Arc::clone(&a));
        reg.add_to_region("r1", Arc::clone(&b));
        reg.add_to_region("r1", Arc::clone(&a));

        assert_eq!(names(&reg.resolve(Some("r1"), Some(&a))), vec!["b"]);
        assert!(reg.resolve(None, Some(&a)).is_empty());
    }

    #[test]
    fn concurrent_registration_keeps_every_listener() {
        let reg = Arc::new(ListenerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        reg.add_to_region("hot", listener("x"));
                        reg.add(listener("y"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.region_len("hot"), 400);
        assert_eq!(reg.global_len(), 400);
    }
}
