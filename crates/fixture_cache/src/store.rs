//! Cache store: the one place the current snapshot lives.
//!
//! `publish` is a single pointer swap, so a reader holding the `Arc` it got from
//! `read` keeps a complete generation no matter what the writer does next.
//! The refresh flag is only ever taken through compare-exchange.

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::types::CacheSnapshot;

pub struct CacheStore {
    current:    ArcSwap<CacheSnapshot>,
    refreshing: AtomicBool,
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            current:    ArcSwap::from_pointee(CacheSnapshot::default()),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Last published snapshot (or the empty initial one).
    pub fn read(&self) -> Arc<CacheSnapshot> {
        self.current.load_full()
    }

    pub fn publish(&self, snapshot: CacheSnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Returns false if a refresh is already running.
    pub fn try_begin_refresh(&self) -> bool {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_refresh(&self) {
        self.refreshing.store(false, Ordering::Release);
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Like `try_begin_refresh`, but the flag is cleared when the guard drops,
    /// including during unwinding.
    pub fn begin_refresh(&self) -> Option<RefreshGuard<'_>> {
        self.try_begin_refresh().then(|| RefreshGuard { store: self })
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RefreshGuard<'a> {
    store: &'a CacheStore,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.store.end_refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fixture;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn starts_with_empty_snapshot() {
        let store = CacheStore::new();
        let snap = store.read();
        assert!(snap.fixtures.is_empty());
        assert!(snap.details.is_empty());
        assert!(snap.last_update.is_none());
    }

    #[test]
    fn second_begin_fails_until_end() {
        let store = CacheStore::new();
        assert!(store.try_begin_refresh());
        assert!(!store.try_begin_refresh());
        assert!(store.is_refreshing());

        store.end_refresh();
        assert!(!store.is_refreshing());
        assert!(store.try_begin_refresh());
    }

    #[test]
    fn guard_releases_on_drop() {
        let store = CacheStore::new();
        {
            let _guard = store.begin_refresh().expect("first begin");
            assert!(store.begin_refresh().is_none());
        }
        assert!(!store.is_refreshing());
    }

    #[test]
    fn guard_releases_on_panic() {
        let store = CacheStore::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.begin_refresh().unwrap();
            panic!("cycle blew up");
        }));
        assert!(result.is_err());
        assert!(!store.is_refreshing());
    }

    #[test]
    fn reader_keeps_its_generation_after_publish() {
        let store = CacheStore::new();
        let before = store.read();

        store.publish(CacheSnapshot {
            fixtures:    vec![Fixture::new(json!({"fixture": {"id": 1}}))],
            details:     Default::default(),
            last_update: Some(Utc::now()),
        });

        assert!(before.fixtures.is_empty());
        assert_eq!(store.read().fixtures.len(), 1);
    }

    #[test]
    fn concurrent_begin_admits_exactly_one() {
        let store = Arc::new(CacheStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.try_begin_refresh())
            })
            .collect();

        let admitted = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(admitted, 1);
    }
}
