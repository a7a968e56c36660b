//! Registry of cancellation tokens keyed by logical route.
//!
//! Keys follow the `{route}-{uuid}` convention so that every request issued for a route can be
//! aborted at once with [`CancellationRegistry::cancel_by_route`]. Matching is a literal prefix
//! comparison on `{route}-`, so `checkout` never touches keys under `checkoutX-`.
//!
//! Aborting a token does not remove its entry. Entries leave the registry when the owning
//! request succeeds, when a caller deletes them, or when a route-wide cancel evicts them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Separator between the route segment and the unique suffix of a registry key.
pub const ROUTE_SEPARATOR: char = '-';

/// Build a registry key for `route`: `{route}-{uuid v4}`.
pub fn route_key(route: &str) -> String {
    format!("{route}{ROUTE_SEPARATOR}{}", uuid::Uuid::new_v4())
}

/// A registered cancellation token and the key it is stored under.
///
/// Clones share cancellation state with the registry entry; aborting any clone cancels the
/// request bound to the key.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    key: String,
    token: CancellationToken,
}

impl CancellationHandle {
    fn new(key: String) -> Self {
        Self { key, token: CancellationToken::new() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Signal consulted by the in-flight request.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the bound request. Idempotent.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Keyed store of cancellation tokens (injectable into the pipeline).
pub trait CancellationRegistry: Send + Sync + std::fmt::Debug {
    /// Return the entry for `key` if present, otherwise create one.
    ///
    /// Without a key a fresh entry is created under `-{uuid}` (the empty route).
    fn add(&self, key: Option<&str>) -> CancellationHandle;
    /// Create a fresh entry under `{route}-{uuid}`.
    fn add_for_route(&self, route: &str) -> CancellationHandle;
    /// Remove the entry for `key`; returns whether one existed.
    fn delete(&self, key: &str) -> bool;
    /// Abort the entry for `key` without removing it; returns whether one existed.
    fn cancel(&self, key: &str) -> bool;
    /// Abort and remove every entry whose key starts with `{route}-`; returns the removed keys
    /// sorted.
    fn cancel_by_route(&self, route: &str) -> Vec<String>;
    /// Whether an entry exists for `key`.
    fn contains(&self, key: &str) -> bool;
    /// Registered keys, sorted.
    fn snapshot(&self) -> Vec<String>;
    /// Number of registered entries.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory implementation backed by a mutex-guarded map. Clones share the same entries.
#[derive(Default, Clone, Debug)]
pub struct InMemoryCancellationRegistry {
    inner: Arc<Mutex<HashMap<String, CancellationHandle>>>,
}

impl InMemoryCancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every operation is a single critical section over the map, so a panic can never leave a
    // half-applied update behind; recovering from poison is sound.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CancellationHandle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn trace(op: &'static str, map: &HashMap<String, CancellationHandle>) {
        if tracing::enabled!(target: "tollgate::cancel", tracing::Level::DEBUG) {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            debug!(target: "tollgate::cancel", op, entries = keys.len(), keys = ?keys, "cancellation registry updated");
        }
    }

    fn insert_fresh(&self, key: String, op: &'static str) -> CancellationHandle {
        let handle = CancellationHandle::new(key);
        let mut map = self.entries();
        map.insert(handle.key.clone(), handle.clone());
        Self::trace(op, &map);
        handle
    }
}

fn matches_route(key: &str, route: &str) -> bool {
    key.strip_prefix(route).is_some_and(|rest| rest.starts_with(ROUTE_SEPARATOR))
}

impl CancellationRegistry for InMemoryCancellationRegistry {
    fn add(&self, key: Option<&str>) -> CancellationHandle {
        match key {
            Some(key) => {
                let mut map = self.entries();
                if let Some(existing) = map.get(key) {
                    return existing.clone();
                }
                let handle = CancellationHandle::new(key.to_owned());
                map.insert(handle.key.clone(), handle.clone());
                Self::trace("add", &map);
                handle
            }
            None => self.insert_fresh(route_key(""), "add"),
        }
    }

    fn add_for_route(&self, route: &str) -> CancellationHandle {
        self.insert_fresh(route_key(route), "add")
    }

    fn delete(&self, key: &str) -> bool {
        let mut map = self.entries();
        let removed = map.remove(key).is_some();
        Self::trace("delete", &map);
        removed
    }

    fn cancel(&self, key: &str) -> bool {
        let map = self.entries();
        let found = match map.get(key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        };
        Self::trace("cancel", &map);
        found
    }

    fn cancel_by_route(&self, route: &str) -> Vec<String> {
        let mut map = self.entries();
        let mut matched: Vec<String> =
            map.keys().filter(|key| matches_route(key, route)).cloned().collect();
        matched.sort_unstable();
        for key in &matched {
            if let Some(handle) = map.remove(key) {
                handle.abort();
            }
        }
        Self::trace("cancel_by_route", &map);
        matched
    }

    fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    fn snapshot(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}
