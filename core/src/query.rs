//! Query-identity keyed cache.
//!
//! A `QueryCache` maps a [`QueryKey`] to the value currently believed correct
//! for that query, plus the bookkeeping needed to run background fetches
//! against it:
//!
//! - every fetch gets a fresh [`FetchToken`]
//! - a fetch result is applied only while its token is still current
//! - [`QueryCache::cancel_fetch`] invalidates the current token, so a stale
//!   response arriving later can't clobber a local edit
//!
//! The cache itself has no interior mutability. It lives inside reducer state,
//! and the store serialises every access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identity under which a fetched collection is cached and invalidated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey(String);

impl QueryKey {
    /// Create a new `QueryKey`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token identifying one fetch of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchToken(u64);

impl fmt::Display for FetchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable state of one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched, no data
    Idle,
    /// A fetch is in flight and there is no data yet
    Loading,
    /// The last fetch failed and there is no data
    Failed(String),
    /// Data is present
    Ready,
}

#[derive(Clone, Debug)]
struct QueryEntry<T> {
    data: Option<T>,
    updated_at: Option<DateTime<Utc>>,
    error: Option<String>,
    in_flight: Option<FetchToken>,
}

impl<T> Default for QueryEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            updated_at: None,
            error: None,
            in_flight: None,
        }
    }
}

/// In-memory cache of query results keyed by [`QueryKey`].
#[derive(Clone, Debug)]
pub struct QueryCache<T> {
    entries: HashMap<QueryKey, QueryEntry<T>>,
    next_token: u64,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueryCache<T> {
    /// Creates an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_token: 0,
        }
    }

    /// Returns the cached value, if any
    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<&T> {
        self.entries.get(key).and_then(|e| e.data.as_ref())
    }

    /// Replaces the cached value wholesale.
    ///
    /// Writing data marks the query ready and clears any previous fetch error.
    pub fn set(&mut self, key: &QueryKey, value: T, at: DateTime<Utc>) {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.data = Some(value);
        entry.updated_at = Some(at);
        entry.error = None;
    }

    /// Applies `f` to the current value (or the default when absent) and stores the result
    pub fn update<F>(&mut self, key: &QueryKey, at: DateTime<Utc>, f: F)
    where
        T: Default,
        F: FnOnce(T) -> T,
    {
        let entry = self.entries.entry(key.clone()).or_default();
        let current = entry.data.take().unwrap_or_default();
        entry.data = Some(f(current));
        entry.updated_at = Some(at);
        entry.error = None;
    }

    /// Owned copy of the current value, the default when absent
    #[must_use]
    pub fn snapshot(&self, key: &QueryKey) -> T
    where
        T: Clone + Default,
    {
        self.get(key).cloned().unwrap_or_default()
    }

    /// When the value was last written
    #[must_use]
    pub fn updated_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).and_then(|e| e.updated_at)
    }

    /// Message of the last failed fetch, cleared by the next write
    #[must_use]
    pub fn error(&self, key: &QueryKey) -> Option<&str> {
        self.entries.get(key).and_then(|e| e.error.as_deref())
    }

    /// Whether a fetch is in flight
    #[must_use]
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.in_flight.is_some())
    }

    /// Status of the query, data first
    #[must_use]
    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        match self.entries.get(key) {
            None => QueryStatus::Idle,
            Some(entry) if entry.data.is_some() => QueryStatus::Ready,
            Some(entry) if entry.in_flight.is_some() => QueryStatus::Loading,
            Some(QueryEntry {
                error: Some(message),
                ..
            }) => QueryStatus::Failed(message.clone()),
            Some(_) => QueryStatus::Idle,
        }
    }

    /// Starts a fetch, superseding any fetch already in flight
    pub fn begin_fetch(&mut self, key: &QueryKey) -> FetchToken {
        self.next_token += 1;
        let token = FetchToken(self.next_token);
        self.entries.entry(key.clone()).or_default().in_flight = Some(token);
        token
    }

    /// Invalidates the in-flight fetch so its result will be discarded.
    ///
    /// Returns whether a fetch was in flight.
    pub fn cancel_fetch(&mut self, key: &QueryKey) -> bool {
        self.entries
            .get_mut(key)
            .and_then(|e| e.in_flight.take())
            .is_some()
    }

    /// Applies a fetch result if `token` is still current.
    ///
    /// Returns `false` (and leaves the cache untouched) for stale tokens.
    pub fn resolve_fetch(&mut self, key: &QueryKey, token: FetchToken, value: T, at: DateTime<Utc>) -> bool {
        if !self.take_current(key, token) {
            return false;
        }
        self.set(key, value, at);
        true
    }

    /// Records a fetch failure if `token` is still current.
    ///
    /// Existing data is kept. Returns `false` for stale tokens.
    pub fn fail_fetch(&mut self, key: &QueryKey, token: FetchToken, message: impl Into<String>) -> bool {
        if !self.take_current(key, token) {
            return false;
        }
        self.entries.entry(key.clone()).or_default().error = Some(message.into());
        true
    }

    fn take_current(&mut self, key: &QueryKey, token: FetchToken) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.in_flight == Some(token) => {
                entry.in_flight = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> QueryKey {
        QueryKey::new("todos")
    }

    #[test]
    fn absent_until_written() {
        let mut cache: QueryCache<Vec<i64>> = QueryCache::new();
        assert_eq!(cache.get(&key()), None);
        assert_eq!(cache.status(&key()), QueryStatus::Idle);

        cache.set(&key(), vec![1, 2], Utc::now());
        assert_eq!(cache.get(&key()), Some(&vec![1, 2]));
        assert_eq!(cache.status(&key()), QueryStatus::Ready);
    }

    #[test]
    fn update_starts_from_default() {
        let mut cache: QueryCache<Vec<i64>> = QueryCache::new();
        cache.update(&key(), Utc::now(), |mut v| {
            v.push(3);
            v
        });
        assert_eq!(cache.snapshot(&key()), vec![3]);
    }

    #[test]
    fn stale_fetch_is_discarded_after_cancel() {
        let mut cache: QueryCache<Vec<i64>> = QueryCache::new();
        let token = cache.begin_fetch(&key());
        assert_eq!(cache.status(&key()), QueryStatus::Loading);

        assert!(cache.cancel_fetch(&key()));
        cache.set(&key(), vec![9], Utc::now());

        assert!(!cache.resolve_fetch(&key(), token, vec![1, 2, 3], Utc::now()));
        assert_eq!(cache.get(&key()), Some(&vec![9]));
        assert!(!cache.is_fetching(&key()));
    }

    #[test]
    fn newer_fetch_supersedes_older() {
        let mut cache: QueryCache<Vec<i64>> = QueryCache::new();
        let first = cache.begin_fetch(&key());
        let second = cache.begin_fetch(&key());
        assert_ne!(first, second);

        assert!(!cache.resolve_fetch(&key(), first, vec![1], Utc::now()));
        assert!(cache.resolve_fetch(&key(), second, vec![2], Utc::now()));
        assert_eq!(cache.get(&key()), Some(&vec![2]));
    }

    #[test]
    fn failed_initial_fetch_reports_message() {
        let mut cache: QueryCache<Vec<i64>> = QueryCache::new();
        let token = cache.begin_fetch(&key());
        assert!(cache.fail_fetch(&key(), token, "request failed with status 503"));

        assert_eq!(
            cache.status(&key()),
            QueryStatus::Failed("request failed with status 503".to_string())
        );

        // A later write hides the error
        cache.set(&key(), vec![], Utc::now());
        assert_eq!(cache.status(&key()), QueryStatus::Ready);
        assert_eq!(cache.error(&key()), None);
    }

    #[test]
    fn failed_refetch_keeps_data() {
        let mut cache: QueryCache<Vec<i64>> = QueryCache::new();
        cache.set(&key(), vec![4], Utc::now());
        let token = cache.begin_fetch(&key());
        assert_eq!(cache.status(&key()), QueryStatus::Ready);

        assert!(cache.fail_fetch(&key(), token, "boom"));
        assert_eq!(cache.get(&key()), Some(&vec![4]));
        assert_eq!(cache.error(&key()), Some("boom"));
    }

    #[test]
    fn cancel_without_fetch_is_noop() {
        let mut cache: QueryCache<Vec<i64>> = QueryCache::new();
        assert!(!cache.cancel_fetch(&key()));
    }
}
