//! In-memory cache store keyed by query key hash.

use chrono::{DateTime, Duration, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::keys::{QueryKey, Scope};
use crate::api::ErrorInfo;
use crate::resource::ResourceName;

/// Type-erased cached data. Readers downcast to the type their query decodes.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
  /// Never fetched, or invalidated and waiting for a refetch
  Idle,
  Loading,
  Success,
  Error,
}

/// A single cached query result.
#[derive(Clone)]
pub struct CacheEntry {
  pub key: QueryKey,
  /// Last successful data; kept while refetching or after a failed refetch
  pub data: Option<Payload>,
  pub status: FetchStatus,
  pub error: Option<ErrorInfo>,
  pub fetched_at: Option<DateTime<Utc>>,
  /// Key whose data may be shown while this entry loads for the first time
  pub placeholder_from: Option<QueryKey>,
  /// Sequence number of the request allowed to settle this entry
  pub(crate) request_seq: u64,
}

impl CacheEntry {
  fn new(key: QueryKey) -> Self {
    Self {
      key,
      data: None,
      status: FetchStatus::Idle,
      error: None,
      fetched_at: None,
      placeholder_from: None,
      request_seq: 0,
    }
  }

  /// Downcast the cached data.
  pub fn data_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
    self.data.clone()?.downcast::<T>().ok()
  }

  /// Whether a read should trigger a fetch.
  ///
  /// Loading entries already have a request; failed entries are only retried
  /// on an explicit refetch.
  pub fn needs_fetch(&self, stale_time: Duration, now: DateTime<Utc>) -> bool {
    match self.status {
      FetchStatus::Idle => true,
      FetchStatus::Loading | FetchStatus::Error => false,
      FetchStatus::Success => self
        .fetched_at
        .map(|at| now - at > stale_time)
        .unwrap_or(true),
    }
  }
}

impl fmt::Debug for CacheEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntry")
      .field("key", &self.key)
      .field("has_data", &self.data.is_some())
      .field("status", &self.status)
      .field("error", &self.error)
      .field("fetched_at", &self.fetched_at)
      .field("placeholder_from", &self.placeholder_from)
      .field("request_seq", &self.request_seq)
      .finish()
  }
}

/// Shared cache store.
///
/// Holds at most one entry per key. Every change bumps a generation counter
/// published on a watch channel, so observers can tell that something moved
/// without holding the lock.
#[derive(Clone)]
pub struct CacheStore {
  inner: Arc<Inner>,
}

struct Inner {
  entries: Mutex<HashMap<String, CacheEntry>>,
  next_seq: AtomicU64,
  changes: watch::Sender<u64>,
}

impl Default for CacheStore {
  fn default() -> Self {
    Self::new()
  }
}

impl CacheStore {
  pub fn new() -> Self {
    let (changes, _) = watch::channel(0);
    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        next_seq: AtomicU64::new(1),
        changes,
      }),
    }
  }

  fn entries(&self, op: &'static str) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    match self.inner.entries.lock() {
      Ok(guard) => guard,
      Err(poisoned) => {
        warn!(op, "Recovered from poisoned cache lock");
        poisoned.into_inner()
      }
    }
  }

  fn bump(&self) {
    self.inner.changes.send_modify(|generation| *generation += 1);
  }

  pub(crate) fn next_seq(&self) -> u64 {
    self.inner.next_seq.fetch_add(1, Ordering::Relaxed)
  }

  /// Subscribe to change notifications.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.inner.changes.subscribe()
  }

  pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
    self.entries("get").get(&key.cache_hash()).cloned()
  }

  /// Overwrite the entry for its key.
  pub fn put(&self, entry: CacheEntry) {
    self.entries("put").insert(entry.key.cache_hash(), entry);
    self.bump();
  }

  /// Copy of every entry, for diagnostics.
  pub fn snapshot(&self) -> Vec<CacheEntry> {
    let mut entries: Vec<CacheEntry> = self.entries("snapshot").values().cloned().collect();
    entries.sort_by_key(|entry| entry.key.canonical());
    entries
  }

  pub fn len(&self) -> usize {
    self.entries("len").len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Mark every entry in `scope` stale, keeping its data for display.
  ///
  /// A request already in flight for such an entry is superseded: its
  /// response may predate the change that caused the invalidation, so it is
  /// dropped when it arrives. Returns the number of entries touched.
  pub fn invalidate_scope(&self, scope: Scope) -> usize {
    let mut touched = 0;
    {
      let mut entries = self.entries("invalidate_scope");
      for entry in entries.values_mut().filter(|e| e.key.scope() == scope) {
        if entry.status == FetchStatus::Loading {
          entry.request_seq = self.next_seq();
        }
        entry.status = FetchStatus::Idle;
        touched += 1;
      }
    }
    debug!(%scope, touched, "invalidated cache scope");
    if touched > 0 {
      self.bump();
    }
    touched
  }

  /// Invalidate every listing of one resource family.
  pub fn invalidate_by_prefix(&self, resource: ResourceName) -> usize {
    self.invalidate_scope(Scope::Resource(resource))
  }

  /// Drop everything, e.g. on logout.
  pub fn clear(&self) {
    self.entries("clear").clear();
    self.bump();
  }

  /// Record the start of a request and return the sequence number that may
  /// settle it. Supersedes any earlier request for the same key.
  pub(crate) fn begin_request(&self, key: &QueryKey, placeholder_from: Option<&QueryKey>) -> u64 {
    let seq = self.next_seq();
    {
      let mut entries = self.entries("begin_request");
      let entry = entries
        .entry(key.cache_hash())
        .or_insert_with(|| CacheEntry::new(key.clone()));
      entry.status = FetchStatus::Loading;
      entry.request_seq = seq;
      if entry.data.is_none() {
        entry.placeholder_from = placeholder_from.filter(|from| *from != key).cloned();
      }
    }
    self.bump();
    seq
  }

  /// Apply a response. Responses from superseded requests are discarded;
  /// returns whether this one was applied.
  pub(crate) fn settle(
    &self,
    key: &QueryKey,
    seq: u64,
    result: Result<Payload, ErrorInfo>,
  ) -> bool {
    {
      let mut entries = self.entries("settle");
      let Some(entry) = entries.get_mut(&key.cache_hash()) else {
        // Store was cleared while the request was in flight
        return false;
      };
      if entry.request_seq != seq {
        return false;
      }
      match result {
        Ok(data) => {
          entry.data = Some(data);
          entry.status = FetchStatus::Success;
          entry.error = None;
          entry.fetched_at = Some(Utc::now());
          entry.placeholder_from = None;
        }
        Err(error) => {
          entry.status = FetchStatus::Error;
          entry.error = Some(error);
        }
      }
    }
    self.bump();
    true
  }

  pub(crate) fn request_seq(&self, key: &QueryKey) -> Option<u64> {
    self
      .entries("request_seq")
      .get(&key.cache_hash())
      .filter(|entry| entry.status == FetchStatus::Loading)
      .map(|entry| entry.request_seq)
  }
}
