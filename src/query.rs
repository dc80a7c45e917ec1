//! Async query abstraction for views.
//!
//! Inspired by TanStack Query, a `Query<T>` is what a view holds for one
//! logical listing: it follows a key that changes as the operator pages or
//! filters, reads its state from the shared cache, and starts requests
//! through the [`QueryClient`] so identical queries share one request.
//!
//! # Example
//!
//! ```ignore
//! let mut query = console.articles().list(&params);
//!
//! // In event loop tick
//! if query.poll() {
//!     // Cache changed, re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading { placeholder } => render_maybe_stale(placeholder),
//!     QueryState::Success(page) => render_page(&page),
//!     QueryState::Error(e) => render_error(&e),
//!     QueryState::Idle => {}
//! }
//! ```

mod client;

pub use client::{QueryClient, SharedRequest};

use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::watch;

use crate::api::{ErrorInfo, FetchError};
use crate::cache::{FetchStatus, QueryKey};

/// The state of a query as seen by a view.
#[derive(Debug)]
pub enum QueryState<T> {
  /// Disabled, or nothing requested yet
  Idle,
  /// A request is pending or scheduled. `placeholder` is data that may be
  /// shown meanwhile: the previous result for this key, or the result of the
  /// key the view showed before.
  Loading { placeholder: Option<Arc<T>> },
  /// Fully loaded
  Success(Arc<T>),
  /// The last request failed
  Error(ErrorInfo),
}

impl<T> Clone for QueryState<T> {
  fn clone(&self) -> Self {
    match self {
      QueryState::Idle => QueryState::Idle,
      QueryState::Loading { placeholder } => QueryState::Loading {
        placeholder: placeholder.clone(),
      },
      QueryState::Success(data) => QueryState::Success(Arc::clone(data)),
      QueryState::Error(e) => QueryState::Error(e.clone()),
    }
  }
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading { .. })
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  /// Whether the data on display is a stand-in while loading.
  pub fn is_placeholder(&self) -> bool {
    matches!(
      self,
      QueryState::Loading {
        placeholder: Some(_)
      }
    )
  }

  /// Data to display, loaded or placeholder.
  pub fn data(&self) -> Option<&Arc<T>> {
    match self {
      QueryState::Success(data) => Some(data),
      QueryState::Loading { placeholder } => placeholder.as_ref(),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ErrorInfo> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// Options a query is created with.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
  /// When false the query never fetches and reports `Idle`
  pub enabled: bool,
  /// Show the previous key's data while a new key loads
  pub keep_previous: bool,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      enabled: true,
      keep_previous: false,
    }
  }
}

/// A factory for requests, called with the key to fetch.
pub type FetcherFn<T> =
  Arc<dyn Fn(QueryKey) -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

/// A view's handle on one cached query.
///
/// `Query<T>` encapsulates:
/// - the key the view currently wants, and the key it showed before
/// - the fetching logic (via a closure taking the key)
/// - gating through `enabled`
/// - change notification from the shared store
pub struct Query<T> {
  client: QueryClient,
  key: QueryKey,
  previous_key: Option<QueryKey>,
  fetcher: FetcherFn<T>,
  options: QueryOptions,
  changes: watch::Receiver<u64>,
}

impl<T: Send + Sync + 'static> Query<T> {
  /// Create a query for `key`. Nothing is fetched until `fetch`, `poll` or
  /// `resolve` is called.
  pub fn new(
    client: QueryClient,
    key: QueryKey,
    options: QueryOptions,
    fetcher: FetcherFn<T>,
  ) -> Self {
    let changes = client.store().subscribe();
    Self {
      client,
      key,
      previous_key: None,
      fetcher,
      options,
      changes,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn options(&self) -> QueryOptions {
    self.options
  }

  pub fn is_enabled(&self) -> bool {
    self.options.enabled
  }

  /// Enable or disable the query, e.g. once a scoping value becomes known.
  pub fn set_enabled(&mut self, enabled: bool) {
    self.options.enabled = enabled;
  }

  /// Follow a new key (next page, new filter). The old key's data becomes the
  /// placeholder when `keep_previous` is on.
  pub fn set_key(&mut self, key: QueryKey) {
    if key == self.key {
      return;
    }
    if self.options.keep_previous {
      let shown = self
        .client
        .store()
        .get(&self.key)
        .is_some_and(|entry| entry.data.is_some());
      if shown {
        self.previous_key = Some(self.key.clone());
      }
    }
    self.key = key;
  }

  /// Replace the fetcher, keeping the key. Used when the key alone does not
  /// capture how to fetch.
  pub fn set_fetcher(&mut self, fetcher: FetcherFn<T>) {
    self.fetcher = fetcher;
  }

  fn start(&self, force: bool) -> SharedRequest {
    let fetcher = Arc::clone(&self.fetcher);
    let key = self.key.clone();
    let placeholder = self.placeholder_key();
    self
      .client
      .ensure(&self.key, placeholder.as_ref(), force, move || fetcher(key))
  }

  fn placeholder_key(&self) -> Option<QueryKey> {
    if self.options.keep_previous {
      self.previous_key.clone()
    } else {
      None
    }
  }

  /// Start fetching if the cached entry is missing or stale.
  ///
  /// This is a no-op if the query is disabled, fresh, or already loading.
  pub fn fetch(&mut self) {
    if !self.options.enabled || !self.client.needs_fetch(&self.key) {
      return;
    }
    self.start(false);
  }

  /// Force a new request, superseding any pending one.
  pub fn refetch(&mut self) {
    if !self.options.enabled {
      return;
    }
    self.start(true);
  }

  /// Check for cache changes.
  ///
  /// Returns `true` if the store changed since the last poll. Entries that
  /// were invalidated are refetched here. Call this in your event loop tick.
  pub fn poll(&mut self) -> bool {
    let changed = self.changes.has_changed().unwrap_or(false);
    if changed {
      self.changes.borrow_and_update();
    }
    self.fetch();
    changed
  }

  /// Fetch if needed and wait until the key has settled, then return the
  /// resulting state.
  pub async fn resolve(&mut self) -> QueryState<T> {
    loop {
      self.fetch();
      match self.client.pending(&self.key) {
        Some(request) => {
          let _ = request.await;
        }
        None => break,
      }
    }
    self.changes.borrow_and_update();
    self.state()
  }

  /// Current state, read from the cache.
  pub fn state(&self) -> QueryState<T> {
    if !self.options.enabled {
      return QueryState::Idle;
    }
    let Some(entry) = self.client.store().get(&self.key) else {
      return QueryState::Idle;
    };

    match entry.status {
      FetchStatus::Success => match entry.data_as::<T>() {
        Some(data) => QueryState::Success(data),
        None => QueryState::Error(ErrorInfo::new(format!(
          "cached data for {} has an unexpected type",
          self.key.description()
        ))),
      },
      FetchStatus::Error => QueryState::Error(
        entry
          .error
          .unwrap_or_else(|| ErrorInfo::new("request failed")),
      ),
      FetchStatus::Loading | FetchStatus::Idle => {
        let placeholder = entry.data_as::<T>().or_else(|| {
          entry
            .placeholder_from
            .as_ref()
            .and_then(|from| self.client.store().get(from))
            .and_then(|from| from.data_as::<T>())
        });
        QueryState::Loading { placeholder }
      }
    }
  }

  pub fn data(&self) -> Option<Arc<T>> {
    self.state().data().cloned()
  }

  pub fn is_loading(&self) -> bool {
    self.state().is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state().is_error()
  }
}

// Query is not Clone: each view owns its handle. Views share data through
// the store, not through the handle.

impl<T> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("previous_key", &self.previous_key)
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{build_key, CacheStore, ListParams};
  use crate::resource::ResourceName;
  use futures::FutureExt;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use std::time::Duration;
  use tokio::sync::oneshot;

  fn key(page: u32) -> QueryKey {
    build_key(ResourceName::Note, &ListParams::page(page, 10)).into()
  }

  /// Fetcher returning the page number times ten.
  fn page_fetcher(calls: Arc<AtomicUsize>) -> FetcherFn<u32> {
    Arc::new(move |key: QueryKey| {
      calls.fetch_add(1, Ordering::SeqCst);
      let page = key.as_list().map(|k| k.page).unwrap_or_default();
      async move { Ok::<_, FetchError>(page * 10) }.boxed()
    })
  }

  #[tokio::test]
  async fn test_query_success() {
    let client = QueryClient::new(CacheStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = Query::new(client, key(1), QueryOptions::default(), page_fetcher(calls));

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    let state = query.resolve().await;
    assert!(state.is_success());
    assert_eq!(query.data().as_deref(), Some(&10));
  }

  #[tokio::test]
  async fn test_query_error() {
    let client = QueryClient::new(CacheStore::new());
    let fetcher: FetcherFn<u32> = Arc::new(|_| {
      async { Err(FetchError::Network("timeout of 3000ms exceeded".to_string())) }.boxed()
    });
    let mut query = Query::new(client, key(1), QueryOptions::default(), fetcher);

    let state = query.resolve().await;
    assert!(state.is_error());
    assert_eq!(
      state.error().map(|e| e.message.as_str()),
      Some("timeout of 3000ms exceeded")
    );
    assert_eq!(state.error().unwrap().status, None);
  }

  #[tokio::test]
  async fn test_two_views_one_request() {
    let client = QueryClient::new(CacheStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut a = Query::new(
      client.clone(),
      key(1),
      QueryOptions::default(),
      page_fetcher(calls.clone()),
    );
    let mut b = Query::new(client, key(1), QueryOptions::default(), page_fetcher(calls.clone()));

    a.fetch();
    b.fetch();
    a.resolve().await;
    b.resolve().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(b.data().as_deref(), Some(&10));
  }

  #[tokio::test]
  async fn test_disabled_query_never_fetches() {
    let client = QueryClient::new(CacheStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
      enabled: false,
      ..QueryOptions::default()
    };
    let mut query = Query::new(client, key(1), options, page_fetcher(calls.clone()));

    query.fetch();
    query.poll();
    let state = query.resolve().await;

    assert!(matches!(state, QueryState::Idle));
    assert!(!query.is_loading());
    assert!(query.data().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    query.set_enabled(true);
    assert!(query.resolve().await.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_previous_page_is_placeholder_while_next_loads() {
    let client = QueryClient::new(CacheStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
      enabled: true,
      keep_previous: true,
    };
    let mut query = Query::new(client, key(1), options, page_fetcher(calls));
    query.resolve().await;

    let (tx, rx) = oneshot::channel::<u32>();
    let rx = Arc::new(Mutex::new(Some(rx)));
    query.set_fetcher(Arc::new(move |_| {
      let rx = rx.lock().unwrap().take();
      async move {
        match rx {
          Some(rx) => rx.await.map_err(|_| FetchError::Network("dropped".into())),
          None => Err(FetchError::Network("unexpected request".into())),
        }
      }
      .boxed()
    }));

    query.set_key(key(2));
    query.fetch();

    let state = query.state();
    assert!(state.is_loading());
    assert!(state.is_placeholder());
    assert_eq!(state.data().map(|d| **d), Some(10));

    tx.send(20).unwrap();
    let state = query.resolve().await;
    assert!(state.is_success());
    assert!(!state.is_placeholder());
    assert_eq!(state.data().map(|d| **d), Some(20));
  }

  #[tokio::test]
  async fn test_without_keep_previous_no_placeholder() {
    let client = QueryClient::new(CacheStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = Query::new(client, key(1), QueryOptions::default(), page_fetcher(calls));
    query.resolve().await;

    query.set_fetcher(Arc::new(|_| {
      async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, FetchError>(0)
      }
      .boxed()
    }));
    query.set_key(key(2));
    query.fetch();

    let state = query.state();
    assert!(state.is_loading());
    assert!(state.data().is_none());
  }

  #[tokio::test]
  async fn test_poll_refetches_after_invalidation() {
    let store = CacheStore::new();
    let client = QueryClient::new(store.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut query = Query::new(
      client,
      key(1),
      QueryOptions::default(),
      page_fetcher(calls.clone()),
    );
    query.resolve().await;
    assert!(!query.poll());

    store.invalidate_by_prefix(ResourceName::Note);

    // Stale data is not reported as loaded
    let state = query.state();
    assert!(state.is_loading());
    assert!(state.is_placeholder());

    assert!(query.poll());
    assert!(query.resolve().await.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_refetch_supersedes_pending() {
    let client = QueryClient::new(CacheStore::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let fetcher: FetcherFn<usize> = {
      let counter = counter.clone();
      Arc::new(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
          // The first request is the slow one
          let delay = if n == 0 { 60 } else { 5 };
          tokio::time::sleep(Duration::from_millis(delay)).await;
          Ok::<_, FetchError>(n)
        }
        .boxed()
      })
    };
    let mut query = Query::new(client, key(1), QueryOptions::default(), fetcher);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.refetch();

    let state = query.resolve().await;
    assert_eq!(state.data().map(|d| **d), Some(1));

    // The slow first response arrives later and is dropped
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(query.data().as_deref(), Some(&1));
  }
}
