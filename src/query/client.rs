//! Request coordination for cached queries.

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::api::{ErrorInfo, FetchError};
use crate::cache::{CacheEntry, CacheStore, FetchStatus, Payload, QueryKey};

/// Handle to a request in flight. Cloning it joins the same request.
pub type SharedRequest = Shared<BoxFuture<'static, Result<Payload, ErrorInfo>>>;

struct InFlight {
  seq: u64,
  request: SharedRequest,
}

/// Coordinates fetches against a [`CacheStore`].
///
/// - at most one request per key is in flight; callers asking for the same
///   key join it
/// - every request carries a sequence number and only the newest one for a
///   key may write its result, so a slow response never overwrites a newer one
/// - requests are spawned, so they complete even if every caller goes away
#[derive(Clone)]
pub struct QueryClient {
  store: CacheStore,
  in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
  stale_time: Duration,
}

impl QueryClient {
  pub fn new(store: CacheStore) -> Self {
    Self {
      store,
      in_flight: Arc::new(Mutex::new(HashMap::new())),
      stale_time: Duration::seconds(60),
    }
  }

  /// Set how long successful data is served without a refetch.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  pub fn stale_time(&self) -> Duration {
    self.stale_time
  }

  fn requests(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
    lock_requests(&self.in_flight)
  }

  /// Whether reading `key` now should start a request.
  pub fn needs_fetch(&self, key: &QueryKey) -> bool {
    match self.store.get(key) {
      Some(entry) => entry.needs_fetch(self.stale_time, Utc::now()),
      None => true,
    }
  }

  /// The current request for `key`, if one is in flight and not superseded.
  pub fn pending(&self, key: &QueryKey) -> Option<SharedRequest> {
    let current = self.store.request_seq(key)?;
    self
      .requests()
      .get(&key.cache_hash())
      .filter(|in_flight| in_flight.seq == current)
      .map(|in_flight| in_flight.request.clone())
  }

  /// Make sure a request for `key` is running and return a handle to it.
  ///
  /// Joins the current request unless `force` is set, in which case a new
  /// request supersedes it. `placeholder_from` names a key whose data may be
  /// shown while `key` loads for the first time.
  pub fn ensure<T, F, Fut>(
    &self,
    key: &QueryKey,
    placeholder_from: Option<&QueryKey>,
    force: bool,
    fetcher: F,
  ) -> SharedRequest
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    let hash = key.cache_hash();
    let mut requests = self.requests();

    if !force {
      let current = self.store.request_seq(key);
      if let Some(in_flight) = requests.get(&hash) {
        if current == Some(in_flight.seq) {
          debug!(key = %key.description(), "joining in-flight request");
          return in_flight.request.clone();
        }
      }
    }

    let seq = self.store.begin_request(key, placeholder_from);
    debug!(key = %key.description(), seq, force, "starting request");

    let store = self.store.clone();
    let registry = Arc::clone(&self.in_flight);
    let settle_key = key.clone();
    let settle_hash = hash.clone();
    let response = fetcher();

    let request = async move {
      let result = response
        .await
        .map(|data| Arc::new(data) as Payload)
        .map_err(|err| {
          warn!(key = %settle_key.description(), error = %err, "request failed");
          ErrorInfo::from(err)
        });

      if !store.settle(&settle_key, seq, result.clone()) {
        debug!(key = %settle_key.description(), seq, "discarding superseded response");
      }

      let mut requests = lock_requests(&registry);
      if requests.get(&settle_hash).map(|f| f.seq) == Some(seq) {
        requests.remove(&settle_hash);
      }
      result
    }
    .boxed()
    .shared();

    requests.insert(
      hash,
      InFlight {
        seq,
        request: request.clone(),
      },
    );
    drop(requests);

    tokio::spawn(request.clone());
    request
  }

  /// Read `key` through the cache.
  ///
  /// Fresh data is returned without a request; otherwise the (possibly
  /// shared) request is awaited and the result is read back from the store,
  /// so a superseded response is never returned. A cached failure is
  /// returned as is; use [`QueryClient::refetch`] to retry it.
  pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, ErrorInfo>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    loop {
      if let Some(entry) = self.store.get(key) {
        if !entry.needs_fetch(self.stale_time, Utc::now()) && entry.status != FetchStatus::Loading {
          debug!(key = %key.description(), "cache hit");
          return read_entry(&entry);
        }
      }

      let request = match self.pending(key) {
        Some(request) => request,
        None => self.ensure(key, None, false, &fetcher),
      };
      let _ = request.await;

      if let Some(entry) = self.store.get(key) {
        if matches!(entry.status, FetchStatus::Success | FetchStatus::Error) {
          return read_entry(&entry);
        }
      }
      // Superseded or invalidated while waiting; go around again.
    }
  }

  /// Force a new request for `key` and wait for it.
  pub async fn refetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, ErrorInfo>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    let request = self.ensure(key, None, true, &fetcher);
    let _ = request.await;
    self.fetch(key, fetcher).await
  }
}

fn lock_requests(
  requests: &Mutex<HashMap<String, InFlight>>,
) -> MutexGuard<'_, HashMap<String, InFlight>> {
  match requests.lock() {
    Ok(guard) => guard,
    Err(poisoned) => {
      warn!("Recovered from poisoned request registry lock");
      poisoned.into_inner()
    }
  }
}

fn read_entry<T: Send + Sync + 'static>(entry: &CacheEntry) -> Result<Arc<T>, ErrorInfo> {
  match entry.status {
    FetchStatus::Error => Err(
      entry
        .error
        .clone()
        .unwrap_or_else(|| ErrorInfo::new("request failed")),
    ),
    _ => entry.data_as::<T>().ok_or_else(|| {
      ErrorInfo::new(format!(
        "cached data for {} has an unexpected type",
        entry.key.description()
      ))
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{build_key, ListParams, Scope};
  use crate::resource::ResourceName;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::oneshot;

  fn key(page: u32) -> QueryKey {
    build_key(ResourceName::Article, &ListParams::page(page, 10)).into()
  }

  fn counting_fetcher(
    calls: Arc<AtomicUsize>,
    value: u32,
  ) -> impl Fn() -> BoxFuture<'static, Result<u32, FetchError>> {
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async move { Ok::<_, FetchError>(value) }.boxed()
    }
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_request() {
    let client = QueryClient::new(CacheStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let key = key(1);

    let (tx, rx) = oneshot::channel::<u32>();
    let rx = Arc::new(Mutex::new(Some(rx)));
    let fetcher = {
      let calls = calls.clone();
      move || {
        calls.fetch_add(1, Ordering::SeqCst);
        let rx = rx.lock().unwrap().take();
        async move {
          match rx {
            Some(rx) => rx.await.map_err(|_| FetchError::Network("dropped".into())),
            None => Err(FetchError::Network("second request".into())),
          }
        }
      }
    };

    let first = client.ensure(&key, None, false, &fetcher);
    let second = client.ensure(&key, None, false, &fetcher);
    tx.send(7).unwrap();

    assert!(first.await.is_ok());
    assert!(second.await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let data: Arc<u32> = client.fetch(&key, &fetcher).await.unwrap();
    assert_eq!(*data, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_last_request_wins() {
    let client = QueryClient::new(CacheStore::new());
    let key = key(1);

    let (tx_a, rx_a) = oneshot::channel::<u32>();
    let (tx_b, rx_b) = oneshot::channel::<u32>();

    let request_a = client.ensure(&key, None, false, move || async move {
      rx_a.await.map_err(|_| FetchError::Network("dropped".into()))
    });
    let request_b = client.ensure(&key, None, true, move || async move {
      rx_b.await.map_err(|_| FetchError::Network("dropped".into()))
    });

    tx_b.send(2).unwrap();
    request_b.await.unwrap();
    tx_a.send(1).unwrap();
    request_a.await.unwrap();

    let entry = client.store().get(&key).unwrap();
    assert_eq!(entry.status, FetchStatus::Success);
    assert_eq!(*entry.data_as::<u32>().unwrap(), 2);
  }

  #[tokio::test]
  async fn test_fresh_data_is_served_from_cache() {
    let client = QueryClient::new(CacheStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), 3);

    let first: Arc<u32> = client.fetch(&key(1), &fetcher).await.unwrap();
    let second: Arc<u32> = client.fetch(&key(1), &fetcher).await.unwrap();
    assert_eq!((*first, *second), (3, 3));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_zero_stale_time_refetches_every_read() {
    let client = QueryClient::new(CacheStore::new()).with_stale_time(Duration::zero());
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), 3);

    let _: Arc<u32> = client.fetch(&key(1), &fetcher).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let _: Arc<u32> = client.fetch(&key(1), &fetcher).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidated_entry_is_refetched() {
    let client = QueryClient::new(CacheStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), 9);

    for page in [1, 2] {
      let _: Arc<u32> = client.fetch(&key(page), &fetcher).await.unwrap();
    }
    client
      .store()
      .invalidate_scope(Scope::Resource(ResourceName::Article));

    for page in [1, 2] {
      assert!(client.needs_fetch(&key(page)));
      let _: Arc<u32> = client.fetch(&key(page), &fetcher).await.unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn test_failure_is_stored_and_not_retried_until_refetch() {
    let client = QueryClient::new(CacheStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let failing = {
      let calls = calls.clone();
      move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
          Err::<u32, _>(FetchError::Server {
            status: 500,
            message: "database unavailable".into(),
          })
        }
      }
    };

    let err = client.fetch::<u32, _, _>(&key(1), &failing).await.unwrap_err();
    assert_eq!(err.status, Some(500));
    assert_eq!(err.message, "database unavailable");

    let again = client.fetch::<u32, _, _>(&key(1), &failing).await.unwrap_err();
    assert_eq!(again, err);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let recovered: Arc<u32> = client
      .refetch(&key(1), counting_fetcher(calls.clone(), 4))
      .await
      .unwrap();
    assert_eq!(*recovered, 4);
  }

  #[tokio::test]
  async fn test_invalidation_during_request_discards_response() {
    let client = QueryClient::new(CacheStore::new());
    let key = key(1);
    let (tx, rx) = oneshot::channel::<u32>();

    let request = client.ensure(&key, None, false, move || async move {
      rx.await.map_err(|_| FetchError::Network("dropped".into()))
    });
    client.store().invalidate_by_prefix(ResourceName::Article);
    assert!(client.pending(&key).is_none());

    tx.send(1).unwrap();
    request.await.unwrap();

    let entry = client.store().get(&key).unwrap();
    assert_eq!(entry.status, FetchStatus::Idle);
    assert!(entry.data.is_none());
  }
}
