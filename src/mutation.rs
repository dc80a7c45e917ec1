//! Mutations and the invalidation they trigger.
//!
//! Mutations are pessimistic: nothing in the cache changes until the server
//! has confirmed the write. On success every listing that could show the
//! changed record is marked stale, then the caller's success hook runs.

use std::fmt;
use std::future::Future;
use tracing::{info, warn};

use crate::api::{ErrorInfo, FetchError};
use crate::cache::{CacheStore, Scope};
use crate::resource::ResourceName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
  Create,
  Update,
  Delete,
}

impl fmt::Display for MutationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      MutationKind::Create => "create",
      MutationKind::Update => "update",
      MutationKind::Delete => "delete",
    })
  }
}

/// What a mutation does, for invalidation and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
  pub resource: ResourceName,
  pub kind: MutationKind,
  /// Absent for creates
  pub target_id: Option<u64>,
}

impl MutationRecord {
  pub fn create(resource: ResourceName) -> Self {
    Self {
      resource,
      kind: MutationKind::Create,
      target_id: None,
    }
  }

  pub fn update(resource: ResourceName, id: u64) -> Self {
    Self {
      resource,
      kind: MutationKind::Update,
      target_id: Some(id),
    }
  }

  pub fn delete(resource: ResourceName, id: u64) -> Self {
    Self {
      resource,
      kind: MutationKind::Delete,
      target_id: Some(id),
    }
  }

  /// Every scope a successful mutation makes stale: the family itself, the
  /// families its records show up in, and the dashboard.
  pub fn scopes(&self) -> Vec<Scope> {
    let mut scopes = vec![Scope::Resource(self.resource)];
    scopes.extend(
      self
        .resource
        .descriptor()
        .cascades
        .iter()
        .map(|name| Scope::Resource(*name)),
    );
    scopes.push(Scope::Statistics);
    scopes
  }
}

impl fmt::Display for MutationRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.target_id {
      Some(id) => write!(f, "{} {} #{}", self.kind, self.resource, id),
      None => write!(f, "{} {}", self.kind, self.resource),
    }
  }
}

/// Runs mutations against the shared store.
#[derive(Clone)]
pub struct MutationClient {
  store: CacheStore,
}

impl MutationClient {
  pub fn new(store: CacheStore) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  /// Await `request`; on success invalidate everything the change affects
  /// and return the server's response.
  pub async fn mutate<T, Fut>(&self, record: MutationRecord, request: Fut) -> Result<T, ErrorInfo>
  where
    Fut: Future<Output = Result<T, FetchError>>,
  {
    self.mutate_with(record, request, |_| {}, |_| {}).await
  }

  /// Like [`MutationClient::mutate`], with hooks. `on_success` runs after
  /// invalidation, so a listing it refetches sees the change. `on_error` runs
  /// with the normalized error; the cache is left alone.
  pub async fn mutate_with<T, Fut, S, E>(
    &self,
    record: MutationRecord,
    request: Fut,
    on_success: S,
    on_error: E,
  ) -> Result<T, ErrorInfo>
  where
    Fut: Future<Output = Result<T, FetchError>>,
    S: FnOnce(&T),
    E: FnOnce(&ErrorInfo),
  {
    match request.await {
      Ok(response) => {
        let touched = self.invalidate(&record);
        info!(mutation = %record, touched, "mutation succeeded");
        on_success(&response);
        Ok(response)
      }
      Err(err) => {
        let error = ErrorInfo::from(err);
        warn!(mutation = %record, error = %error, "mutation failed");
        on_error(&error);
        Err(error)
      }
    }
  }

  /// Invalidate every scope affected by `record`. Returns the number of
  /// entries marked stale.
  pub fn invalidate(&self, record: &MutationRecord) -> usize {
    record
      .scopes()
      .into_iter()
      .map(|scope| self.store.invalidate_scope(scope))
      .sum()
  }
}

impl fmt::Debug for MutationClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MutationClient")
      .field("entries", &self.store.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{build_key, FetchStatus, ListParams, QueryKey, StatsKey};
  use crate::query::QueryClient;
  use std::sync::{Arc, Mutex};

  async fn cached(client: &QueryClient, key: &QueryKey) {
    let result: Result<Arc<u32>, ErrorInfo> = client
      .fetch(key, || async { Ok::<_, FetchError>(1u32) })
      .await;
    assert!(result.is_ok());
  }

  fn list_key(resource: ResourceName) -> QueryKey {
    build_key(resource, &ListParams::default()).into()
  }

  #[test]
  fn test_scopes_follow_cascades() {
    let scopes = MutationRecord::update(ResourceName::Article, 3).scopes();
    assert_eq!(
      scopes,
      vec![
        Scope::Resource(ResourceName::Article),
        Scope::Resource(ResourceName::Category),
        Scope::Resource(ResourceName::Comment),
        Scope::Statistics,
      ]
    );
  }

  #[test]
  fn test_record_display() {
    assert_eq!(
      MutationRecord::delete(ResourceName::Comment, 42).to_string(),
      "delete comment #42"
    );
    assert_eq!(
      MutationRecord::create(ResourceName::Category).to_string(),
      "create category"
    );
  }

  #[tokio::test]
  async fn test_success_invalidates_before_callback() {
    let store = CacheStore::new();
    let queries = QueryClient::new(store.clone());
    let mutations = MutationClient::new(store.clone());

    let categories = list_key(ResourceName::Category);
    let articles = list_key(ResourceName::Article);
    let notes = list_key(ResourceName::Note);
    let counts = QueryKey::Stats(StatsKey::Counts);
    for key in [&categories, &articles, &notes, &counts] {
      cached(&queries, key).await;
    }

    let seen = Arc::new(Mutex::new(None));
    let seen_in_hook = seen.clone();
    let hook_store = store.clone();
    let hook_key = categories.clone();
    let created = mutations
      .mutate_with(
        MutationRecord::create(ResourceName::Category),
        async { Ok::<_, FetchError>(11u64) },
        move |id| {
          let status = hook_store.get(&hook_key).map(|e| e.status);
          *seen_in_hook.lock().unwrap() = Some((*id, status));
        },
        |_| panic!("unexpected failure"),
      )
      .await
      .unwrap();

    assert_eq!(created, 11);
    assert_eq!(*seen.lock().unwrap(), Some((11, Some(FetchStatus::Idle))));

    // Category cascades to articles; notes are unrelated
    assert_eq!(store.get(&articles).unwrap().status, FetchStatus::Idle);
    assert_eq!(store.get(&counts).unwrap().status, FetchStatus::Idle);
    assert_eq!(store.get(&notes).unwrap().status, FetchStatus::Success);
  }

  #[tokio::test]
  async fn test_failure_leaves_cache_untouched() {
    let store = CacheStore::new();
    let queries = QueryClient::new(store.clone());
    let mutations = MutationClient::new(store.clone());
    let comments = list_key(ResourceName::Comment);
    cached(&queries, &comments).await;

    let reported = Arc::new(Mutex::new(None));
    let reported_in_hook = reported.clone();
    let result: Result<(), ErrorInfo> = mutations
      .mutate_with(
        MutationRecord::delete(ResourceName::Comment, 42),
        async {
          Err(FetchError::Server {
            status: 403,
            message: "Forbidden".to_string(),
          })
        },
        |_| panic!("unexpected success"),
        move |err| *reported_in_hook.lock().unwrap() = Some(err.clone()),
      )
      .await;

    let err = result.unwrap_err();
    assert_eq!(err.status, Some(403));
    assert_eq!(err.message, "Forbidden");
    assert_eq!(reported.lock().unwrap().as_ref(), Some(&err));
    assert_eq!(store.get(&comments).unwrap().status, FetchStatus::Success);
  }

  #[tokio::test]
  async fn test_comment_delete_invalidates_independent_comments() {
    let store = CacheStore::new();
    let queries = QueryClient::new(store.clone());
    let mutations = MutationClient::new(store.clone());
    let independent = list_key(ResourceName::IndependentComment);
    cached(&queries, &independent).await;

    mutations
      .mutate(MutationRecord::delete(ResourceName::Comment, 42), async {
        Ok::<_, FetchError>(())
      })
      .await
      .unwrap();

    assert_eq!(store.get(&independent).unwrap().status, FetchStatus::Idle);
  }
}
