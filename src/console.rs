//! Typed entry point for views.
//!
//! A [`Console`] owns the shared cache and hands out one [`ResourceApi`] per
//! resource family. Views build their queries and run their mutations
//! through it, so every view of the same listing shares one cache entry and
//! every mutation invalidates what it affects.

use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

use crate::api::types::{
  Article, Category, Comment, ContentCounts, DailyViews, MonthlyViews, Note, PagePayload, Thought,
  ViewTotals, WordCount,
};
use crate::api::{ErrorInfo, FetchError, Transport, ValidationError};
use crate::cache::{
  build_key, CacheStore, Editable, FilterValue, ListParams, Publishable, QueryKey, Record,
  StatsKey, Validate,
};
use crate::mutation::{MutationClient, MutationRecord};
use crate::query::{FetcherFn, Query, QueryClient, QueryOptions};
use crate::resource::{ContentStatus, FilterName, ResourceName};

/// Why a create or update did not happen.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditError {
  /// Rejected before it was sent
  #[error(transparent)]
  Invalid(#[from] ValidationError),

  /// Sent and failed
  #[error(transparent)]
  Failed(#[from] ErrorInfo),
}

/// Shared cache plus the transport that fills it.
#[derive(Clone)]
pub struct Console {
  transport: Arc<dyn Transport>,
  queries: QueryClient,
  mutations: MutationClient,
  keep_previous: bool,
}

impl Console {
  pub fn new(transport: Arc<dyn Transport>) -> Self {
    Self::with_client(transport, QueryClient::new(CacheStore::new()))
  }

  /// Use a configured query client (stale time) and its store.
  pub fn with_client(transport: Arc<dyn Transport>, queries: QueryClient) -> Self {
    let mutations = MutationClient::new(queries.store().clone());
    Self {
      transport,
      queries,
      mutations,
      keep_previous: true,
    }
  }

  /// Whether list queries show the previous page while the next one loads.
  pub fn keep_previous(mut self, keep: bool) -> Self {
    self.keep_previous = keep;
    self
  }

  pub fn store(&self) -> &CacheStore {
    self.queries.store()
  }

  pub fn queries(&self) -> &QueryClient {
    &self.queries
  }

  fn resource<T: Record>(&self, name: ResourceName) -> ResourceApi<T> {
    ResourceApi {
      name,
      transport: Arc::clone(&self.transport),
      queries: self.queries.clone(),
      mutations: self.mutations.clone(),
      keep_previous: self.keep_previous,
      _record: PhantomData,
    }
  }

  pub fn categories(&self) -> ResourceApi<Category> {
    self.resource(ResourceName::Category)
  }

  pub fn articles(&self) -> ResourceApi<Article> {
    self.resource(ResourceName::Article)
  }

  pub fn notes(&self) -> ResourceApi<Note> {
    self.resource(ResourceName::Note)
  }

  pub fn thoughts(&self) -> ResourceApi<Thought> {
    self.resource(ResourceName::Thought)
  }

  /// Comment moderation across all content.
  pub fn comments(&self) -> ResourceApi<Comment> {
    self.resource(ResourceName::Comment)
  }

  /// Guestbook comments.
  pub fn independent_comments(&self) -> ResourceApi<Comment> {
    self.resource(ResourceName::IndependentComment)
  }

  /// Comments on one article. Disabled until the slug is known.
  pub fn article_comments(
    &self,
    slug: Option<&str>,
    params: &ListParams,
  ) -> Query<PagePayload<Comment>> {
    let value = slug.map(|s| FilterValue::Text(s.to_string()));
    self.scoped_comments(FilterName::ArticleSlug, value, params)
  }

  /// Comments on one note. Disabled until the id is known.
  pub fn note_comments(&self, id: Option<u64>, params: &ListParams) -> Query<PagePayload<Comment>> {
    self.scoped_comments(FilterName::NoteId, id.map(FilterValue::Id), params)
  }

  /// Comments on one thought. Disabled until the id is known.
  pub fn thought_comments(
    &self,
    id: Option<u64>,
    params: &ListParams,
  ) -> Query<PagePayload<Comment>> {
    self.scoped_comments(FilterName::ThoughtId, id.map(FilterValue::Id), params)
  }

  fn scoped_comments(
    &self,
    filter: FilterName,
    value: Option<FilterValue>,
    params: &ListParams,
  ) -> Query<PagePayload<Comment>> {
    let value = value.and_then(FilterValue::canonical);
    let enabled = value.is_some();
    let mut params = params.clone();
    params.filters.retain(|name, _| !name.is_scope());
    if let Some(value) = value {
      params.filters.insert(filter, value);
    }
    self.comments().list_with(
      &params,
      QueryOptions {
        enabled,
        keep_previous: self.keep_previous,
      },
    )
  }

  pub fn statistics(&self) -> Statistics {
    Statistics {
      transport: Arc::clone(&self.transport),
      queries: self.queries.clone(),
    }
  }

  /// Drop every cached entry, e.g. after logging out.
  pub fn reset(&self) {
    self.queries.store().clear();
  }
}

impl std::fmt::Debug for Console {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Console")
      .field("entries", &self.store().len())
      .field("keep_previous", &self.keep_previous)
      .finish_non_exhaustive()
  }
}

/// Queries and mutations for one resource family.
pub struct ResourceApi<T> {
  name: ResourceName,
  transport: Arc<dyn Transport>,
  queries: QueryClient,
  mutations: MutationClient,
  keep_previous: bool,
  _record: PhantomData<fn() -> T>,
}

impl<T: Record> ResourceApi<T> {
  pub fn name(&self) -> ResourceName {
    self.name
  }

  /// Canonical key of a listing.
  pub fn key(&self, params: &ListParams) -> QueryKey {
    build_key(self.name, params).into()
  }

  fn fetcher(&self) -> FetcherFn<PagePayload<T>> {
    let transport = Arc::clone(&self.transport);
    Arc::new(move |key: QueryKey| {
      let transport = Arc::clone(&transport);
      async move {
        let QueryKey::List(list) = key else {
          return Err(FetchError::Decode("listing fetched with a statistics key".to_string()));
        };
        let value = transport.list(&list).await?;
        Ok(serde_json::from_value::<PagePayload<T>>(value)?)
      }
      .boxed()
    })
  }

  /// A query for one page of the listing.
  pub fn list(&self, params: &ListParams) -> Query<PagePayload<T>> {
    self.list_with(
      params,
      QueryOptions {
        enabled: true,
        keep_previous: self.keep_previous,
      },
    )
  }

  pub fn list_with(&self, params: &ListParams, options: QueryOptions) -> Query<PagePayload<T>> {
    Query::new(self.queries.clone(), self.key(params), options, self.fetcher())
  }

  /// Read one page through the cache.
  pub async fn fetch_list(&self, params: &ListParams) -> Result<Arc<PagePayload<T>>, ErrorInfo> {
    let key = self.key(params);
    let fetcher = self.fetcher();
    self.queries.fetch(&key, || fetcher(key.clone())).await
  }

  /// Read one page from the server, replacing the cached one.
  pub async fn refetch_list(&self, params: &ListParams) -> Result<Arc<PagePayload<T>>, ErrorInfo> {
    let key = self.key(params);
    let fetcher = self.fetcher();
    self.queries.refetch(&key, || fetcher(key.clone())).await
  }

  pub async fn delete(&self, id: u64) -> Result<(), ErrorInfo> {
    self.delete_with(id, || {}).await
  }

  /// Delete a record; `on_success` runs once affected listings are stale.
  pub async fn delete_with<S: FnOnce()>(&self, id: u64, on_success: S) -> Result<(), ErrorInfo> {
    let transport = Arc::clone(&self.transport);
    let name = self.name;
    self
      .mutations
      .mutate_with(
        MutationRecord::delete(name, id),
        async move { transport.delete(name, id).await },
        |_| on_success(),
        |_| {},
      )
      .await
  }
}

impl<T: Editable> ResourceApi<T> {
  pub async fn create(&self, draft: &T::Draft) -> Result<T, EditError> {
    self.create_with(draft, |_| {}).await
  }

  /// Validate and create a record; `on_success` gets the server's record
  /// once affected listings are stale.
  pub async fn create_with<S: FnOnce(&T)>(
    &self,
    draft: &T::Draft,
    on_success: S,
  ) -> Result<T, EditError> {
    draft.validate()?;
    let body = serde_json::to_value(draft).map_err(|e| ErrorInfo::from(FetchError::from(e)))?;
    let transport = Arc::clone(&self.transport);
    let name = self.name;
    let record = self
      .mutations
      .mutate_with(
        MutationRecord::create(name),
        async move {
          let value = transport.create(name, body).await?;
          Ok::<T, FetchError>(serde_json::from_value::<T>(value)?)
        },
        on_success,
        |_| {},
      )
      .await?;
    Ok(record)
  }

  pub async fn update(&self, id: u64, patch: &T::Patch) -> Result<T, EditError> {
    self.update_with(id, patch, |_| {}).await
  }

  pub async fn update_with<S: FnOnce(&T)>(
    &self,
    id: u64,
    patch: &T::Patch,
    on_success: S,
  ) -> Result<T, EditError> {
    patch.validate()?;
    let body = serde_json::to_value(patch).map_err(|e| ErrorInfo::from(FetchError::from(e)))?;
    let transport = Arc::clone(&self.transport);
    let name = self.name;
    let record = self
      .mutations
      .mutate_with(
        MutationRecord::update(name, id),
        async move {
          let value = transport.update(name, id, body).await?;
          Ok::<T, FetchError>(serde_json::from_value::<T>(value)?)
        },
        on_success,
        |_| {},
      )
      .await?;
    Ok(record)
  }
}

impl<T: Publishable> ResourceApi<T> {
  /// Publish or hide a record.
  pub async fn set_status(&self, id: u64, status: ContentStatus) -> Result<T, EditError> {
    self.update(id, &T::status_patch(status)).await
  }
}

/// Dashboard queries.
pub struct Statistics {
  transport: Arc<dyn Transport>,
  queries: QueryClient,
}

impl Statistics {
  fn fetcher<T: DeserializeOwned + Send + Sync + 'static>(&self) -> FetcherFn<T> {
    let transport = Arc::clone(&self.transport);
    Arc::new(move |key: QueryKey| {
      let transport = Arc::clone(&transport);
      async move {
        let QueryKey::Stats(stats) = key else {
          return Err(FetchError::Decode("statistics fetched with a list key".to_string()));
        };
        let value = transport.statistics(&stats).await?;
        Ok(serde_json::from_value::<T>(value)?)
      }
      .boxed()
    })
  }

  /// A query for `key`. Date-ranged keys stay disabled until both dates are
  /// set.
  pub fn query<T: DeserializeOwned + Send + Sync + 'static>(&self, key: StatsKey) -> Query<T> {
    let options = QueryOptions {
      enabled: key.is_ready(),
      keep_previous: false,
    };
    Query::new(self.queries.clone(), key.into(), options, self.fetcher())
  }

  /// Read `key` through the cache.
  pub async fn fetch<T: DeserializeOwned + Send + Sync + 'static>(
    &self,
    key: StatsKey,
  ) -> Result<Arc<T>, ErrorInfo> {
    let key = QueryKey::from(key);
    let fetcher = self.fetcher::<T>();
    self.queries.fetch(&key, || fetcher(key.clone())).await
  }

  pub fn counts(&self) -> Query<ContentCounts> {
    self.query(StatsKey::Counts)
  }

  pub fn views(&self) -> Query<ViewTotals> {
    self.query(StatsKey::Views)
  }

  pub fn word_count(&self) -> Query<WordCount> {
    self.query(StatsKey::WordCount)
  }

  pub fn daily_views(&self, start: &str, end: &str) -> Query<Vec<DailyViews>> {
    self.query(StatsKey::daily_views(start, end))
  }

  pub fn monthly_views(&self, start: &str, end: &str) -> Query<Vec<MonthlyViews>> {
    self.query(StatsKey::monthly_views(start, end))
  }
}
