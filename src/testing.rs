//! In-memory content API for tests.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use crate::api::{FetchError, Transport};
use crate::cache::{FilterValue, ListKey, StatsKey};
use crate::resource::{FilterName, ResourceName, SortOrder};

const TIMESTAMP: &str = "2024-01-01T00:00:00Z";

#[derive(Default)]
struct State {
  /// Comments and guestbook comments share one table
  records: HashMap<ResourceName, Vec<Value>>,
  next_id: u64,
  list_calls: HashMap<ResourceName, usize>,
  stats_calls: usize,
  fail_next: Option<FetchError>,
}

/// Fake backend implementing [`Transport`] over JSON records.
///
/// Supports paging, filters, search and sort the way the real API does,
/// counts list requests per family, and can hold list responses until
/// released.
pub(crate) struct FakeBackend {
  state: Mutex<State>,
  gate: watch::Sender<bool>,
}

impl FakeBackend {
  pub fn new() -> Self {
    let (gate, _) = watch::channel(true);
    Self {
      state: Mutex::new(State {
        next_id: 1,
        ..State::default()
      }),
      gate,
    }
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap()
  }

  fn table(resource: ResourceName) -> ResourceName {
    match resource {
      ResourceName::IndependentComment => ResourceName::Comment,
      other => other,
    }
  }

  /// Insert records as-is. Ids already present in the records are kept.
  pub fn seed(&self, resource: ResourceName, records: Vec<Value>) {
    let mut state = self.state();
    for record in records {
      let id = record["id"].as_u64().unwrap_or_default();
      state.next_id = state.next_id.max(id + 1);
      state
        .records
        .entry(Self::table(resource))
        .or_default()
        .push(record);
    }
  }

  pub fn with_categories(self, count: u64) -> Self {
    let records = (1..=count)
      .map(|id| category(id, &format!("Category {}", id)))
      .collect();
    self.seed(ResourceName::Category, records);
    self
  }

  pub fn list_calls(&self, resource: ResourceName) -> usize {
    self.state().list_calls.get(&resource).copied().unwrap_or_default()
  }

  pub fn stats_calls(&self) -> usize {
    self.state().stats_calls
  }

  pub fn count(&self, resource: ResourceName) -> usize {
    self
      .state()
      .records
      .get(&Self::table(resource))
      .map_or(0, Vec::len)
  }

  /// Make the next request fail with `err`.
  pub fn fail_next(&self, err: FetchError) {
    self.state().fail_next = Some(err);
  }

  /// Hold list responses until [`FakeBackend::release`].
  pub fn hold(&self) {
    self.gate.send_replace(false);
  }

  pub fn release(&self) {
    self.gate.send_replace(true);
  }

  fn take_failure(&self) -> Result<(), FetchError> {
    match self.state().fail_next.take() {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  fn not_found(resource: ResourceName, id: u64) -> FetchError {
    FetchError::Server {
      status: 404,
      message: format!("{} {} not found", resource, id),
    }
  }
}

#[async_trait]
impl Transport for FakeBackend {
  async fn list(&self, key: &ListKey) -> Result<Value, FetchError> {
    *self.state().list_calls.entry(key.resource).or_default() += 1;

    let mut gate = self.gate.subscribe();
    let _ = gate.wait_for(|open| *open).await;
    self.take_failure()?;

    let state = self.state();
    let mut items: Vec<Value> = state
      .records
      .get(&Self::table(key.resource))
      .map(|records| {
        records
          .iter()
          .filter(|record| matches(key, record))
          .cloned()
          .collect()
      })
      .unwrap_or_default();

    if let Some(field) = key.sort_field {
      let desc = key.sort_order == Some(SortOrder::Desc);
      items.sort_by(|a, b| {
        let ordering = compare(&a[field.param()], &b[field.param()]);
        if desc {
          ordering.reverse()
        } else {
          ordering
        }
      });
    }

    let total = items.len();
    let start = (key.page as usize - 1) * key.limit as usize;
    let items: Vec<Value> = items.into_iter().skip(start).take(key.limit as usize).collect();
    Ok(json!({
      "items": items,
      "total": total,
      "page": key.page,
      "limit": key.limit,
    }))
  }

  async fn create(&self, resource: ResourceName, body: Value) -> Result<Value, FetchError> {
    self.take_failure()?;
    let mut state = self.state();
    let id = state.next_id;
    state.next_id += 1;

    let mut record = defaults(resource, id);
    if let (Some(record), Value::Object(fields)) = (record.as_object_mut(), body) {
      record.extend(fields);
    }
    state
      .records
      .entry(Self::table(resource))
      .or_default()
      .push(record.clone());
    Ok(record)
  }

  async fn update(
    &self,
    resource: ResourceName,
    id: u64,
    body: Value,
  ) -> Result<Value, FetchError> {
    self.take_failure()?;
    let mut state = self.state();
    let record = state
      .records
      .get_mut(&Self::table(resource))
      .and_then(|records| records.iter_mut().find(|r| r["id"].as_u64() == Some(id)))
      .ok_or_else(|| Self::not_found(resource, id))?;
    if let (Some(record), Value::Object(fields)) = (record.as_object_mut(), body) {
      record.extend(fields);
      record.insert("updatedAt".to_string(), json!(TIMESTAMP));
    }
    Ok(record.clone())
  }

  async fn delete(&self, resource: ResourceName, id: u64) -> Result<(), FetchError> {
    self.take_failure()?;
    let mut state = self.state();
    let records = state.records.entry(Self::table(resource)).or_default();
    let before = records.len();
    records.retain(|r| r["id"].as_u64() != Some(id));
    if records.len() == before {
      return Err(Self::not_found(resource, id));
    }
    Ok(())
  }

  async fn statistics(&self, key: &StatsKey) -> Result<Value, FetchError> {
    self.take_failure()?;
    let mut state = self.state();
    state.stats_calls += 1;

    let records = |name: ResourceName| state.records.get(&name).cloned().unwrap_or_default();
    let published = |name: ResourceName| {
      records(name)
        .iter()
        .filter(|r| r["status"] == "published")
        .count()
    };
    let sum = |name: ResourceName, field: &str| -> u64 {
      records(name).iter().filter_map(|r| r[field].as_u64()).sum()
    };
    let words = |name: ResourceName| -> usize {
      records(name)
        .iter()
        .filter_map(|r| r["content"].as_str())
        .map(|c| c.split_whitespace().count())
        .sum()
    };

    let value = match key {
      StatsKey::Counts => json!({
        "categoryCount": records(ResourceName::Category).len(),
        "publishedArticleCount": published(ResourceName::Article),
        "publishedNoteCount": published(ResourceName::Note),
        "publishedThoughtCount": published(ResourceName::Thought),
        "commentCount": records(ResourceName::Comment).len(),
      }),
      StatsKey::Views => json!({
        "articleViews": sum(ResourceName::Article, "views"),
        "noteViews": sum(ResourceName::Note, "views"),
      }),
      StatsKey::WordCount => json!({
        "articleWordCount": words(ResourceName::Article),
        "noteWordCount": words(ResourceName::Note),
        "thoughtWordCount": words(ResourceName::Thought),
      }),
      StatsKey::DailyViews { start, .. } => json!([
        {
          "date": start,
          "articleViews": sum(ResourceName::Article, "views"),
          "noteViews": 0,
        }
      ]),
      StatsKey::MonthlyViews { .. } => json!([
        {
          "year": 2024,
          "month": 1,
          "articleViews": sum(ResourceName::Article, "views"),
          "noteViews": 0,
        }
      ]),
    };
    Ok(value)
  }
}

fn matches(key: &ListKey, record: &Value) -> bool {
  if key.resource == ResourceName::IndependentComment && has_target(record) {
    return false;
  }

  let filters_match = key.filters.iter().all(|(name, value)| {
    let Some(value) = value else {
      return true;
    };
    match (name, value) {
      (FilterName::FilterType, FilterValue::Text(kind)) => match kind.as_str() {
        "article" => !record["articleSlug"].is_null(),
        "note" => !record["noteId"].is_null(),
        "thought" => !record["thoughtId"].is_null(),
        "independent" => !has_target(record),
        _ => true,
      },
      (name, FilterValue::Id(id)) => record[name.param()].as_u64() == Some(*id),
      (name, value) => record[name.param()].as_str() == Some(value.as_param().as_str()),
    }
  });

  let search_matches = key.search.as_ref().map_or(true, |search| {
    let search = search.to_lowercase();
    ["title", "content", "name", "nickname"].iter().any(|field| {
      record[*field]
        .as_str()
        .is_some_and(|text| text.to_lowercase().contains(&search))
    })
  });

  filters_match && search_matches
}

fn has_target(record: &Value) -> bool {
  ["articleSlug", "noteId", "thoughtId"]
    .iter()
    .any(|field| !record[*field].is_null())
}

fn compare(a: &Value, b: &Value) -> Ordering {
  match (a, b) {
    (Value::Number(a), Value::Number(b)) => a
      .as_f64()
      .partial_cmp(&b.as_f64())
      .unwrap_or(Ordering::Equal),
    (Value::String(a), Value::String(b)) => a.cmp(b),
    _ => Ordering::Equal,
  }
}

fn defaults(resource: ResourceName, id: u64) -> Value {
  let mut record = Map::new();
  record.insert("id".to_string(), json!(id));
  record.insert("createdAt".to_string(), json!(TIMESTAMP));
  match resource {
    ResourceName::Category => {
      record.insert("articleCount".to_string(), json!(0));
    }
    ResourceName::Article | ResourceName::Note => {
      record.insert("updatedAt".to_string(), json!(TIMESTAMP));
      record.insert("views".to_string(), json!(0));
      record.insert("likesCount".to_string(), json!(0));
    }
    ResourceName::Thought => {
      record.insert("likesCount".to_string(), json!(0));
    }
    ResourceName::Comment | ResourceName::IndependentComment => {}
  }
  Value::Object(record)
}

pub(crate) fn category(id: u64, name: &str) -> Value {
  json!({
    "id": id,
    "name": name,
    "slug": format!("category-{}", id),
    "articleCount": 0,
  })
}

pub(crate) fn article(id: u64, title: &str, status: &str, category_id: u64) -> Value {
  json!({
    "id": id,
    "createdAt": format!("2024-01-{:02}T00:00:00Z", id.min(28)),
    "updatedAt": TIMESTAMP,
    "title": title,
    "content": format!("{} body", title),
    "status": status,
    "likesCount": 0,
    "views": id * 10,
    "slug": format!("article-{}", id),
    "categoryId": category_id,
  })
}

pub(crate) fn note(id: u64, title: &str, status: &str) -> Value {
  json!({
    "id": id,
    "createdAt": TIMESTAMP,
    "updatedAt": TIMESTAMP,
    "title": title,
    "content": format!("{} body", title),
    "status": status,
    "views": 0,
    "likesCount": 0,
  })
}

/// A comment on an article (`Some(slug)`) or on the guestbook (`None`).
pub(crate) fn comment(id: u64, content: &str, article_slug: Option<&str>) -> Value {
  let mut record = json!({
    "id": id,
    "content": content,
    "createdAt": TIMESTAMP,
    "nickname": "reader",
  });
  if let Some(slug) = article_slug {
    record["articleSlug"] = json!(slug);
  }
  record
}
