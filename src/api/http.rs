//! HTTP transport for the content API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{FetchError, Transport};
use crate::cache::{ListKey, StatsKey};
use crate::resource::{FilterName, ResourceName};

/// Reqwest-backed [`Transport`].
#[derive(Clone)]
pub struct HttpTransport {
  client: Client,
  base: Url,
  token: Option<String>,
}

impl HttpTransport {
  pub fn new(base_url: &str, timeout: Duration, token: Option<String>) -> Result<Self, FetchError> {
    let mut base = Url::parse(base_url)
      .map_err(|e| FetchError::Network(format!("invalid API url {}: {}", base_url, e)))?;
    if base.cannot_be_a_base() {
      return Err(FetchError::Network(format!("invalid API url {}", base_url)));
    }
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let client = Client::builder()
      .timeout(timeout)
      .user_agent(concat!("quire/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base,
      token,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn url(&self, segments: &[String], query: &[(&'static str, String)]) -> Result<Url, FetchError> {
    let mut url = self.base.clone();
    {
      let mut path = url
        .path_segments_mut()
        .map_err(|_| FetchError::Network(format!("invalid API url {}", self.base)))?;
      path.pop_if_empty();
      path.extend(segments);
    }
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
    }
    Ok(url)
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    debug!(%method, %url, "api request");
    let builder = self.client.request(method, url);
    match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    }
  }

  async fn send(&self, builder: RequestBuilder) -> Result<Value, FetchError> {
    let response = builder.send().await?;
    read_response(response).await
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn list(&self, key: &ListKey) -> Result<Value, FetchError> {
    let url = self.url(&list_path(key), &list_query(key))?;
    self.send(self.request(Method::GET, url)).await
  }

  async fn create(&self, resource: ResourceName, body: Value) -> Result<Value, FetchError> {
    let url = self.url(&record_path(resource, None), &[])?;
    self.send(self.request(Method::POST, url).json(&body)).await
  }

  async fn update(
    &self,
    resource: ResourceName,
    id: u64,
    body: Value,
  ) -> Result<Value, FetchError> {
    let url = self.url(&record_path(resource, Some(id)), &[])?;
    self.send(self.request(Method::PUT, url).json(&body)).await
  }

  async fn delete(&self, resource: ResourceName, id: u64) -> Result<(), FetchError> {
    let url = self.url(&record_path(resource, Some(id)), &[])?;
    self.send(self.request(Method::DELETE, url)).await.map(|_| ())
  }

  async fn statistics(&self, key: &StatsKey) -> Result<Value, FetchError> {
    let url = self.url(&stats_path(key), &stats_query(key))?;
    self.send(self.request(Method::GET, url)).await
  }
}

impl std::fmt::Debug for HttpTransport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HttpTransport")
      .field("base", &self.base.as_str())
      .field("authenticated", &self.token.is_some())
      .finish()
  }
}

async fn read_response(response: Response) -> Result<Value, FetchError> {
  let status = response.status();
  let body = response.text().await?;

  if !status.is_success() {
    let message = error_message(&body)
      .or_else(|| status.canonical_reason().map(String::from))
      .unwrap_or_else(|| "request failed".to_string());
    warn!(status = status.as_u16(), %message, "api error");
    return Err(FetchError::Server {
      status: status.as_u16(),
      message,
    });
  }

  if body.trim().is_empty() {
    return Ok(Value::Null);
  }
  Ok(serde_json::from_str(&body)?)
}

/// Extract the `message` field of an error body. Validation errors carry a
/// list of messages.
fn error_message(body: &str) -> Option<String> {
  let value: Value = serde_json::from_str(body).ok()?;
  match value.get("message")? {
    Value::String(message) => Some(message.clone()),
    Value::Array(messages) => {
      let parts: Vec<&str> = messages.iter().filter_map(Value::as_str).collect();
      (!parts.is_empty()).then(|| parts.join("; "))
    }
    _ => None,
  }
}

fn collection(resource: ResourceName) -> Vec<String> {
  let segments: &[&str] = match resource {
    ResourceName::Category => &["admin", "categories"],
    ResourceName::Article => &["admin", "articles"],
    ResourceName::Note => &["admin", "notes"],
    ResourceName::Thought => &["admin", "thoughts"],
    ResourceName::Comment => &["admin", "comments"],
    ResourceName::IndependentComment => &["comments", "independent"],
  };
  segments.iter().map(|s| s.to_string()).collect()
}

/// Path of a listing. Comment listings scoped to one piece of content are
/// served from the public comment endpoints.
fn list_path(key: &ListKey) -> Vec<String> {
  if key.resource == ResourceName::Comment {
    if let Some((filter, value)) = key.scope_filter() {
      let kind = match filter {
        FilterName::ArticleSlug => "article",
        FilterName::NoteId => "note",
        _ => "thought",
      };
      return vec!["comments".to_string(), kind.to_string(), value.as_param()];
    }
  }
  collection(key.resource)
}

fn list_query(key: &ListKey) -> Vec<(&'static str, String)> {
  let mut query = vec![("page", key.page.to_string()), ("limit", key.limit.to_string())];
  // Scoped listings only take paging
  if key.scope_filter().is_some() {
    return query;
  }
  for (name, value) in &key.filters {
    if let Some(value) = value {
      query.push((name.param(), value.as_param()));
    }
  }
  if let Some(field) = key.sort_field {
    query.push(("sortField", field.param().to_string()));
  }
  if let Some(order) = key.sort_order {
    query.push(("sortOrder", order.param().to_string()));
  }
  if let Some(search) = &key.search {
    query.push(("search", search.clone()));
  }
  query
}

/// Path of a mutation. Every comment, guestbook or not, is moderated through
/// the admin comment endpoint.
fn record_path(resource: ResourceName, id: Option<u64>) -> Vec<String> {
  let mut path = match resource {
    ResourceName::IndependentComment => collection(ResourceName::Comment),
    other => collection(other),
  };
  if let Some(id) = id {
    path.push(id.to_string());
  }
  path
}

fn stats_path(key: &StatsKey) -> Vec<String> {
  let name = match key {
    StatsKey::Counts => "counts",
    StatsKey::Views => "views",
    StatsKey::WordCount => "content-word-count",
    StatsKey::DailyViews { .. } => "daily-views",
    StatsKey::MonthlyViews { .. } => "monthly-views",
  };
  vec!["statistics".to_string(), name.to_string()]
}

fn stats_query(key: &StatsKey) -> Vec<(&'static str, String)> {
  match key {
    StatsKey::DailyViews { start, end } | StatsKey::MonthlyViews { start, end } => vec![
      ("startDate", start.trim().to_string()),
      ("endDate", end.trim().to_string()),
    ],
    _ => Vec::new(),
  }
}
