//! Query keys and the canonicalizing key builder.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::resource::{ContentStatus, FilterName, ResourceName, SortField, SortOrder};

/// Canonical stand-in for an absent optional component.
pub const ABSENT: &str = "~";

/// A filter value as supplied by a view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterValue {
  Status(ContentStatus),
  Id(u64),
  Text(String),
}

impl FilterValue {
  /// Collapse values that mean "no filter" to `None`: empty or blank text
  /// and the zero id.
  pub fn canonical(self) -> Option<Self> {
    match self {
      FilterValue::Text(text) => {
        let trimmed = text.trim();
        if trimmed.is_empty() {
          None
        } else {
          Some(FilterValue::Text(trimmed.to_string()))
        }
      }
      FilterValue::Id(0) => None,
      other => Some(other),
    }
  }

  /// Value as sent in a query string or path segment.
  pub fn as_param(&self) -> String {
    match self {
      FilterValue::Status(status) => status.as_str().to_string(),
      FilterValue::Id(id) => id.to_string(),
      FilterValue::Text(text) => text.clone(),
    }
  }

  pub fn as_id(&self) -> Option<u64> {
    match self {
      FilterValue::Id(id) => Some(*id),
      _ => None,
    }
  }
}

/// Parameters a list view asks for. Anything may be missing or redundant;
/// [`build_key`] turns it into a canonical [`ListKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
  pub page: u32,
  pub limit: u32,
  pub filters: BTreeMap<FilterName, FilterValue>,
  pub sort_field: Option<SortField>,
  pub sort_order: Option<SortOrder>,
  pub search: Option<String>,
}

impl Default for ListParams {
  fn default() -> Self {
    Self {
      page: 1,
      limit: 10,
      filters: BTreeMap::new(),
      sort_field: None,
      sort_order: None,
      search: None,
    }
  }
}

impl ListParams {
  pub fn page(page: u32, limit: u32) -> Self {
    Self {
      page,
      limit,
      ..Self::default()
    }
  }

  pub fn with_filter(mut self, name: FilterName, value: FilterValue) -> Self {
    self.filters.insert(name, value);
    self
  }

  pub fn with_sort(mut self, field: Option<SortField>, order: Option<SortOrder>) -> Self {
    self.sort_field = field;
    self.sort_order = order;
    self
  }

  pub fn with_search(mut self, search: impl Into<String>) -> Self {
    self.search = Some(search.into());
    self
  }
}

/// Canonical identity of one page of one listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
  pub resource: ResourceName,
  pub page: u32,
  pub limit: u32,
  pub sort_field: Option<SortField>,
  pub sort_order: Option<SortOrder>,
  /// One slot per supported filter, in descriptor order
  pub filters: Vec<(FilterName, Option<FilterValue>)>,
  pub search: Option<String>,
}

impl ListKey {
  pub fn filter(&self, name: FilterName) -> Option<&FilterValue> {
    self
      .filters
      .iter()
      .find(|(n, _)| *n == name)
      .and_then(|(_, v)| v.as_ref())
  }

  /// The parent-scoping filter, if this listing is scoped to one record.
  pub fn scope_filter(&self) -> Option<(FilterName, &FilterValue)> {
    self
      .filters
      .iter()
      .filter(|(name, _)| name.is_scope())
      .find_map(|(name, value)| value.as_ref().map(|v| (*name, v)))
  }

  fn canonical(&self) -> String {
    let mut out = format!(
      "list|{}|page={}|limit={}|sort={}:{}",
      self.resource,
      self.page,
      self.limit,
      self.sort_field.map(|f| f.param()).unwrap_or(ABSENT),
      self.sort_order.map(|o| o.param()).unwrap_or(ABSENT),
    );
    for (name, value) in &self.filters {
      out.push('|');
      out.push_str(name.param());
      out.push('=');
      out.push_str(&encode_optional(value.as_ref().map(|v| v.as_param())));
    }
    out.push_str("|search=");
    out.push_str(&encode_optional(self.search.clone()));
    out
  }
}

/// Dashboard queries. They are not paginated and belong to the statistics
/// scope, which every mutation invalidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatsKey {
  Counts,
  Views,
  WordCount,
  DailyViews { start: String, end: String },
  MonthlyViews { start: String, end: String },
}

impl StatsKey {
  /// Daily views between two dates, trimmed.
  pub fn daily_views(start: &str, end: &str) -> Self {
    StatsKey::DailyViews {
      start: start.trim().to_string(),
      end: end.trim().to_string(),
    }
  }

  /// Monthly views between two dates, trimmed.
  pub fn monthly_views(start: &str, end: &str) -> Self {
    StatsKey::MonthlyViews {
      start: start.trim().to_string(),
      end: end.trim().to_string(),
    }
  }

  /// Date-ranged queries need both ends of the range before they can run.
  pub fn is_ready(&self) -> bool {
    match self {
      StatsKey::DailyViews { start, end } | StatsKey::MonthlyViews { start, end } => {
        !start.trim().is_empty() && !end.trim().is_empty()
      }
      _ => true,
    }
  }

  fn canonical(&self) -> String {
    match self {
      StatsKey::Counts => "stats|counts".to_string(),
      StatsKey::Views => "stats|views".to_string(),
      StatsKey::WordCount => "stats|word_count".to_string(),
      StatsKey::DailyViews { start, end } => format!(
        "stats|daily_views|{}|{}",
        encode_text(start.trim()),
        encode_text(end.trim())
      ),
      StatsKey::MonthlyViews { start, end } => format!(
        "stats|monthly_views|{}|{}",
        encode_text(start.trim()),
        encode_text(end.trim())
      ),
    }
  }
}

/// Group of cache entries invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
  Resource(ResourceName),
  Statistics,
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Scope::Resource(name) => write!(f, "{}", name),
      Scope::Statistics => f.write_str("statistics"),
    }
  }
}

/// Key of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
  List(ListKey),
  Stats(StatsKey),
}

impl QueryKey {
  pub fn scope(&self) -> Scope {
    match self {
      QueryKey::List(key) => Scope::Resource(key.resource),
      QueryKey::Stats(_) => Scope::Statistics,
    }
  }

  /// Deterministic string form; equal keys produce equal strings.
  pub fn canonical(&self) -> String {
    match self {
      QueryKey::List(key) => key.canonical(),
      QueryKey::Stats(key) => key.canonical(),
    }
  }

  /// Stable, fixed-length hash used as the cache index.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.canonical().as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human readable description for logs.
  pub fn description(&self) -> String {
    match self {
      QueryKey::List(key) => {
        let mut text = format!("{} page {} ({} per page)", key.resource, key.page, key.limit);
        for (name, value) in &key.filters {
          if let Some(value) = value {
            text.push_str(&format!(", {}={}", name.param(), value.as_param()));
          }
        }
        if let Some(search) = &key.search {
          text.push_str(&format!(", search '{}'", search));
        }
        text
      }
      QueryKey::Stats(key) => match key {
        StatsKey::Counts => "content counts".to_string(),
        StatsKey::Views => "view totals".to_string(),
        StatsKey::WordCount => "word counts".to_string(),
        StatsKey::DailyViews { start, end } => format!("daily views {}..{}", start, end),
        StatsKey::MonthlyViews { start, end } => format!("monthly views {}..{}", start, end),
      },
    }
  }

  pub fn as_list(&self) -> Option<&ListKey> {
    match self {
      QueryKey::List(key) => Some(key),
      QueryKey::Stats(_) => None,
    }
  }
}

impl From<ListKey> for QueryKey {
  fn from(key: ListKey) -> Self {
    QueryKey::List(key)
  }
}

impl From<StatsKey> for QueryKey {
  fn from(key: StatsKey) -> Self {
    QueryKey::Stats(key)
  }
}

/// Trim a search term; blank terms are the same as no search.
pub fn normalize_search(search: Option<&str>) -> Option<String> {
  search
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
}

/// Build the canonical key for a listing.
///
/// Filters the family does not support are dropped, absent or blank values
/// become the `ABSENT` sentinel, the sort falls back to the family default,
/// and page and limit are clamped to at least 1.
///
/// A listing scoped to a parent record is served by an endpoint that only
/// pages, so its key keeps the scope, page and limit and nothing else.
pub fn build_key(resource: ResourceName, params: &ListParams) -> ListKey {
  let descriptor = resource.descriptor();

  let filters: Vec<(FilterName, Option<FilterValue>)> = descriptor
    .supported_filters
    .iter()
    .map(|name| {
      let value = params
        .filters
        .get(name)
        .cloned()
        .and_then(FilterValue::canonical);
      (*name, value)
    })
    .collect();

  let sort_field = params
    .sort_field
    .filter(|field| descriptor.supports_sort(*field))
    .or(descriptor.default_sort);

  let sort_order = if descriptor.orderable {
    Some(params.sort_order.unwrap_or_default())
  } else {
    None
  };

  let search = if descriptor.searchable {
    normalize_search(params.search.as_deref())
  } else {
    None
  };

  let scope = filters
    .iter()
    .find(|(name, value)| name.is_scope() && value.is_some())
    .map(|(name, _)| *name);
  if let Some(scope) = scope {
    let filters = filters
      .into_iter()
      .map(|(name, value)| (name, value.filter(|_| name == scope)))
      .collect();
    return ListKey {
      resource,
      page: params.page.max(1),
      limit: params.limit.max(1),
      sort_field: None,
      sort_order: None,
      filters,
      search: None,
    };
  }

  ListKey {
    resource,
    page: params.page.max(1),
    limit: params.limit.max(1),
    sort_field,
    sort_order,
    filters,
    search,
  }
}

fn encode_optional(value: Option<String>) -> String {
  match value {
    Some(v) => encode_text(&v),
    None => ABSENT.to_string(),
  }
}

/// Quote free text so separators inside it cannot collide with the key layout.
fn encode_text(text: &str) -> String {
  serde_json::to_string(text).unwrap_or_else(|_| format!("{:?}", text))
}
