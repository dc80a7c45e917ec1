//! Pagination and filter state for one list view.
//!
//! The view edits search, filters, sort and page size through a
//! [`ListState`]; every change to those criteria returns to page 1, while
//! page navigation changes only the page. Setting a value it already has is
//! a no-op, so the page survives redundant updates.

use tracing::debug;

use crate::api::types::last_page;
use crate::cache::keys::normalize_search;
use crate::cache::{build_key, FilterValue, ListKey, ListParams};
use crate::resource::{FilterName, ResourceName, SortField, SortOrder};

/// What the view is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPhase {
  #[default]
  Idle,
  /// Criteria changed; results for the new criteria are loading
  Filtering,
  /// Page changed
  Paginating,
}

#[derive(Debug, Clone)]
pub struct ListState {
  resource: ResourceName,
  params: ListParams,
  phase: ListPhase,
  /// Total item count from the last settled page
  total: Option<u64>,
}

impl ListState {
  pub fn new(resource: ResourceName, page_size: u32) -> Self {
    Self {
      resource,
      params: ListParams::page(1, page_size.max(1)),
      phase: ListPhase::Idle,
      total: None,
    }
  }

  pub fn resource(&self) -> ResourceName {
    self.resource
  }

  pub fn params(&self) -> &ListParams {
    &self.params
  }

  pub fn page(&self) -> u32 {
    self.params.page
  }

  pub fn page_size(&self) -> u32 {
    self.params.limit
  }

  pub fn phase(&self) -> ListPhase {
    self.phase
  }

  pub fn total(&self) -> Option<u64> {
    self.total
  }

  /// Last page, once a total is known.
  pub fn last_page(&self) -> Option<u32> {
    self.total.map(|total| last_page(total, self.params.limit))
  }

  /// The canonical key of the page the view should show.
  pub fn key(&self) -> ListKey {
    build_key(self.resource, &self.params)
  }

  fn criteria_changed(&mut self) -> bool {
    self.params.page = 1;
    // The old total belongs to another result set
    self.total = None;
    self.phase = ListPhase::Filtering;
    true
  }

  /// Set the search term. Blank terms clear the search.
  pub fn set_search(&mut self, search: &str) -> bool {
    let search = normalize_search(Some(search));
    if search == normalize_search(self.params.search.as_deref()) {
      return false;
    }
    self.params.search = search;
    self.criteria_changed()
  }

  /// Set or clear one filter. Filters the family does not support are
  /// ignored.
  pub fn set_filter(&mut self, name: FilterName, value: Option<FilterValue>) -> bool {
    if !self.resource.descriptor().supports_filter(name) {
      debug!(resource = %self.resource, filter = name.param(), "ignoring unsupported filter");
      return false;
    }
    let value = value.and_then(FilterValue::canonical);
    let current = self.params.filters.get(&name).cloned().and_then(FilterValue::canonical);
    if value == current {
      return false;
    }
    match value {
      Some(value) => self.params.filters.insert(name, value),
      None => self.params.filters.remove(&name),
    };
    self.criteria_changed()
  }

  pub fn clear_filters(&mut self) -> bool {
    let had_any = self
      .params
      .filters
      .values()
      .any(|value| value.clone().canonical().is_some());
    self.params.filters.clear();
    had_any && self.criteria_changed()
  }

  /// Set the sort. Fields the family cannot sort by fall back to its
  /// default, and a change that leaves the key unchanged is a no-op.
  pub fn set_sort(&mut self, field: Option<SortField>, order: Option<SortOrder>) -> bool {
    let before = self.key();
    let mut next = self.params.clone();
    next.sort_field = field;
    next.sort_order = order;
    let after = build_key(self.resource, &next);
    self.params.sort_field = field;
    self.params.sort_order = order;
    if before.sort_field == after.sort_field && before.sort_order == after.sort_order {
      return false;
    }
    self.criteria_changed()
  }

  pub fn set_page_size(&mut self, limit: u32) -> bool {
    let limit = limit.max(1);
    if limit == self.params.limit {
      return false;
    }
    self.params.limit = limit;
    self.criteria_changed()
  }

  /// Go to `page`, clamped to the known page range.
  pub fn set_page(&mut self, page: u32) -> bool {
    let mut page = page.max(1);
    if let Some(last) = self.last_page() {
      page = page.min(last);
    }
    if page == self.params.page {
      return false;
    }
    self.params.page = page;
    self.phase = ListPhase::Paginating;
    true
  }

  pub fn next_page(&mut self) -> bool {
    self.set_page(self.params.page.saturating_add(1))
  }

  pub fn prev_page(&mut self) -> bool {
    self.set_page(self.params.page.saturating_sub(1))
  }

  /// Record the total from a settled page.
  ///
  /// If the current page no longer exists (the last item of the last page
  /// was deleted), the page is moved to the new last page and `true` is
  /// returned so the view fetches it.
  pub fn settle(&mut self, total: u64) -> bool {
    self.total = Some(total);
    let last = last_page(total, self.params.limit);
    if self.params.page > last {
      debug!(resource = %self.resource, from = self.params.page, to = last, "page past the end");
      self.params.page = last;
      self.phase = ListPhase::Paginating;
      return true;
    }
    self.phase = ListPhase::Idle;
    false
  }
}
