//! Static metadata for the resource families the console manages.
//!
//! Every list query and every mutation names a [`ResourceName`]. Its
//! [`ResourceDescriptor`] decides which filters and sort fields may reach a
//! query key, whether the family can be edited, and which other families
//! have to be refreshed after it changes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A resource family exposed by the content API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceName {
  Category,
  Article,
  Note,
  Thought,
  Comment,
  /// Comments left on the guestbook rather than on a piece of content
  IndependentComment,
}

impl ResourceName {
  pub const ALL: &'static [ResourceName] = &[
    ResourceName::Category,
    ResourceName::Article,
    ResourceName::Note,
    ResourceName::Thought,
    ResourceName::Comment,
    ResourceName::IndependentComment,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceName::Category => "category",
      ResourceName::Article => "article",
      ResourceName::Note => "note",
      ResourceName::Thought => "thought",
      ResourceName::Comment => "comment",
      ResourceName::IndependentComment => "independentComment",
    }
  }

  pub fn descriptor(self) -> &'static ResourceDescriptor {
    match self {
      ResourceName::Category => &CATEGORY,
      ResourceName::Article => &ARTICLE,
      ResourceName::Note => &NOTE,
      ResourceName::Thought => &THOUGHT,
      ResourceName::Comment => &COMMENT,
      ResourceName::IndependentComment => &INDEPENDENT_COMMENT,
    }
  }
}

impl fmt::Display for ResourceName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Filter dimensions a list query may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterName {
  Status,
  CategoryId,
  /// Comment moderation filter (which kind of content the comment belongs to)
  FilterType,
  ArticleSlug,
  NoteId,
  ThoughtId,
}

impl FilterName {
  /// Query-string parameter name used by the API.
  pub fn param(&self) -> &'static str {
    match self {
      FilterName::Status => "status",
      FilterName::CategoryId => "categoryId",
      FilterName::FilterType => "filterType",
      FilterName::ArticleSlug => "articleSlug",
      FilterName::NoteId => "noteId",
      FilterName::ThoughtId => "thoughtId",
    }
  }

  /// Whether this filter scopes the listing to a parent record. Scoped
  /// listings are served from a different endpoint and are only fetched once
  /// the scoping value is known.
  pub fn is_scope(&self) -> bool {
    matches!(
      self,
      FilterName::ArticleSlug | FilterName::NoteId | FilterName::ThoughtId
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SortField {
  CreatedAt,
  UpdatedAt,
  Views,
  LikesCount,
}

impl SortField {
  pub fn param(&self) -> &'static str {
    match self {
      SortField::CreatedAt => "createdAt",
      SortField::UpdatedAt => "updatedAt",
      SortField::Views => "views",
      SortField::LikesCount => "likesCount",
    }
  }

  pub fn parse(input: &str) -> Option<Self> {
    match input.trim().to_lowercase().as_str() {
      "createdat" | "created" => Some(SortField::CreatedAt),
      "updatedat" | "updated" => Some(SortField::UpdatedAt),
      "views" => Some(SortField::Views),
      "likescount" | "likes" => Some(SortField::LikesCount),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
  Asc,
  #[default]
  Desc,
}

impl SortOrder {
  pub fn param(&self) -> &'static str {
    match self {
      SortOrder::Asc => "asc",
      SortOrder::Desc => "desc",
    }
  }

  pub fn parse(input: &str) -> Option<Self> {
    match input.trim().to_lowercase().as_str() {
      "asc" => Some(SortOrder::Asc),
      "desc" => Some(SortOrder::Desc),
      _ => None,
    }
  }
}

/// Publication status shared by articles, notes and thoughts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
  Published,
  Hidden,
}

impl ContentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ContentStatus::Published => "published",
      ContentStatus::Hidden => "hidden",
    }
  }

  pub fn parse(input: &str) -> Option<Self> {
    match input.trim().to_lowercase().as_str() {
      "published" => Some(ContentStatus::Published),
      "hidden" => Some(ContentStatus::Hidden),
      _ => None,
    }
  }
}

impl fmt::Display for ContentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Immutable description of a resource family.
#[derive(Debug)]
pub struct ResourceDescriptor {
  pub name: ResourceName,
  pub id_field: &'static str,
  /// Filters in canonical key order
  pub supported_filters: &'static [FilterName],
  pub supported_sorts: &'static [SortField],
  pub default_sort: Option<SortField>,
  /// Whether the listing accepts an explicit sort order
  pub orderable: bool,
  pub searchable: bool,
  /// Comments are moderation-only: they can be listed and deleted
  pub editable: bool,
  /// Families whose cached listings embed or count records of this family
  pub cascades: &'static [ResourceName],
}

impl ResourceDescriptor {
  pub fn supports_filter(&self, filter: FilterName) -> bool {
    self.supported_filters.contains(&filter)
  }

  pub fn supports_sort(&self, field: SortField) -> bool {
    self.supported_sorts.contains(&field)
  }
}

const CONTENT_SORTS: &[SortField] = &[
  SortField::CreatedAt,
  SortField::UpdatedAt,
  SortField::Views,
  SortField::LikesCount,
];

static CATEGORY: ResourceDescriptor = ResourceDescriptor {
  name: ResourceName::Category,
  id_field: "id",
  supported_filters: &[],
  supported_sorts: &[],
  default_sort: None,
  orderable: false,
  searchable: false,
  editable: true,
  cascades: &[ResourceName::Article],
};

static ARTICLE: ResourceDescriptor = ResourceDescriptor {
  name: ResourceName::Article,
  id_field: "id",
  supported_filters: &[FilterName::Status, FilterName::CategoryId],
  supported_sorts: CONTENT_SORTS,
  default_sort: Some(SortField::CreatedAt),
  orderable: true,
  searchable: true,
  editable: true,
  cascades: &[ResourceName::Category, ResourceName::Comment],
};

static NOTE: ResourceDescriptor = ResourceDescriptor {
  name: ResourceName::Note,
  id_field: "id",
  supported_filters: &[FilterName::Status],
  supported_sorts: CONTENT_SORTS,
  default_sort: Some(SortField::CreatedAt),
  orderable: true,
  searchable: true,
  editable: true,
  cascades: &[ResourceName::Comment],
};

static THOUGHT: ResourceDescriptor = ResourceDescriptor {
  name: ResourceName::Thought,
  id_field: "id",
  supported_filters: &[FilterName::Status],
  supported_sorts: &[],
  default_sort: None,
  orderable: true,
  searchable: true,
  editable: true,
  cascades: &[ResourceName::Comment],
};

static COMMENT: ResourceDescriptor = ResourceDescriptor {
  name: ResourceName::Comment,
  id_field: "id",
  supported_filters: &[
    FilterName::FilterType,
    FilterName::ArticleSlug,
    FilterName::NoteId,
    FilterName::ThoughtId,
  ],
  supported_sorts: &[],
  default_sort: None,
  orderable: true,
  searchable: true,
  editable: false,
  cascades: &[ResourceName::IndependentComment],
};

static INDEPENDENT_COMMENT: ResourceDescriptor = ResourceDescriptor {
  name: ResourceName::IndependentComment,
  id_field: "id",
  supported_filters: &[],
  supported_sorts: &[],
  default_sort: None,
  orderable: false,
  searchable: false,
  editable: false,
  cascades: &[ResourceName::Comment],
};
