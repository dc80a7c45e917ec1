//! Records and payloads exchanged with the content API.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use crate::cache::{Editable, Publishable, Record, Validate};
use crate::resource::ContentStatus;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePayload<T> {
  pub items: Vec<T>,
  pub total: u64,
  pub page: u32,
  pub limit: u32,
}

impl<T> PagePayload<T> {
  /// Number of the last page; an empty listing still has page 1.
  pub fn last_page(&self) -> u32 {
    last_page(self.total, self.limit)
  }
}

pub(crate) fn last_page(total: u64, limit: u32) -> u32 {
  let limit = u64::from(limit.max(1));
  let pages = total.div_ceil(limit).max(1);
  u32::try_from(pages).unwrap_or(u32::MAX)
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  pub id: u64,
  pub name: String,
  pub slug: String,
  #[serde(default)]
  pub article_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
  pub id: u64,
  pub created_at: String,
  pub updated_at: String,
  pub title: String,
  #[serde(default)]
  pub content: String,
  pub status: ContentStatus,
  #[serde(default)]
  pub likes_count: u64,
  #[serde(default)]
  pub views: u64,
  pub slug: String,
  pub category_id: u64,
  #[serde(default)]
  pub category: Option<Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
  pub id: u64,
  pub created_at: String,
  pub updated_at: String,
  pub title: String,
  #[serde(default)]
  pub content: String,
  pub status: ContentStatus,
  #[serde(default)]
  pub views: u64,
  #[serde(default)]
  pub likes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
  pub id: u64,
  pub created_at: String,
  pub status: ContentStatus,
  pub content: String,
  #[serde(default)]
  pub likes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  pub id: u64,
  pub content: String,
  pub created_at: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avatar_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub nickname: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub website: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub article_slug: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note_id: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub thought_id: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_ip: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_agent: Option<String>,
}

impl Comment {
  /// Where the comment was left, for moderation listings.
  pub fn target(&self) -> String {
    if let Some(slug) = &self.article_slug {
      format!("article {}", slug)
    } else if let Some(id) = self.note_id {
      format!("note {}", id)
    } else if let Some(id) = self.thought_id {
      format!("thought {}", id)
    } else {
      "guestbook".to_string()
    }
  }
}

fn excerpt(text: &str) -> String {
  text.lines().next().unwrap_or_default().trim().to_string()
}

impl Record for Category {
  fn id(&self) -> u64 {
    self.id
  }

  fn label(&self) -> String {
    self.name.clone()
  }
}

impl Record for Article {
  fn id(&self) -> u64 {
    self.id
  }

  fn label(&self) -> String {
    self.title.clone()
  }
}

impl Record for Note {
  fn id(&self) -> u64 {
    self.id
  }

  fn label(&self) -> String {
    self.title.clone()
  }
}

impl Record for Thought {
  fn id(&self) -> u64 {
    self.id
  }

  fn label(&self) -> String {
    excerpt(&self.content)
  }
}

impl Record for Comment {
  fn id(&self) -> u64 {
    self.id
  }

  fn label(&self) -> String {
    excerpt(&self.content)
  }
}

// ============================================================================
// Drafts and patches
// ============================================================================

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
  if value.trim().is_empty() {
    return Err(ValidationError::Empty(field));
  }
  Ok(())
}

fn require_if_set(value: Option<&str>, field: &'static str) -> Result<(), ValidationError> {
  match value {
    Some(v) => require(v, field),
    None => Ok(()),
  }
}

fn require_slug(slug: &str) -> Result<(), ValidationError> {
  require(slug, "slug")?;
  let valid = slug
    .chars()
    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
  if !valid {
    return Err(ValidationError::Invalid {
      field: "slug",
      reason: "use lowercase letters, digits and '-'".to_string(),
    });
  }
  Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategory {
  pub name: String,
  pub slug: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategory {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticle {
  pub title: String,
  pub content: String,
  pub status: ContentStatus,
  pub category_id: u64,
  pub slug: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticle {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<ContentStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category_id: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNote {
  pub title: String,
  pub content: String,
  pub status: ContentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNote {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<ContentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThought {
  pub content: String,
  pub status: ContentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThought {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<ContentStatus>,
}

impl Validate for CreateCategory {
  fn validate(&self) -> Result<(), ValidationError> {
    require(&self.name, "name")?;
    require_slug(&self.slug)
  }
}

impl Validate for UpdateCategory {
  fn validate(&self) -> Result<(), ValidationError> {
    if self.name.is_none() && self.slug.is_none() {
      return Err(ValidationError::NoChanges);
    }
    require_if_set(self.name.as_deref(), "name")?;
    match &self.slug {
      Some(slug) => require_slug(slug),
      None => Ok(()),
    }
  }
}

impl Validate for CreateArticle {
  fn validate(&self) -> Result<(), ValidationError> {
    require(&self.title, "title")?;
    require(&self.content, "content")?;
    require_slug(&self.slug)?;
    if self.category_id == 0 {
      return Err(ValidationError::Empty("categoryId"));
    }
    Ok(())
  }
}

impl Validate for UpdateArticle {
  fn validate(&self) -> Result<(), ValidationError> {
    if self.title.is_none()
      && self.content.is_none()
      && self.status.is_none()
      && self.category_id.is_none()
      && self.slug.is_none()
    {
      return Err(ValidationError::NoChanges);
    }
    require_if_set(self.title.as_deref(), "title")?;
    require_if_set(self.content.as_deref(), "content")?;
    if let Some(slug) = &self.slug {
      require_slug(slug)?;
    }
    if self.category_id == Some(0) {
      return Err(ValidationError::Empty("categoryId"));
    }
    Ok(())
  }
}

impl Validate for CreateNote {
  fn validate(&self) -> Result<(), ValidationError> {
    require(&self.title, "title")?;
    require(&self.content, "content")
  }
}

impl Validate for UpdateNote {
  fn validate(&self) -> Result<(), ValidationError> {
    if self.title.is_none() && self.content.is_none() && self.status.is_none() {
      return Err(ValidationError::NoChanges);
    }
    require_if_set(self.title.as_deref(), "title")?;
    require_if_set(self.content.as_deref(), "content")
  }
}

impl Validate for CreateThought {
  fn validate(&self) -> Result<(), ValidationError> {
    require(&self.content, "content")
  }
}

impl Validate for UpdateThought {
  fn validate(&self) -> Result<(), ValidationError> {
    if self.content.is_none() && self.status.is_none() {
      return Err(ValidationError::NoChanges);
    }
    require_if_set(self.content.as_deref(), "content")
  }
}

impl Editable for Category {
  type Draft = CreateCategory;
  type Patch = UpdateCategory;
}

impl Editable for Article {
  type Draft = CreateArticle;
  type Patch = UpdateArticle;
}

impl Editable for Note {
  type Draft = CreateNote;
  type Patch = UpdateNote;
}

impl Editable for Thought {
  type Draft = CreateThought;
  type Patch = UpdateThought;
}

impl Publishable for Article {
  fn status(&self) -> ContentStatus {
    self.status
  }

  fn status_patch(status: ContentStatus) -> UpdateArticle {
    UpdateArticle {
      status: Some(status),
      ..UpdateArticle::default()
    }
  }
}

impl Publishable for Note {
  fn status(&self) -> ContentStatus {
    self.status
  }

  fn status_patch(status: ContentStatus) -> UpdateNote {
    UpdateNote {
      status: Some(status),
      ..UpdateNote::default()
    }
  }
}

impl Publishable for Thought {
  fn status(&self) -> ContentStatus {
    self.status
  }

  fn status_patch(status: ContentStatus) -> UpdateThought {
    UpdateThought {
      status: Some(status),
      ..UpdateThought::default()
    }
  }
}

// ============================================================================
// Dashboard statistics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCounts {
  pub category_count: u64,
  pub published_article_count: u64,
  pub published_note_count: u64,
  pub published_thought_count: u64,
  pub comment_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewTotals {
  pub article_views: u64,
  pub note_views: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyViews {
  pub date: String,
  pub article_views: u64,
  pub note_views: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyViews {
  pub year: i32,
  pub month: u32,
  pub article_views: u64,
  pub note_views: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCount {
  pub article_word_count: u64,
  pub note_word_count: u64,
  pub thought_word_count: u64,
}
