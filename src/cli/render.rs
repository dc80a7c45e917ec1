//! Plain-text rendering of listings and dashboard data.

use crate::api::types::{
  Article, Category, Comment, ContentCounts, DailyViews, MonthlyViews, Note, PagePayload, Thought,
  ViewTotals, WordCount,
};

const MAX_CELL: usize = 48;

/// A record that can be shown as a table row.
pub trait Tabular {
  fn headers() -> &'static [&'static str];
  fn row(&self) -> Vec<String>;
}

impl Tabular for Category {
  fn headers() -> &'static [&'static str] {
    &["ID", "NAME", "SLUG", "ARTICLES"]
  }

  fn row(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.name.clone(),
      self.slug.clone(),
      self.article_count.to_string(),
    ]
  }
}

impl Tabular for Article {
  fn headers() -> &'static [&'static str] {
    &["ID", "TITLE", "STATUS", "CATEGORY", "VIEWS", "LIKES", "CREATED"]
  }

  fn row(&self) -> Vec<String> {
    let category = match &self.category {
      Some(category) => category.name.clone(),
      None => self.category_id.to_string(),
    };
    vec![
      self.id.to_string(),
      self.title.clone(),
      self.status.to_string(),
      category,
      self.views.to_string(),
      self.likes_count.to_string(),
      format_date(&self.created_at),
    ]
  }
}

impl Tabular for Note {
  fn headers() -> &'static [&'static str] {
    &["ID", "TITLE", "STATUS", "VIEWS", "LIKES", "CREATED"]
  }

  fn row(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.title.clone(),
      self.status.to_string(),
      self.views.to_string(),
      self.likes_count.to_string(),
      format_date(&self.created_at),
    ]
  }
}

impl Tabular for Thought {
  fn headers() -> &'static [&'static str] {
    &["ID", "CONTENT", "STATUS", "LIKES", "CREATED"]
  }

  fn row(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      first_line(&self.content),
      self.status.to_string(),
      self.likes_count.to_string(),
      format_date(&self.created_at),
    ]
  }
}

impl Tabular for Comment {
  fn headers() -> &'static [&'static str] {
    &["ID", "AUTHOR", "ON", "CONTENT", "CREATED"]
  }

  fn row(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.nickname.clone().unwrap_or_else(|| "-".to_string()),
      self.target(),
      first_line(&self.content),
      format_date(&self.created_at),
    ]
  }
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
  if text.chars().count() <= max {
    return text.to_string();
  }
  let kept: String = text.chars().take(max.saturating_sub(1)).collect();
  format!("{}…", kept)
}

fn first_line(text: &str) -> String {
  text.lines().next().unwrap_or_default().trim().to_string()
}

/// Date part of an RFC 3339 timestamp; other input is shown as is.
fn format_date(timestamp: &str) -> String {
  match chrono::DateTime::parse_from_rfc3339(timestamp) {
    Ok(at) => at.format("%Y-%m-%d").to_string(),
    Err(_) => timestamp.to_string(),
  }
}

/// Render rows under headers with aligned columns.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
  let cells: Vec<Vec<String>> = rows
    .iter()
    .map(|row| row.iter().map(|cell| truncate(cell, MAX_CELL)).collect())
    .collect();

  let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
  for row in &cells {
    for (i, cell) in row.iter().enumerate() {
      if let Some(width) = widths.get_mut(i) {
        *width = (*width).max(cell.chars().count());
      }
    }
  }

  let format_row = |row: &[String]| -> String {
    let line: Vec<String> = row
      .iter()
      .zip(&widths)
      .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
      .collect();
    line.join("  ").trim_end().to_string()
  };

  let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
  let mut out = format_row(&header);
  for row in &cells {
    out.push('\n');
    out.push_str(&format_row(row));
  }
  out
}

/// Render one page of a listing with a footer.
pub fn page<T: Tabular>(page: &PagePayload<T>) -> String {
  if page.items.is_empty() {
    return "No records.".to_string();
  }
  let rows: Vec<Vec<String>> = page.items.iter().map(Tabular::row).collect();
  let mut out = table(T::headers(), &rows);
  out.push_str(&format!(
    "\n-- page {}/{} ({} total)",
    page.page,
    page.last_page(),
    page.total,
  ));
  out
}

pub fn counts(counts: &ContentCounts) -> String {
  table(
    &["CATEGORIES", "ARTICLES", "NOTES", "THOUGHTS", "COMMENTS"],
    &[vec![
      counts.category_count.to_string(),
      counts.published_article_count.to_string(),
      counts.published_note_count.to_string(),
      counts.published_thought_count.to_string(),
      counts.comment_count.to_string(),
    ]],
  )
}

pub fn views(views: &ViewTotals) -> String {
  table(
    &["ARTICLE VIEWS", "NOTE VIEWS"],
    &[vec![views.article_views.to_string(), views.note_views.to_string()]],
  )
}

pub fn word_count(words: &WordCount) -> String {
  table(
    &["ARTICLE WORDS", "NOTE WORDS", "THOUGHT WORDS"],
    &[vec![
      words.article_word_count.to_string(),
      words.note_word_count.to_string(),
      words.thought_word_count.to_string(),
    ]],
  )
}

pub fn daily_views(days: &[DailyViews]) -> String {
  let rows: Vec<Vec<String>> = days
    .iter()
    .map(|d| vec![d.date.clone(), d.article_views.to_string(), d.note_views.to_string()])
    .collect();
  table(&["DATE", "ARTICLE VIEWS", "NOTE VIEWS"], &rows)
}

pub fn monthly_views(months: &[MonthlyViews]) -> String {
  let rows: Vec<Vec<String>> = months
    .iter()
    .map(|m| {
      vec![
        format!("{}-{:02}", m.year, m.month),
        m.article_views.to_string(),
        m.note_views.to_string(),
      ]
    })
    .collect();
  table(&["MONTH", "ARTICLE VIEWS", "NOTE VIEWS"], &rows)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a longer title", 8), "a longe…");
    assert_eq!(truncate("日本語のタイトル", 4), "日本語…");
  }

  #[test]
  fn test_table_alignment() {
    let out = table(
      &["ID", "NAME"],
      &[
        vec!["1".to_string(), "Rust".to_string()],
        vec!["10".to_string(), "Go".to_string()],
      ],
    );
    assert_eq!(out, "ID  NAME\n1   Rust\n10  Go");
  }

  #[test]
  fn test_page_footer() {
    let page = PagePayload {
      items: vec![Category {
        id: 11,
        name: "Category 11".to_string(),
        slug: "category-11".to_string(),
        article_count: 0,
      }],
      total: 11,
      page: 2,
      limit: 10,
    };
    let out = super::page(&page);
    assert!(out.contains("Category 11"));
    assert!(out.ends_with("-- page 2/2 (11 total)"));
  }

  #[test]
  fn test_format_date() {
    assert_eq!(format_date("2024-03-01T10:00:00Z"), "2024-03-01");
    assert_eq!(format_date("yesterday"), "yesterday");
  }
}
