//! Interactive shell over one shared console.
//!
//! All commands in a session read and write the same cache, so a listing
//! shown twice is fetched once, and a mutation makes the affected listings
//! refetch on their next read.

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::commands::{self, COMMANDS};
use super::render::{self, Tabular};
use crate::api::types::{ContentCounts, DailyViews, MonthlyViews, ViewTotals, WordCount};
use crate::cache::{Editable, FetchStatus, FilterValue, ListParams, Record, StatsKey};
use crate::console::{Console, ResourceApi};
use crate::listing::ListState;
use crate::resource::{ContentStatus, FilterName, ResourceName, SortField, SortOrder};

/// Result of one shell command.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
  Output(String),
  Quit,
}

/// Which dashboard query to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StatsKind {
  Counts,
  Views,
  Words,
  Daily,
  Monthly,
}

pub struct Session {
  console: Console,
  state: ListState,
  page_size: u32,
}

impl Session {
  pub fn new(console: Console, resource: ResourceName, page_size: u32) -> Self {
    Self {
      console,
      state: ListState::new(resource, page_size),
      page_size,
    }
  }

  pub fn console(&self) -> &Console {
    &self.console
  }

  pub fn state(&self) -> &ListState {
    &self.state
  }

  pub fn state_mut(&mut self) -> &mut ListState {
    &mut self.state
  }

  /// Run one line of input.
  pub async fn execute(&mut self, line: &str) -> Result<Outcome> {
    let line = line.trim();
    if line.is_empty() {
      return Ok(Outcome::Output(String::new()));
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
      Some((word, rest)) => (word, rest.trim()),
      None => (line, ""),
    };

    let Some(command) = commands::resolve(word) else {
      let suggestions: Vec<&str> = commands::get_suggestions(word)
        .into_iter()
        .take(3)
        .map(|cmd| cmd.name)
        .collect();
      return Err(if suggestions.is_empty() {
        eyre!("Unknown command '{}'. Type 'help' for commands.", word)
      } else {
        eyre!("Unknown command '{}'. Did you mean: {}?", word, suggestions.join(", "))
      });
    };
    debug!(command = command.name, args = rest, "shell command");

    if let Some(resource) = command.resource {
      self.state = ListState::new(resource, self.page_size);
      return self.show_page().await.map(Outcome::Output);
    }

    let output = match command.name {
      "list" => self.show_page().await?,
      "next" => self.navigate(|state| state.next_page()).await?,
      "prev" => self.navigate(|state| state.prev_page()).await?,
      "page" => {
        let page = parse_number::<u32>(rest, "page number")?;
        self.navigate(|state| state.set_page(page)).await?
      }
      "limit" => {
        let limit = parse_number::<u32>(rest, "page size")?;
        self.state.set_page_size(limit);
        self.show_page().await?
      }
      "search" => {
        self.state.set_search(rest);
        self.show_page().await?
      }
      "filter" => {
        self.apply_filter(rest)?;
        self.show_page().await?
      }
      "sort" => {
        self.apply_sort(rest)?;
        self.show_page().await?
      }
      "create" => self.create(rest).await?,
      "update" => {
        let (id, json) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        self.update(parse_number(id, "id")?, json.trim()).await?
      }
      "delete" => self.delete(parse_number(rest, "id")?).await?,
      "publish" => {
        self
          .set_status(parse_number(rest, "id")?, ContentStatus::Published)
          .await?
      }
      "hide" => {
        self
          .set_status(parse_number(rest, "id")?, ContentStatus::Hidden)
          .await?
      }
      "stats" => {
        let mut parts = rest.split_whitespace();
        let kind = match parts.next() {
          None => None,
          Some("daily") => Some(StatsKind::Daily),
          Some("monthly") => Some(StatsKind::Monthly),
          Some(other) => return Err(eyre!("Unknown statistics '{}'", other)),
        };
        let start = parts.next().unwrap_or_default();
        let end = parts.next().unwrap_or_default();
        match kind {
          Some(kind) => self.stats(kind, start, end).await?,
          None => self.dashboard().await?,
        }
      }
      "refresh" => self.refresh().await?,
      "cache" => self.cache_entries(),
      "help" => help(),
      "quit" => return Ok(Outcome::Quit),
      other => return Err(eyre!("Command '{}' is not available here", other)),
    };
    Ok(Outcome::Output(output))
  }

  async fn navigate(&mut self, step: impl FnOnce(&mut ListState) -> bool) -> Result<String> {
    if !step(&mut self.state) {
      return Ok(format!("Already on page {}.", self.state.page()));
    }
    self.show_page().await
  }

  /// Set a filter from `name [value]`; no value clears it.
  pub fn apply_filter(&mut self, args: &str) -> Result<()> {
    let (name, value) = match args.split_once(char::is_whitespace) {
      Some((name, value)) => (name, value.trim()),
      None => (args, ""),
    };
    let filter = parse_filter(name).ok_or_else(|| eyre!("Unknown filter '{}'", name))?;
    let resource = self.state.resource();
    if !resource.descriptor().supports_filter(filter) {
      return Err(eyre!("{} cannot be filtered by {}", resource, filter.param()));
    }
    let value = if value.is_empty() {
      None
    } else {
      Some(parse_filter_value(filter, value)?)
    };
    self.state.set_filter(filter, value);
    Ok(())
  }

  /// Set the sort from `field [asc|desc]`.
  pub fn apply_sort(&mut self, args: &str) -> Result<()> {
    let mut parts = args.split_whitespace();
    let field = match parts.next() {
      Some(field) => {
        Some(SortField::parse(field).ok_or_else(|| eyre!("Unknown sort field '{}'", field))?)
      }
      None => None,
    };
    let order = match parts.next() {
      Some(order) => {
        Some(SortOrder::parse(order).ok_or_else(|| eyre!("Unknown sort order '{}'", order))?)
      }
      None => None,
    };
    self.state.set_sort(field, order);
    Ok(())
  }

  /// Render the current page, reading through the cache.
  pub async fn show_page(&mut self) -> Result<String> {
    self.read_page(false).await
  }

  /// Render the current page after refetching it.
  pub async fn refresh(&mut self) -> Result<String> {
    self.read_page(true).await
  }

  async fn read_page(&mut self, refetch: bool) -> Result<String> {
    loop {
      let params = self.state.params().clone();
      let (text, total) = match self.state.resource() {
        ResourceName::Category => read(self.console.categories(), &params, refetch).await?,
        ResourceName::Article => read(self.console.articles(), &params, refetch).await?,
        ResourceName::Note => read(self.console.notes(), &params, refetch).await?,
        ResourceName::Thought => read(self.console.thoughts(), &params, refetch).await?,
        ResourceName::Comment => read(self.console.comments(), &params, refetch).await?,
        ResourceName::IndependentComment => {
          read(self.console.independent_comments(), &params, refetch).await?
        }
      };
      // The page ran past the end (records were deleted); show the last one
      if !self.state.settle(total) {
        return Ok(text);
      }
    }
  }

  pub async fn create(&mut self, json: &str) -> Result<String> {
    let resource = self.state.resource();
    let (id, label) = match resource {
      ResourceName::Category => create(self.console.categories(), json).await?,
      ResourceName::Article => create(self.console.articles(), json).await?,
      ResourceName::Note => create(self.console.notes(), json).await?,
      ResourceName::Thought => create(self.console.thoughts(), json).await?,
      ResourceName::Comment | ResourceName::IndependentComment => {
        return Err(eyre!("Comments are moderated, not created"));
      }
    };
    Ok(format!("Created {} #{}: {}", resource, id, label))
  }

  pub async fn update(&mut self, id: u64, json: &str) -> Result<String> {
    let resource = self.state.resource();
    let label = match resource {
      ResourceName::Category => update(self.console.categories(), id, json).await?,
      ResourceName::Article => update(self.console.articles(), id, json).await?,
      ResourceName::Note => update(self.console.notes(), id, json).await?,
      ResourceName::Thought => update(self.console.thoughts(), id, json).await?,
      ResourceName::Comment | ResourceName::IndependentComment => {
        return Err(eyre!("Comments cannot be edited"));
      }
    };
    Ok(format!("Updated {} #{}: {}", resource, id, label))
  }

  pub async fn delete(&mut self, id: u64) -> Result<String> {
    let resource = self.state.resource();
    match resource {
      ResourceName::Category => self.console.categories().delete(id).await?,
      ResourceName::Article => self.console.articles().delete(id).await?,
      ResourceName::Note => self.console.notes().delete(id).await?,
      ResourceName::Thought => self.console.thoughts().delete(id).await?,
      ResourceName::Comment => self.console.comments().delete(id).await?,
      ResourceName::IndependentComment => self.console.independent_comments().delete(id).await?,
    }
    Ok(format!("Deleted {} #{}", resource, id))
  }

  pub async fn set_status(&mut self, id: u64, status: ContentStatus) -> Result<String> {
    let resource = self.state.resource();
    let label = match resource {
      ResourceName::Article => self.console.articles().set_status(id, status).await?.label(),
      ResourceName::Note => self.console.notes().set_status(id, status).await?.label(),
      ResourceName::Thought => self.console.thoughts().set_status(id, status).await?.label(),
      other => return Err(eyre!("{} records have no status", other)),
    };
    Ok(format!("{} {} #{} is now {}", resource, label, id, status))
  }

  /// Counts, view totals and word counts.
  pub async fn dashboard(&self) -> Result<String> {
    let mut sections = Vec::new();
    for kind in [StatsKind::Counts, StatsKind::Views, StatsKind::Words] {
      sections.push(self.stats(kind, "", "").await?);
    }
    Ok(sections.join("\n\n"))
  }

  pub async fn stats(&self, kind: StatsKind, start: &str, end: &str) -> Result<String> {
    let statistics = self.console.statistics();
    let text = match kind {
      StatsKind::Counts => {
        render::counts(&*statistics.fetch::<ContentCounts>(StatsKey::Counts).await?)
      }
      StatsKind::Views => render::views(&*statistics.fetch::<ViewTotals>(StatsKey::Views).await?),
      StatsKind::Words => {
        render::word_count(&*statistics.fetch::<WordCount>(StatsKey::WordCount).await?)
      }
      StatsKind::Daily | StatsKind::Monthly => {
        let key = if kind == StatsKind::Daily {
          StatsKey::daily_views(start, end)
        } else {
          StatsKey::monthly_views(start, end)
        };
        if !key.is_ready() {
          return Err(eyre!("A start and an end date are required"));
        }
        if kind == StatsKind::Daily {
          render::daily_views(&statistics.fetch::<Vec<DailyViews>>(key).await?)
        } else {
          render::monthly_views(&statistics.fetch::<Vec<MonthlyViews>>(key).await?)
        }
      }
    };
    Ok(text)
  }

  /// Describe every cached query and its status.
  pub fn cache_entries(&self) -> String {
    let entries = self.console.store().snapshot();
    if entries.is_empty() {
      return "Cache is empty.".to_string();
    }
    let rows: Vec<Vec<String>> = entries
      .iter()
      .map(|entry| {
        let status = match entry.status {
          FetchStatus::Idle if entry.data.is_some() => "stale",
          FetchStatus::Idle => "idle",
          FetchStatus::Loading => "loading",
          FetchStatus::Success => "fresh",
          FetchStatus::Error => "error",
        };
        vec![entry.key.description(), status.to_string()]
      })
      .collect();
    render::table(&["QUERY", "STATUS"], &rows)
  }
}

async fn read<T: Record + Tabular>(
  api: ResourceApi<T>,
  params: &ListParams,
  refetch: bool,
) -> Result<(String, u64)> {
  let page = if refetch {
    api.refetch_list(params).await?
  } else {
    api.fetch_list(params).await?
  };
  Ok((render::page(&page), page.total))
}

async fn create<T>(api: ResourceApi<T>, json: &str) -> Result<(u64, String)>
where
  T: Editable,
  T::Draft: DeserializeOwned,
{
  let draft: T::Draft =
    serde_json::from_str(json).map_err(|e| eyre!("Invalid {} payload: {}", api.name(), e))?;
  let record = api.create(&draft).await?;
  Ok((record.id(), record.label()))
}

async fn update<T>(api: ResourceApi<T>, id: u64, json: &str) -> Result<String>
where
  T: Editable,
  T::Patch: DeserializeOwned,
{
  let patch: T::Patch =
    serde_json::from_str(json).map_err(|e| eyre!("Invalid {} payload: {}", api.name(), e))?;
  Ok(api.update(id, &patch).await?.label())
}

fn parse_number<N: FromStr>(input: &str, what: &str) -> Result<N> {
  input
    .trim()
    .parse::<N>()
    .map_err(|_| eyre!("Expected a {}, got '{}'", what, input))
}

pub fn parse_filter(name: &str) -> Option<FilterName> {
  match name.to_lowercase().as_str() {
    "status" => Some(FilterName::Status),
    "category" | "categoryid" => Some(FilterName::CategoryId),
    "type" | "filtertype" => Some(FilterName::FilterType),
    "article" | "articleslug" => Some(FilterName::ArticleSlug),
    "note" | "noteid" => Some(FilterName::NoteId),
    "thought" | "thoughtid" => Some(FilterName::ThoughtId),
    _ => None,
  }
}

pub fn parse_filter_value(filter: FilterName, value: &str) -> Result<FilterValue> {
  match filter {
    FilterName::Status => ContentStatus::parse(value)
      .map(FilterValue::Status)
      .ok_or_else(|| eyre!("Status must be published or hidden")),
    FilterName::CategoryId | FilterName::NoteId | FilterName::ThoughtId => {
      Ok(FilterValue::Id(parse_number(value, "numeric id")?))
    }
    FilterName::FilterType | FilterName::ArticleSlug => Ok(FilterValue::Text(value.to_string())),
  }
}

fn help() -> String {
  let rows: Vec<Vec<String>> = COMMANDS
    .iter()
    .map(|cmd| {
      vec![
        cmd.name.to_string(),
        cmd.aliases.join(", "),
        cmd.description.to_string(),
      ]
    })
    .collect();
  render::table(&["COMMAND", "ALIASES", "DESCRIPTION"], &rows)
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run(mut session: Session) -> Result<()> {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  println!("{}", session.show_page().await.unwrap_or_else(|e| format!("error: {}", e)));
  prompt(&session)?;

  while let Some(line) = lines.next_line().await? {
    match session.execute(&line).await {
      Ok(Outcome::Quit) => break,
      Ok(Outcome::Output(text)) if text.is_empty() => {}
      Ok(Outcome::Output(text)) => println!("{}", text),
      Err(e) => eprintln!("error: {}", e),
    }
    prompt(&session)?;
  }
  Ok(())
}

fn prompt(session: &Session) -> Result<()> {
  print!("{}:{}> ", session.state().resource(), session.state().page());
  std::io::stdout().flush()?;
  Ok(())
}
