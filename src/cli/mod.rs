//! Command line surface: one-shot subcommands and the interactive shell.

pub mod commands;
pub mod render;
pub mod shell;

use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{HttpTransport, Transport};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::console::Console;
use crate::query::QueryClient;
use crate::resource::{ContentStatus, ResourceName};
use shell::{Outcome, Session, StatsKind};

#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(about = "An operator console for a blog's content API")]
#[command(version)]
pub struct Cli {
  /// Path to config file (default: $XDG_CONFIG_HOME/quire/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  /// Base URL of the content API, overriding the config file
  #[arg(long, global = true)]
  pub api_url: Option<String>,

  #[command(subcommand)]
  pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
  /// Print one page of a listing
  List(ListArgs),

  /// Create a record from a JSON payload
  Create {
    #[arg(value_parser = commands::parse_resource)]
    resource: ResourceName,
    #[arg(long)]
    json: String,
  },

  /// Update a record from a JSON payload of changed fields
  Update {
    #[arg(value_parser = commands::parse_resource)]
    resource: ResourceName,
    id: u64,
    #[arg(long)]
    json: String,
  },

  /// Delete a record
  Delete {
    #[arg(value_parser = commands::parse_resource)]
    resource: ResourceName,
    id: u64,
  },

  /// Publish an article, note or thought
  Publish {
    #[arg(value_parser = commands::parse_resource)]
    resource: ResourceName,
    id: u64,
  },

  /// Hide an article, note or thought
  Hide {
    #[arg(value_parser = commands::parse_resource)]
    resource: ResourceName,
    id: u64,
  },

  /// Print dashboard statistics
  Stats {
    #[arg(value_enum, default_value = "counts")]
    kind: StatsKind,
    /// First day of the range (YYYY-MM-DD), for daily and monthly views
    #[arg(long)]
    start: Option<String>,
    /// Last day of the range (YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,
  },

  /// Start the interactive shell (default)
  Shell {
    #[arg(value_parser = commands::parse_resource, default_value = "articles")]
    resource: ResourceName,
  },
}

#[derive(Args, Debug)]
pub struct ListArgs {
  #[arg(value_parser = commands::parse_resource)]
  pub resource: ResourceName,

  #[arg(short, long, default_value_t = 1)]
  pub page: u32,

  /// Page size (default from config)
  #[arg(short, long)]
  pub limit: Option<u32>,

  #[arg(short, long)]
  pub search: Option<String>,

  /// published or hidden
  #[arg(long)]
  pub status: Option<String>,

  #[arg(long)]
  pub category: Option<u64>,

  /// createdAt, updatedAt, views or likesCount
  #[arg(long)]
  pub sort: Option<String>,

  /// asc or desc
  #[arg(long)]
  pub order: Option<String>,

  /// Comment moderation filter
  #[arg(long)]
  pub filter_type: Option<String>,

  /// Only comments on the article with this slug
  #[arg(long)]
  pub article: Option<String>,

  /// Only comments on this note
  #[arg(long)]
  pub note: Option<u64>,

  /// Only comments on this thought
  #[arg(long)]
  pub thought: Option<u64>,
}

impl ListArgs {
  /// Filters as `name value` pairs in shell syntax.
  fn filters(&self) -> Vec<String> {
    let mut filters = Vec::new();
    if let Some(status) = &self.status {
      filters.push(format!("status {}", status));
    }
    if let Some(category) = self.category {
      filters.push(format!("category {}", category));
    }
    if let Some(filter_type) = &self.filter_type {
      filters.push(format!("type {}", filter_type));
    }
    if let Some(article) = &self.article {
      filters.push(format!("article {}", article));
    }
    if let Some(note) = self.note {
      filters.push(format!("note {}", note));
    }
    if let Some(thought) = self.thought {
      filters.push(format!("thought {}", thought));
    }
    filters
  }

  fn sort(&self) -> Option<String> {
    match (&self.sort, &self.order) {
      (None, None) => None,
      (Some(field), Some(order)) => Some(format!("{} {}", field, order)),
      (Some(field), None) => Some(field.clone()),
      (None, Some(order)) => Some(format!("createdAt {}", order)),
    }
  }
}

/// Build the console described by `config`.
pub fn console(config: &Config) -> Result<Console> {
  let token = Config::get_api_token();
  if token.is_none() {
    warn!("No API token set (QUIRE_API_TOKEN); mutations will be rejected");
  }
  let transport = HttpTransport::new(&config.api.url, config.timeout(), token)?;
  let queries = QueryClient::new(CacheStore::new()).with_stale_time(config.stale_time());
  info!(url = %config.api.url, "connecting to content API");
  Ok(
    Console::with_client(Arc::new(transport) as Arc<dyn Transport>, queries)
      .keep_previous(config.cache.keep_previous),
  )
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
  let console = console(&config)?;
  let page_size = config.list.page_size;
  let command = cli.command.unwrap_or(CliCommand::Shell {
    resource: ResourceName::Article,
  });
  let output = execute(console, page_size, command).await?;
  if !output.is_empty() {
    println!("{}", output);
  }
  Ok(())
}

/// Run a one-shot command and return what it prints.
pub async fn execute(console: Console, page_size: u32, command: CliCommand) -> Result<String> {
  let output = match command {
    CliCommand::List(args) => {
      let mut session = Session::new(console, args.resource, args.limit.unwrap_or(page_size));
      for filter in args.filters() {
        session.apply_filter(&filter)?;
      }
      if let Some(sort) = args.sort() {
        session.apply_sort(&sort)?;
      }
      if let Some(search) = &args.search {
        session.state_mut().set_search(search);
      }
      session.state_mut().set_page(args.page);
      session.show_page().await?
    }
    CliCommand::Create { resource, json } => {
      Session::new(console, resource, page_size).create(&json).await?
    }
    CliCommand::Update { resource, id, json } => {
      Session::new(console, resource, page_size)
        .update(id, &json)
        .await?
    }
    CliCommand::Delete { resource, id } => {
      Session::new(console, resource, page_size)
        .delete(id)
        .await?
    }
    CliCommand::Publish { resource, id } => {
      Session::new(console, resource, page_size)
        .set_status(id, ContentStatus::Published)
        .await?
    }
    CliCommand::Hide { resource, id } => {
      Session::new(console, resource, page_size)
        .set_status(id, ContentStatus::Hidden)
        .await?
    }
    CliCommand::Stats { kind, start, end } => {
      let session = Session::new(console, ResourceName::Article, page_size);
      session
        .stats(
          kind,
          start.as_deref().unwrap_or_default(),
          end.as_deref().unwrap_or_default(),
        )
        .await?
    }
    CliCommand::Shell { resource } => {
      shell::run(Session::new(console, resource, page_size)).await?;
      String::new()
    }
  };
  Ok(output)
}

/// Run a shell line non-interactively, e.g. from a script.
pub async fn execute_line(session: &mut Session, line: &str) -> Result<Option<String>> {
  match session.execute(line).await {
    Ok(Outcome::Output(text)) => Ok(Some(text)),
    Ok(Outcome::Quit) => Ok(None),
    Err(e) => Err(eyre!("{}: {}", line, e)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{self, FakeBackend};
  use clap::CommandFactory;

  #[test]
  fn test_cli_definition() {
    Cli::command().debug_assert();
  }

  #[test]
  fn test_list_arguments() {
    let cli = Cli::try_parse_from([
      "quire", "list", "a", "--page", "2", "--status", "hidden", "--sort", "views", "--order",
      "asc",
    ])
    .unwrap();
    let Some(CliCommand::List(args)) = cli.command else {
      panic!("expected list");
    };
    assert_eq!(args.resource, ResourceName::Article);
    assert_eq!(args.page, 2);
    assert_eq!(args.filters(), vec!["status hidden".to_string()]);
    assert_eq!(args.sort().as_deref(), Some("views asc"));
  }

  #[test]
  fn test_unknown_resource_is_rejected() {
    let err = Cli::try_parse_from(["quire", "delete", "widgets", "1"]).unwrap_err();
    assert!(err.to_string().contains("unknown resource 'widgets'"));
  }

  #[test]
  fn test_shell_is_the_default() {
    let cli = Cli::try_parse_from(["quire", "--api-url", "http://localhost:3000"]).unwrap();
    assert!(cli.command.is_none());
    assert_eq!(cli.api_url.as_deref(), Some("http://localhost:3000"));
  }

  #[tokio::test]
  async fn test_list_command_applies_filters() {
    let backend = Arc::new(FakeBackend::new());
    backend.seed(
      ResourceName::Article,
      vec![
        testing::article(1, "Ownership", "published", 1),
        testing::article(2, "Draft post", "hidden", 1),
      ],
    );
    let console = Console::new(backend.clone() as Arc<dyn Transport>);
    let cli = Cli::try_parse_from(["quire", "list", "articles", "--status", "hidden"]).unwrap();
    let output = execute(console, 10, cli.command.unwrap()).await.unwrap();
    assert!(output.contains("Draft post"));
    assert!(!output.contains("Ownership"));
  }

  #[tokio::test]
  async fn test_execute_line_reports_the_line() {
    let backend = Arc::new(FakeBackend::new());
    let console = Console::new(backend as Arc<dyn Transport>);
    let mut session = Session::new(console, ResourceName::Category, 10);
    let err = execute_line(&mut session, "page x").await.unwrap_err();
    assert!(err.to_string().starts_with("page x: Expected a page number"));
    assert_eq!(execute_line(&mut session, "quit").await.unwrap(), None);
  }
}
