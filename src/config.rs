use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub list: ListConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the content API, e.g. https://blog.example.com/api
  pub url: String,
  /// Per-request timeout in milliseconds
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
  3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long fetched data is served without a refetch
  #[serde(default = "default_stale_time_secs")]
  pub stale_time_secs: u64,
  /// Show the previous page while the next one loads
  #[serde(default = "default_true")]
  pub keep_previous: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: default_stale_time_secs(),
      keep_previous: true,
    }
  }
}

fn default_stale_time_secs() -> u64 {
  60
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConfig {
  #[serde(default = "default_page_size")]
  pub page_size: u32,
}

impl Default for ListConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
    }
  }
}

fn default_page_size() -> u32 {
  10
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Default filter directive; `RUST_LOG` takes precedence
  pub level: Option<String>,
  /// Write logs to daily files in this directory instead of stderr
  pub dir: Option<PathBuf>,
}

impl Config {
  /// Configuration with defaults for everything but the API url.
  pub fn for_url(url: &str) -> Self {
    Self {
      api: ApiConfig {
        url: url.to_string(),
        timeout_ms: default_timeout_ms(),
      },
      cache: CacheConfig::default(),
      list: ListConfig::default(),
      log: LogConfig::default(),
    }
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./quire.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/quire/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/quire/config.yaml\n\
                 or pass --api-url."
      )),
    }
  }

  /// Load the configuration and apply command line overrides. A url on the
  /// command line is enough to run without a config file.
  pub fn resolve(explicit_path: Option<&Path>, api_url: Option<&str>) -> Result<Self> {
    let found = explicit_path.is_some() || Self::find_config_file().is_some();
    let mut config = match (found, api_url) {
      (false, Some(url)) => return Ok(Self::for_url(url)),
      _ => Self::load(explicit_path)?,
    };
    if let Some(url) = api_url {
      config.api.url = url.to_string();
    }
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("quire.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("quire").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.api.url.trim().is_empty() {
      return Err(eyre!("api.url must not be empty"));
    }
    Ok(config)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.api.timeout_ms)
  }

  pub fn stale_time(&self) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(self.cache.stale_time_secs).unwrap_or(i64::MAX / 1000))
  }

  /// Get the API token from environment variables.
  ///
  /// Checks QUIRE_API_TOKEN first, then API_TOKEN as fallback. Read-only
  /// endpoints work without one.
  pub fn get_api_token() -> Option<String> {
    std::env::var("QUIRE_API_TOKEN")
      .or_else(|_| std::env::var("API_TOKEN"))
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}
