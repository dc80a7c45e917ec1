//! Content API access.
//!
//! The cache talks to the API through [`Transport`], which moves JSON in and
//! out. Typed decoding into [`types`] happens one layer up, in the console.

mod error;
mod http;
pub mod types;

pub use error::{ErrorInfo, FetchError, ValidationError};
pub use http::HttpTransport;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{ListKey, StatsKey};
use crate::resource::ResourceName;

/// Request/response primitive behind every query and mutation.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Fetch one page of a listing as `{items, total, page, limit}`.
  async fn list(&self, key: &ListKey) -> Result<Value, FetchError>;

  async fn create(&self, resource: ResourceName, body: Value) -> Result<Value, FetchError>;

  async fn update(&self, resource: ResourceName, id: u64, body: Value) -> Result<Value, FetchError>;

  async fn delete(&self, resource: ResourceName, id: u64) -> Result<(), FetchError>;

  async fn statistics(&self, key: &StatsKey) -> Result<Value, FetchError>;
}
