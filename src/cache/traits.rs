//! Traits for records that flow through the cache.

use serde::{de::DeserializeOwned, Serialize};

use crate::api::ValidationError;
use crate::resource::ContentStatus;

/// A record listed by one of the resource families.
///
/// Records are decoded from API responses and stored in the cache behind an
/// `Arc`, so they must be cheap to share across tasks.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Server-assigned identifier
  fn id(&self) -> u64;

  /// Short label for listings (name, title or a content excerpt)
  fn label(&self) -> String;
}

/// Payloads that can be checked before a mutation is dispatched.
pub trait Validate {
  fn validate(&self) -> Result<(), ValidationError>;
}

/// A record the operator can create and update.
pub trait Editable: Record {
  type Draft: Serialize + Validate + Send + Sync;
  type Patch: Serialize + Validate + Send + Sync;
}

/// An editable record with a published/hidden switch.
pub trait Publishable: Editable {
  fn status(&self) -> ContentStatus;

  /// Patch that only changes the status
  fn status_patch(status: ContentStatus) -> Self::Patch;
}
