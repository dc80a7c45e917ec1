//! Client-side query cache.
//!
//! This module holds the pieces the query and mutation coordinators share:
//! - canonical query keys built from listing parameters
//! - the in-memory store mapping keys to entries with status and data
//! - the traits records implement to be cached and edited

pub mod keys;
mod storage;
mod traits;

pub use keys::{build_key, FilterValue, ListKey, ListParams, QueryKey, Scope, StatsKey};
pub use storage::{CacheEntry, CacheStore, FetchStatus, Payload};
pub use traits::{Editable, Publishable, Record, Validate};
