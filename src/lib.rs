//! Query cache and invalidation coordinator for a blog's content API.
//!
//! Views read listings and dashboard statistics through a shared
//! [`cache::CacheStore`]: identical queries share one entry and one request,
//! and every successful mutation marks the listings it affects as stale so
//! they refetch on their next read. The [`console::Console`] ties the cache
//! to an [`api::Transport`]; the [`cli`] module puts a shell on top of it.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod console;
pub mod listing;
pub mod logging;
pub mod mutation;
pub mod query;
pub mod resource;

#[cfg(test)]
mod testing;

pub use api::{ErrorInfo, FetchError, HttpTransport, Transport};
pub use cache::{CacheStore, ListParams, QueryKey};
pub use console::{Console, EditError, ResourceApi};
pub use query::{Query, QueryClient, QueryState};
pub use resource::ResourceName;
