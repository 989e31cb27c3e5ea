//! Cached Metabase metadata.
//!
//! The snapshot types describe databases, tables and fields; the cache keeps
//! the last complete snapshot and refreshes it from the REST API.

mod cache;
mod snapshot;

pub use cache::MetadataCache;
pub use snapshot::{Database, Field, MetadataSnapshot, Table};
