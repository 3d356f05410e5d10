//! Content store module - the remote CMS seen through a small query interface

mod contentful;
mod entry;
mod memory;

use async_trait::async_trait;

pub use contentful::ContentfulClient;
pub use entry::{Entry, EntryCollection, Link, LinkSys, Query, SortSpec, Sys};
pub use memory::MemoryStore;

use crate::error::StoreError;

/// Query interface of a headless CMS
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Run a query and return the matching entries
    async fn query(&self, query: &Query) -> Result<EntryCollection, StoreError>;

    /// Fetch one entry by id. `Ok(None)` when the store has no such entry.
    async fn get_by_id(&self, id: &str) -> Result<Option<Entry>, StoreError>;
}
