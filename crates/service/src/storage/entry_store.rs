use async_trait::async_trait;
use models::site_entry::SiteEntry;

use crate::errors::ServiceError;

/// Result of a successful `insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The entry is in the store. For the set backend this includes the case
    /// where byte-identical content was already present.
    Stored,
    /// An entry with the same identity key already exists; nothing was written.
    Duplicate,
}

/// Trait abstraction for catalog persistence.
/// Implementations can be file-backed or a remote KV set.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Short backend name for logs and metrics.
    fn backend(&self) -> &'static str;

    async fn insert(&self, entry: &SiteEntry) -> Result<InsertOutcome, ServiceError>;

    /// Every stored entry, or an error. Never a partial list.
    async fn list_all(&self) -> Result<Vec<SiteEntry>, ServiceError>;
}
