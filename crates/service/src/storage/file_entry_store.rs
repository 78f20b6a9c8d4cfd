use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use models::site_entry::SiteEntry;
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::storage::entry_store::{EntryStore, InsertOutcome};

/// JSON-document store holding the catalog as one array on local disk.
///
/// Entries keep insertion order and `site_id` is a hard key: the first writer
/// wins and later inserts with the same id report `Duplicate`.
///
/// The document usually lives on transient storage (the OS temp dir by
/// default). Its contents do not survive a redeploy or a fresh instance on such
/// hosts, so callers needing durability should run the set backend instead.
///
/// Inserts are serialized by `write_lock` and every rewrite is staged in a
/// sibling temp file that is renamed over the document, so concurrent
/// submissions cannot both read the same snapshot and overwrite each other.
/// The lock is per store instance; two processes sharing one path are not
/// coordinated.
pub struct FileEntryStore {
    file_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEntryStore {
    /// Create the store, making sure the parent directory exists. The document
    /// itself is created on first insert.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        common::env::ensure_parent_dir(&file_path)
            .await
            .map_err(|e| ServiceError::Store(e.to_string()))?;
        Ok(Arc::new(Self { file_path, write_lock: Mutex::new(()) }))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.file_path
    }

    /// Read the document. Missing or unparseable content counts as an empty catalog.
    async fn load(&self) -> Result<Vec<SiteEntry>, ServiceError> {
        let bytes = match fs::read(&self.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ServiceError::store("read sites document", e)),
        };
        match serde_json::from_slice::<Vec<SiteEntry>>(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.file_path.display(), error = %e, "sites document unreadable; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, entries: &[SiteEntry]) -> Result<(), ServiceError> {
        let data = serde_json::to_vec_pretty(entries)
            .map_err(|e| ServiceError::store("encode sites document", e))?;
        let file_name = self
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sites.json".into());
        let tmp = self.file_path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, data).await.map_err(|e| ServiceError::store("write sites document", e))?;
        if let Err(e) = fs::rename(&tmp, &self.file_path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(ServiceError::store("replace sites document", e));
        }
        Ok(())
    }
}

#[async_trait]
impl EntryStore for FileEntryStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn insert(&self, entry: &SiteEntry) -> Result<InsertOutcome, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        if entries.iter().any(|e| e.site_id == entry.site_id) {
            debug!(site_id = %entry.site_id, "site_id already present");
            return Ok(InsertOutcome::Duplicate);
        }
        entries.push(entry.clone());
        self.save(&entries).await?;
        debug!(site_id = %entry.site_id, total = entries.len(), "entry appended");
        Ok(InsertOutcome::Stored)
    }

    async fn list_all(&self) -> Result<Vec<SiteEntry>, ServiceError> {
        self.load().await
    }
}
