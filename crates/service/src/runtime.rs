//! Runtime helpers
//!
//! Builds the configured `EntryStore` once at process start so handlers only
//! ever see the trait object.

use std::{sync::Arc, time::Duration};

use configs::{StoreBackend, StoreConfig};
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::storage::{EntryStore, FileEntryStore, SetEntryStore, SetStoreConfig};

pub async fn open_store(cfg: &StoreConfig) -> Result<Arc<dyn EntryStore>, ServiceError> {
    match cfg.resolved_backend() {
        StoreBackend::Set => {
            info!(url = %cfg.rest_url, set_key = %cfg.set_key, "using durable set store");
            let store = SetEntryStore::new(SetStoreConfig {
                base_url: cfg.rest_url.clone(),
                token: cfg.rest_token.clone(),
                set_key: cfg.set_key.clone(),
                timeout: Duration::from_secs(cfg.request_timeout_secs),
            })?;
            Ok(store)
        }
        StoreBackend::File => {
            warn!(
                path = %cfg.file_path,
                "using ephemeral file store; entries are lost when this instance's storage is reset"
            );
            let store = FileEntryStore::new(&cfg.file_path).await?;
            Ok(store)
        }
    }
}
