use std::sync::Arc;

use service::site_index::SiteIndexService;

/// Shared handler state. Holds no per-request data; every call reads the store fresh.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SiteIndexService>,
}

impl AppState {
    pub fn new(index: SiteIndexService) -> Self {
        Self { index: Arc::new(index) }
    }
}
