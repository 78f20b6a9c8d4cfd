use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use models::site_entry::{FieldLimits, SiteEntry, SiteSubmission};
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::storage::{EntryStore, InsertOutcome};

/// Submission rules applied before anything reaches the store.
#[derive(Clone, Debug, Default)]
pub struct SubmissionPolicy {
    pub limits: FieldLimits,
    /// Best-effort `<script`/`javascript:` filter; not a security boundary.
    pub screen_content: bool,
}

/// Application service for the catalog.
/// Validates, screens and stamps submissions, then delegates to the configured store.
pub struct SiteIndexService {
    store: Arc<dyn EntryStore>,
    policy: SubmissionPolicy,
}

impl SiteIndexService {
    pub fn new(store: Arc<dyn EntryStore>, policy: SubmissionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Accept one submission. Rejected submissions never touch the store.
    #[instrument(skip(self, submission), fields(backend = self.store.backend()))]
    pub async fn submit(&self, submission: SiteSubmission) -> Result<SiteEntry, ServiceError> {
        let content = submission.validate(&self.policy.limits)?;
        if self.policy.screen_content {
            if let Err(e) = content.screen() {
                warn!(site_id = %content.site_id, "submission rejected by content screen");
                return Err(e.into());
            }
        }

        let entry = content.stamp(Utc::now().trunc_subsecs(0));
        match self.store.insert(&entry).await? {
            InsertOutcome::Stored => {
                info!(site_id = %entry.site_id, "site entry stored");
                Ok(entry)
            }
            InsertOutcome::Duplicate => {
                info!(site_id = %entry.site_id, "duplicate site_id rejected");
                Err(ServiceError::Conflict(format!("site_id `{}` already exists", entry.site_id)))
            }
        }
    }

    /// Whole catalog in store order.
    pub async fn list(&self) -> Result<Vec<SiteEntry>, ServiceError> {
        self.store.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileEntryStore;
    use async_trait::async_trait;
    use models::errors::ModelError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that fails every call and counts how often it was reached.
    #[derive(Default)]
    struct DownStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EntryStore for DownStore {
        fn backend(&self) -> &'static str {
            "down"
        }
        async fn insert(&self, _entry: &SiteEntry) -> Result<InsertOutcome, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::Store("connection refused".into()))
        }
        async fn list_all(&self) -> Result<Vec<SiteEntry>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::Store("connection refused".into()))
        }
    }

    fn submission(name: &str, site_id: &str, description: &str) -> SiteSubmission {
        SiteSubmission {
            name: Some(name.into()),
            site_id: Some(site_id.into()),
            description: Some(description.into()),
        }
    }

    async fn file_service(screen_content: bool) -> (tempfile::TempDir, SiteIndexService) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEntryStore::new(dir.path().join("sites.json")).await.unwrap();
        let policy = SubmissionPolicy { screen_content, ..SubmissionPolicy::default() };
        (dir, SiteIndexService::new(store, policy))
    }

    #[tokio::test]
    async fn accepted_submission_is_listed_with_timestamp() {
        let (_dir, svc) = file_service(true).await;
        let before = Utc::now().trunc_subsecs(0);
        let stored = svc.submit(submission("Alice's Blog", "abc123", "A personal blog")).await.unwrap();
        assert!(stored.added_ts >= before);

        let all = svc.list().await.unwrap();
        assert_eq!(all, vec![stored]);
    }

    #[tokio::test]
    async fn duplicate_site_id_is_a_conflict() {
        let (_dir, svc) = file_service(true).await;
        svc.submit(submission("One", "dup1", "first")).await.unwrap();
        let err = svc.submit(submission("Two", "dup1", "second")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let all = svc.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description, "first");
    }

    #[tokio::test]
    async fn screening_follows_policy() {
        let (_dir, strict) = file_service(true).await;
        let err = strict.submit(submission("<script>x</script>", "s1", "d")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Model(ModelError::MaliciousContent)));
        assert!(strict.list().await.unwrap().is_empty());

        let (_dir2, lax) = file_service(false).await;
        assert!(lax.submit(submission("<script>x</script>", "s1", "d")).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_submission_never_reaches_store() {
        let store = Arc::new(DownStore::default());
        let svc = SiteIndexService::new(store.clone(), SubmissionPolicy { screen_content: true, ..Default::default() });

        for bad in [
            submission("", "abc123", "x"),
            submission("n", "", "x"),
            submission("n", "abc123", " "),
            submission("javascript:alert(1)", "abc123", "x"),
            SiteSubmission::default(),
        ] {
            assert!(matches!(svc.submit(bad).await, Err(ServiceError::Model(_))));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let store = Arc::new(DownStore::default());
        let svc = SiteIndexService::new(store.clone(), SubmissionPolicy::default());
        assert!(svc.submit(submission("n", "id", "d")).await.unwrap_err().is_store_failure());
        assert!(svc.list().await.unwrap_err().is_store_failure());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
