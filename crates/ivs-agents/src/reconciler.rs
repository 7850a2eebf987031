use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ivs_models::store_schema::now;
use ivs_store::{StoreError, SubmissionStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AgentError;

/// Fails submissions stuck in `analyzing` after their run died or could not
/// record its own failure.
pub struct Reconciler {
    store: Arc<dyn SubmissionStore>,
    stale_after: Duration,
    max_age: chrono::Duration,
    interval: Duration,
}

impl Reconciler {
    /// Fails with `Config` if `stale_after` does not fit a timestamp offset.
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        stale_after: Duration,
        interval: Duration,
    ) -> Result<Self, AgentError> {
        let max_age = chrono::Duration::from_std(stale_after).map_err(|_| {
            AgentError::Config(format!("stale_after of {}s is out of range", stale_after.as_secs()))
        })?;
        Ok(Self {
            store,
            stale_after,
            max_age,
            interval,
        })
    }

    /// Submissions last touched before this instant count as abandoned.
    /// Clamps to the Unix epoch, before any stored timestamp.
    fn cutoff(&self) -> DateTime<Utc> {
        now()
            .checked_sub_signed(self.max_age)
            .unwrap_or_default()
    }

    /// One pass over the store. Returns the ids that were failed.
    pub async fn sweep_once(&self) -> Result<Vec<Uuid>, StoreError> {
        let cutoff = self.cutoff();
        let detail = format!(
            "analysis abandoned: no terminal status within {}s",
            self.stale_after.as_secs()
        );

        let failed = self.store.fail_stale(cutoff, &detail).await?;
        for id in &failed {
            warn!(submission_id = %id, "Failed stale submission");
        }
        Ok(failed)
    }

    /// Sweep immediately, then every `interval` until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        self.sweep_logged().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Reconciler shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.sweep_logged().await;
                }
            }
        }
    }

    async fn sweep_logged(&self) {
        match self.sweep_once().await {
            Ok(failed) if !failed.is_empty() => {
                info!(count = failed.len(), "Reconciler sweep failed stale submissions");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Reconciler sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::agriflow_payload;
    use ivs_models::SubmissionStatus;
    use ivs_store::SqliteStore;

    async fn analyzing(store: &SqliteStore) -> Uuid {
        let created = store
            .create_submission("founder", &agriflow_payload())
            .await
            .unwrap();
        store.begin_analysis(created.id).await.unwrap();
        created.id
    }

    #[tokio::test]
    async fn sweep_fails_only_stale_analyzing() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let stale = analyzing(&store).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        let fresh = analyzing(&store).await;

        let reconciler = Reconciler::new(
            store.clone(),
            Duration::from_millis(30),
            Duration::from_secs(60),
        )
        .unwrap();
        let failed = reconciler.sweep_once().await.unwrap();
        assert_eq!(failed, vec![stale]);

        let s = store.get_submission(stale).await.unwrap().unwrap();
        assert_eq!(s.status, SubmissionStatus::Failed);
        assert!(s.error_detail.unwrap().contains("abandoned"));
        let f = store.get_submission(fresh).await.unwrap().unwrap();
        assert_eq!(f.status, SubmissionStatus::Analyzing);
    }

    #[test]
    fn out_of_range_stale_after_rejected() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let err = Reconciler::new(store, Duration::from_secs(u64::MAX), Duration::from_secs(60))
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[tokio::test]
    async fn huge_stale_after_fails_nothing() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let id = analyzing(&store).await;

        // Further back than chrono can represent.
        let reconciler = Reconciler::new(
            store.clone(),
            Duration::from_secs(280_000 * 365 * 24 * 3600),
            Duration::from_secs(60),
        )
        .unwrap();
        assert!(reconciler.sweep_once().await.unwrap().is_empty());
        let s = store.get_submission(id).await.unwrap().unwrap();
        assert_eq!(s.status, SubmissionStatus::Analyzing);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let reconciler = Arc::new(Reconciler::new(
            store,
            Duration::from_secs(60),
            Duration::from_millis(10),
        )
        .unwrap());
        let cancel = CancellationToken::new();

        let handle = {
            let reconciler = Arc::clone(&reconciler);
            let cancel = cancel.clone();
            tokio::spawn(async move { reconciler.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reconciler did not stop")
            .unwrap();
    }
}
