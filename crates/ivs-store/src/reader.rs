use std::sync::Arc;
use std::time::Duration;

use ivs_models::{Report, Submission, SubmissionStatus};
use tracing::warn;
use uuid::Uuid;

use crate::error::StoreError;
use crate::memory::ReportCache;
use crate::store::SubmissionStore;

/// Read-side view for consumers polling a submission.
///
/// The submission itself is always read from the store since its status
/// moves. Reports are served through a moka hot cache once the submission
/// reads as `completed`.
pub struct SubmissionReader {
    store: Arc<dyn SubmissionStore>,
    reports: ReportCache,
}

impl SubmissionReader {
    pub fn new(store: Arc<dyn SubmissionStore>, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            store,
            reports: ReportCache::new(max_capacity, ttl),
        }
    }

    pub async fn submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        self.store.get_submission(id).await
    }

    pub async fn status(&self, id: Uuid) -> Result<Option<SubmissionStatus>, StoreError> {
        Ok(self.store.get_submission(id).await?.map(|s| s.status))
    }

    /// The report for a completed submission.
    ///
    /// Returns `None` while the submission is not `completed`, even if a
    /// report row happens to exist, so no partial result is ever shown.
    pub async fn report_for(&self, id: Uuid) -> Result<Option<Arc<Report>>, StoreError> {
        let Some(submission) = self.store.get_submission(id).await? else {
            return Ok(None);
        };
        let (SubmissionStatus::Completed, Some(completed_at)) =
            (submission.status, submission.completed_at)
        else {
            return Ok(None);
        };

        let key = (id, completed_at);
        if let Some(report) = self.reports.get(&key).await {
            return Ok(Some(report));
        }

        match self.store.get_report(id).await? {
            Some(report) => {
                let report = Arc::new(report);
                self.reports.insert(key, Arc::clone(&report)).await;
                Ok(Some(report))
            }
            None => {
                // A resubmit between the two reads clears the report legitimately.
                let still_completed = self
                    .store
                    .get_submission(id)
                    .await?
                    .is_some_and(|s| {
                        s.status == SubmissionStatus::Completed
                            && s.completed_at == Some(completed_at)
                    });
                if !still_completed {
                    return Ok(None);
                }
                warn!(submission_id = %id, "Submission completed but report is missing");
                Err(StoreError::ReportMissing(id))
            }
        }
    }

    /// Number of reports held in the hot cache.
    pub fn hot_cache_size(&self) -> u64 {
        self.reports.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use ivs_models::store_schema::now;
    use ivs_models::{
        Analyses, AnalysisResult, AnalystKind, Claim, IdeaPayload, Recommendation, StatusUpdate,
        SynthesisResult,
    };
    use rust_decimal_macros::dec;

    /// Restarts analysis just before every report lookup, as a concurrent
    /// resubmit would.
    struct ResubmitOnRead(SqliteStore);

    #[async_trait]
    impl SubmissionStore for ResubmitOnRead {
        async fn create_submission(
            &self,
            owner_id: &str,
            payload: &IdeaPayload,
        ) -> Result<Submission, StoreError> {
            self.0.create_submission(owner_id, payload).await
        }

        async fn begin_analysis(&self, id: Uuid) -> Result<Submission, StoreError> {
            self.0.begin_analysis(id).await
        }

        async fn claim(&self, id: Uuid) -> Result<Claim, StoreError> {
            self.0.claim(id).await
        }

        async fn create_report(&self, claim: &Claim, report: &Report) -> Result<(), StoreError> {
            self.0.create_report(claim, report).await
        }

        async fn update_status(
            &self,
            claim: &Claim,
            update: StatusUpdate,
        ) -> Result<(), StoreError> {
            self.0.update_status(claim, update).await
        }

        async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
            self.0.get_submission(id).await
        }

        async fn get_report(&self, submission_id: Uuid) -> Result<Option<Report>, StoreError> {
            self.0.begin_analysis(submission_id).await?;
            self.0.get_report(submission_id).await
        }

        async fn list_submissions(&self, owner_id: &str) -> Result<Vec<Submission>, StoreError> {
            self.0.list_submissions(owner_id).await
        }

        async fn delete_submission(&self, id: Uuid) -> Result<bool, StoreError> {
            self.0.delete_submission(id).await
        }

        async fn fail_stale(
            &self,
            older_than: DateTime<Utc>,
            error_detail: &str,
        ) -> Result<Vec<Uuid>, StoreError> {
            self.0.fail_stale(older_than, error_detail).await
        }
    }

    fn report(submission_id: Uuid) -> Report {
        let analyses: Analyses = AnalystKind::ALL
            .iter()
            .map(|k| (*k, AnalysisResult::default()))
            .collect();
        Report::new(
            submission_id,
            analyses,
            SynthesisResult {
                recommendation: Recommendation::Go,
                confidence_score: dec!(8),
                executive_summary: "Go".to_string(),
                strengths: vec![],
                concerns: vec![],
                critical_assumptions: vec![],
                next_steps: vec![],
                potential_pivots: vec![],
                comparable_startups: vec![],
            },
        )
    }

    async fn setup() -> (Arc<SqliteStore>, SubmissionReader, Uuid) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let reader = SubmissionReader::new(store.clone(), 100, Duration::from_secs(60));
        let created = store
            .create_submission("reader", &IdeaPayload::default())
            .await
            .unwrap();
        store.begin_analysis(created.id).await.unwrap();
        (store, reader, created.id)
    }

    #[tokio::test]
    async fn no_report_while_analyzing() {
        let (store, reader, id) = setup().await;
        let claim = store.claim(id).await.unwrap();
        store.create_report(&claim, &report(id)).await.unwrap();

        // Report row exists but the status has not flipped yet.
        assert_eq!(
            reader.status(id).await.unwrap(),
            Some(SubmissionStatus::Analyzing)
        );
        assert!(reader.report_for(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completed_report_is_cached() {
        let (store, reader, id) = setup().await;
        let claim = store.claim(id).await.unwrap();
        store.create_report(&claim, &report(id)).await.unwrap();
        store
            .update_status(
                &claim,
                StatusUpdate::Completed {
                    completed_at: now(),
                },
            )
            .await
            .unwrap();

        let first = reader.report_for(id).await.unwrap().unwrap();
        assert_eq!(first.submission_id, id);
        let second = reader.report_for(id).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn unknown_submission_reads_none() {
        let (_store, reader, _id) = setup().await;
        let missing = Uuid::new_v4();
        assert!(reader.submission(missing).await.unwrap().is_none());
        assert!(reader.status(missing).await.unwrap().is_none());
        assert!(reader.report_for(missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleted_submission_hides_cached_report() {
        let (store, reader, id) = setup().await;
        let claim = store.claim(id).await.unwrap();
        store.create_report(&claim, &report(id)).await.unwrap();
        store
            .update_status(
                &claim,
                StatusUpdate::Completed {
                    completed_at: now(),
                },
            )
            .await
            .unwrap();
        assert!(reader.report_for(id).await.unwrap().is_some());

        store.delete_submission(id).await.unwrap();
        assert!(reader.report_for(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resubmit_between_reads_is_not_missing_report() {
        let inner = SqliteStore::open_in_memory().unwrap();
        let created = inner
            .create_submission("reader", &IdeaPayload::default())
            .await
            .unwrap();
        inner.begin_analysis(created.id).await.unwrap();
        let claim = inner.claim(created.id).await.unwrap();
        inner.create_report(&claim, &report(created.id)).await.unwrap();
        inner
            .update_status(
                &claim,
                StatusUpdate::Completed {
                    completed_at: now(),
                },
            )
            .await
            .unwrap();

        let store = Arc::new(ResubmitOnRead(inner));
        let reader = SubmissionReader::new(store.clone(), 100, Duration::from_secs(60));

        assert!(reader.report_for(created.id).await.unwrap().is_none());
        assert_eq!(
            reader.status(created.id).await.unwrap(),
            Some(SubmissionStatus::Analyzing)
        );
    }
}
