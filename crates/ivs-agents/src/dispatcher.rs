use std::sync::Arc;

use ivs_models::IdeaPayload;
use ivs_store::StoreError;
use tokio_util::task::TaskTracker;
use tracing::{error, info};
use uuid::Uuid;

use crate::orchestrator::Orchestrator;

/// Accepts submissions and runs their analysis in the background.
///
/// Callers get the submission id back as soon as it reads `analyzing`.
/// Run outcomes only surface through the store and the log.
pub struct Dispatcher {
    orchestrator: Arc<Orchestrator>,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            tracker: TaskTracker::new(),
        }
    }

    /// Create a submission, move it to `analyzing` and start the run.
    pub async fn submit(&self, owner_id: &str, payload: IdeaPayload) -> Result<Uuid, StoreError> {
        let store = self.orchestrator.store();
        let created = store.create_submission(owner_id, &payload).await?;
        let submission = store.begin_analysis(created.id).await?;
        info!(submission_id = %submission.id, owner_id, "Submission accepted");

        self.dispatch(submission.id, submission.payload);
        Ok(submission.id)
    }

    /// Rerun a submission from a terminal state (or a stuck `pending`).
    pub async fn resubmit(&self, id: Uuid) -> Result<(), StoreError> {
        let submission = self.orchestrator.store().begin_analysis(id).await?;
        info!(submission_id = %id, "Submission re-queued");

        self.dispatch(submission.id, submission.payload);
        Ok(())
    }

    fn dispatch(&self, submission_id: Uuid, payload: IdeaPayload) {
        let orchestrator = Arc::clone(&self.orchestrator);
        self.tracker.spawn(async move {
            if let Err(e) = orchestrator.run(submission_id, &payload).await {
                error!(%submission_id, error = %e, "Background analysis failed");
            }
        });
    }

    /// Number of runs still in progress.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work and wait for every in-flight run to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
