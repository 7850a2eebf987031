use std::sync::Arc;

use ivs_models::SubmissionStatus;
use ivs_store::{StoreError, SubmissionStore};
use tracing::info;
use uuid::Uuid;

use crate::backend::GenerativeBackend;
use crate::error::AgentError;
use crate::prompts::advisor_system_prompt;

/// Answers follow-up questions about a submission, grounded in its idea and
/// report.
pub struct Advisor {
    store: Arc<dyn SubmissionStore>,
    backend: Arc<dyn GenerativeBackend>,
}

impl Advisor {
    /// `backend` should produce plain text rather than JSON.
    pub fn new(store: Arc<dyn SubmissionStore>, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { store, backend }
    }

    pub async fn ask(&self, submission_id: Uuid, message: &str) -> Result<String, AgentError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AgentError::InvalidInput("message is required".to_string()));
        }

        let submission = self
            .store
            .get_submission(submission_id)
            .await?
            .ok_or(StoreError::NotFound(submission_id))?;
        // A report row can exist before `completed` is written and is
        // discarded if the run then fails.
        let report = if submission.status == SubmissionStatus::Completed {
            self.store.get_report(submission_id).await?
        } else {
            None
        };

        let context = serde_json::json!({
            "idea": submission.payload,
            "status": submission.status,
            "report": report,
        });
        let system_prompt = advisor_system_prompt(&context);

        info!(%submission_id, has_report = report.is_some(), "Advisor question");
        let reply = self.backend.generate(&system_prompt, message).await?;
        Ok(reply.trim().to_string())
    }
}
