use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ivs_models::{Claim, IdeaPayload, Report, StatusUpdate, Submission};
use uuid::Uuid;

use crate::error::StoreError;

/// Durable keyed storage for submissions and their reports.
///
/// Every method is atomic at single-record granularity. Report and terminal
/// status writes are guarded by a [`Claim`], so only the run that claimed a
/// submission can finish it.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Create a new submission in `pending`.
    async fn create_submission(
        &self,
        owner_id: &str,
        payload: &IdeaPayload,
    ) -> Result<Submission, StoreError>;

    /// Move a submission to `analyzing`.
    ///
    /// Allowed from `pending` and from either terminal state. Leaving a
    /// terminal state clears `error_detail`, `completed_at` and any previous
    /// report so the next run starts clean.
    async fn begin_analysis(&self, id: Uuid) -> Result<Submission, StoreError>;

    /// Take the claim ticket on an `analyzing` submission that no other run holds.
    async fn claim(&self, id: Uuid) -> Result<Claim, StoreError>;

    /// Write the report. Fails unless the claim is still held and no report exists.
    async fn create_report(&self, claim: &Claim, report: &Report) -> Result<(), StoreError>;

    /// Write the terminal status and release the claim.
    ///
    /// `Completed` is rejected unless the report is already present.
    /// `Failed` discards any report written under the same claim.
    async fn update_status(&self, claim: &Claim, update: StatusUpdate) -> Result<(), StoreError>;

    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError>;

    /// Look up a report through its submission id.
    async fn get_report(&self, submission_id: Uuid) -> Result<Option<Report>, StoreError>;

    /// All submissions for an owner, newest first.
    async fn list_submissions(&self, owner_id: &str) -> Result<Vec<Submission>, StoreError>;

    /// Delete a submission together with its report. Returns false if absent.
    async fn delete_submission(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Fail every `analyzing` submission not touched since `older_than`.
    /// Returns the ids that were failed.
    async fn fail_stale(
        &self,
        older_than: DateTime<Utc>,
        error_detail: &str,
    ) -> Result<Vec<Uuid>, StoreError>;
}
