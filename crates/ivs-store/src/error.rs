use ivs_models::SubmissionStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Submission not found: {0}")]
    NotFound(Uuid),

    #[error("Submission {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("Submission {id} is {status}, not analyzing")]
    NotAnalyzing { id: Uuid, status: SubmissionStatus },

    #[error("Submission {0} is already claimed by another run")]
    AlreadyClaimed(Uuid),

    #[error("Claim on submission {0} is no longer held")]
    ClaimLost(Uuid),

    #[error("Report already exists for submission {0}")]
    ReportExists(Uuid),

    #[error("No report written for submission {0}")]
    ReportMissing(Uuid),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store not available: {0}")]
    Unavailable(String),
}
