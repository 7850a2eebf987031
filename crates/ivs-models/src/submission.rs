use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::idea::IdeaPayload;

/// Lifecycle of a submission.
///
/// `pending -> analyzing -> completed | failed`. Intake sets the first two,
/// the orchestrator owns the terminal transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Analyzing => "analyzing",
            SubmissionStatus::Completed => "completed",
            SubmissionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Completed | SubmissionStatus::Failed)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "analyzing" => Ok(SubmissionStatus::Analyzing),
            "completed" => Ok(SubmissionStatus::Completed),
            "failed" => Ok(SubmissionStatus::Failed),
            other => Err(format!("unknown submission status: {other}")),
        }
    }
}

/// The durable record of one idea evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: Uuid,
    pub owner_id: String,
    pub payload: IdeaPayload,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only while `status == failed`.
    pub error_detail: Option<String>,
}

/// Ticket held by exactly one orchestrator run for a submission.
///
/// Report and terminal status writes are conditional on the ticket, so an
/// overlapping run for the same submission cannot clobber this one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    pub submission_id: Uuid,
    pub run_id: Uuid,
}

impl Claim {
    pub fn new(submission_id: Uuid) -> Self {
        Self {
            submission_id,
            run_id: Uuid::new_v4(),
        }
    }
}

/// Terminal status write issued by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Completed { completed_at: DateTime<Utc> },
    Failed { error_detail: String },
}

impl StatusUpdate {
    pub fn status(&self) -> SubmissionStatus {
        match self {
            StatusUpdate::Completed { .. } => SubmissionStatus::Completed,
            StatusUpdate::Failed { .. } => SubmissionStatus::Failed,
        }
    }
}
