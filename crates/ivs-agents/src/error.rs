use ivs_models::AnalystKind;
use ivs_store::StoreError;
use thiserror::Error;

/// Failure of a single generative call or of the procedure wrapping it.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend rate limited: {0}")]
    RateLimited(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why an orchestrator run did not produce a report.
///
/// The `Display` text is what lands in the submission's `error_detail`.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("{variant} analysis failed: {source}")]
    Analysis {
        variant: AnalystKind,
        #[source]
        source: AgentError,
    },

    #[error("synthesis failed: {0}")]
    Synthesis(#[source] AgentError),

    #[error("persistence failed during {operation}: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// The run never owned the submission, so no status was written.
    #[error("could not claim submission: {0}")]
    Claim(#[source] StoreError),
}

impl OrchestrationError {
    /// The analyst that caused the failure, if any.
    pub fn variant(&self) -> Option<AnalystKind> {
        match self {
            OrchestrationError::Analysis { variant, .. } => Some(*variant),
            _ => None,
        }
    }
}
