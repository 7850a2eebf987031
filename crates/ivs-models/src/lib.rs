pub mod config;
pub mod idea;
pub mod report;
pub mod store_schema;
pub mod submission;

pub use config::{AgentsConfig, AnalystConfig, BackendConfig, BackendKind, IvsConfig, StoreConfig};
pub use idea::IdeaPayload;
pub use report::{
    Analyses, AnalysisResult, AnalystKind, CriticalAssumption, NextStep, Recommendation, Report,
    SynthesisResult, REPORT_SCHEMA_VERSION,
};
pub use submission::{Claim, StatusUpdate, Submission, SubmissionStatus};
