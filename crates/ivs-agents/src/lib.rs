pub mod advisor;
pub mod analyst;
pub mod backend;
pub mod claude_cli;
pub mod dispatcher;
pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod reconciler;
pub mod synthesizer;

pub mod test_support;

pub use advisor::Advisor;
pub use analyst::{AnalysisProcedure, AnalystPanel, ModelAnalyst};
pub use backend::GenerativeBackend;
pub use dispatcher::Dispatcher;
pub use error::{AgentError, OrchestrationError};
pub use orchestrator::Orchestrator;
pub use reconciler::Reconciler;
pub use synthesizer::{build_synthesis, ModelSynthesizer, SynthesisProcedure};
