use async_trait::async_trait;

use crate::error::AgentError;

/// A generative model reachable through one request/response call.
///
/// Implementations return the model's raw text; callers strip formatting
/// and parse it. Mockable for testing.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, AgentError>;
}
