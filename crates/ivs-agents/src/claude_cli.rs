use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::backend::GenerativeBackend;
use crate::error::AgentError;

/// Configuration for a Claude CLI invocation.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
    /// Executable to run; `claude` on PATH unless overridden.
    pub program: String,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(45),
            program: "claude".to_string(),
        }
    }
}

/// Arguments for a one-shot, plain-text CLI call.
pub fn cli_args<'a>(system_prompt: &'a str, user_prompt: &'a str, model: &'a str) -> [&'a str; 8] {
    [
        "-p",
        user_prompt,
        "--system-prompt",
        system_prompt,
        "--model",
        model,
        "--output-format",
        "text",
    ]
}

/// Invoke the CLI and return its raw stdout.
///
/// The child is killed if the timeout fires first.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, AgentError> {
    debug!(program = %config.program, model = %config.model, "Invoking claude CLI");

    let mut command = Command::new(&config.program);
    command
        .args(cli_args(system_prompt, user_prompt, &config.model))
        .kill_on_drop(true);

    let output = tokio::time::timeout(config.timeout, command.output())
        .await
        .map_err(|_| AgentError::Timeout(config.timeout.as_millis() as u64))?
        .map_err(|e| AgentError::Backend(format!("Failed to spawn {}: {e}", config.program)))?;

    stdout_text(output)
}

/// Classify a finished CLI process.
fn stdout_text(output: Output) -> Result<String, AgentError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = %output.status, stderr = %stderr, "Claude CLI failed");
        let detail = format!("claude exited {}: {}", output.status, stderr.trim());
        return Err(if stderr.to_lowercase().contains("rate limit") {
            AgentError::RateLimited(detail)
        } else {
            AgentError::Backend(detail)
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.trim().is_empty() {
        return Err(AgentError::Backend("Claude returned empty response".to_string()));
    }
    Ok(stdout)
}

/// Check if the `claude` CLI is available on the system.
pub async fn check_cli_available() -> bool {
    match Command::new("claude").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Generative backend that shells out to the local `claude` CLI.
pub struct ClaudeCliBackend {
    pub config: ClaudeCliConfig,
}

impl ClaudeCliBackend {
    pub fn new(model: String, timeout: Duration) -> Self {
        Self {
            config: ClaudeCliConfig {
                model,
                timeout,
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl GenerativeBackend for ClaudeCliBackend {
    fn name(&self) -> &str {
        "claude_cli"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AgentError> {
        invoke_claude(system_prompt, user_prompt, &self.config).await
    }
}
