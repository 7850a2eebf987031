//! Integration tests against real generative backends.
//!
//! These tests are `#[ignore]` by default. They require either:
//! - The `claude` CLI installed, on PATH and signed in
//! - `GEMINI_API_KEY` set in the environment
//!
//! Run explicitly with:
//! ```bash
//! cargo test -p ivs-agents --test cli_integration -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use ivs_agents::claude_cli::{check_cli_available, invoke_claude, ClaudeCliBackend, ClaudeCliConfig};
use ivs_agents::gemini::{GeminiBackend, DEFAULT_GEMINI_ENDPOINT};
use ivs_agents::parser::extract_json;
use ivs_agents::test_support::agriflow_payload;
use ivs_agents::{AnalysisProcedure, ModelAnalyst};
use ivs_models::AnalystKind;

#[tokio::test]
#[ignore]
async fn cli_is_available() {
    assert!(check_cli_available().await, "claude CLI not found on PATH");
}

/// Catches changes in the CLI's output wrapping that would break extraction.
#[tokio::test]
#[ignore]
async fn cli_output_is_parseable_json() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let config = ClaudeCliConfig {
        model: "claude-3-5-haiku-latest".to_string(),
        timeout: Duration::from_secs(30),
        ..Default::default()
    };
    let system_prompt = concat!(
        "You are a test agent. Respond ONLY with a JSON object, no other text.\n",
        "The JSON must have exactly these fields:\n",
        "- \"status\": the string \"ok\"\n",
        "- \"echo\": repeat back the user's message exactly\n",
    );

    let raw = invoke_claude(system_prompt, "ping", &config)
        .await
        .expect("Claude CLI invocation failed");
    let json_str = extract_json(&raw)
        .unwrap_or_else(|e| panic!("Failed to extract JSON ({e}). Raw output:\n---\n{raw}\n---"));
    let parsed: serde_json::Value =
        serde_json::from_str(&json_str).expect("Extracted JSON is not valid");

    assert_eq!(parsed["status"], "ok", "Unexpected response structure: {parsed}");
}

#[tokio::test]
#[ignore]
async fn cli_backend_runs_risk_analysis() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let backend = Arc::new(ClaudeCliBackend::new(
        "claude-3-5-haiku-latest".to_string(),
        Duration::from_secs(90),
    ));
    let analyst = ModelAnalyst::new(AnalystKind::Risk, backend);
    let result = analyst
        .analyze(&agriflow_payload())
        .await
        .expect("risk analysis failed");
    assert!(!result.0.is_empty());
}

#[tokio::test]
#[ignore]
async fn gemini_backend_runs_market_analysis() {
    let backend = match GeminiBackend::from_env(
        DEFAULT_GEMINI_ENDPOINT.to_string(),
        "GEMINI_API_KEY",
        "gemini-2.0-flash".to_string(),
        Duration::from_secs(60),
    ) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            eprintln!("Skipping: {e}");
            return;
        }
    };

    let analyst = ModelAnalyst::new(AnalystKind::Market, backend);
    let result = analyst
        .analyze(&agriflow_payload())
        .await
        .expect("market analysis failed");
    assert!(!result.0.is_empty());
}
