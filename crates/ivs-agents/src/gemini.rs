use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::GenerativeBackend;
use crate::error::AgentError;

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generative backend for the Gemini `generateContent` HTTP API.
pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
    json_output: bool,
}

impl GeminiBackend {
    pub fn new(endpoint: String, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            timeout,
            json_output: true,
        }
    }

    /// Build from an API key held in the named environment variable.
    pub fn from_env(
        endpoint: String,
        api_key_env: &str,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let api_key = std::env::var(api_key_env)
            .map_err(|_| AgentError::Config(format!("{api_key_env} is not set")))?;
        Ok(Self::new(endpoint, api_key, model, timeout))
    }

    /// Ask for free text instead of a JSON document.
    pub fn plain_text(mut self) -> Self {
        self.json_output = false;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

/// Request body for `generateContent`.
pub fn request_body(system_prompt: &str, user_prompt: &str, json_output: bool) -> serde_json::Value {
    let mut body = serde_json::json!({
        "systemInstruction": {
            "parts": [{"text": system_prompt}]
        },
        "contents": [
            {
                "role": "user",
                "parts": [{"text": user_prompt}]
            }
        ]
    });
    if json_output {
        body["generationConfig"] = serde_json::json!({
            "responseMimeType": "application/json"
        });
    }
    body
}

/// Pull the first candidate's text out of a `generateContent` response.
pub fn candidate_text(response: &serde_json::Value) -> Result<String, AgentError> {
    let text = response
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = response
            .pointer("/promptFeedback/blockReason")
            .and_then(|r| r.as_str())
            .unwrap_or("no candidate text");
        return Err(AgentError::Parse(format!("Empty Gemini response: {reason}")));
    }
    Ok(text)
}

/// Map a non-success HTTP status to an error.
pub fn status_error(status: u16, body: &str) -> AgentError {
    match status {
        429 => AgentError::RateLimited(body.to_string()),
        _ => AgentError::Backend(format!("Gemini returned {status}: {body}")),
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AgentError> {
        debug!(model = %self.model, "Calling Gemini");

        let body = request_body(system_prompt, user_prompt, self.json_output);
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    AgentError::Backend(format!("Gemini request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, model = %self.model, "Gemini call failed");
            return Err(status_error(status.as_u16(), &text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(format!("Gemini response body: {e}")))?;
        candidate_text(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_requests_json_by_default() {
        let body = request_body("system", "user", true);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "system");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "user");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );

        let plain = request_body("system", "user", false);
        assert!(plain.get("generationConfig").is_none());
    }

    #[test]
    fn candidate_text_joins_parts() {
        let response = serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}
            }]
        });
        assert_eq!(candidate_text(&response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn blocked_prompt_is_parse_error() {
        let response = serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        });
        let err = candidate_text(&response).unwrap_err();
        assert!(matches!(err, AgentError::Parse(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn rate_limit_status() {
        assert!(matches!(status_error(429, "slow down"), AgentError::RateLimited(_)));
        assert!(matches!(status_error(503, "down"), AgentError::Backend(_)));
    }

    #[test]
    fn url_includes_model() {
        let backend = GeminiBackend::new(
            format!("{DEFAULT_GEMINI_ENDPOINT}/"),
            "key".to_string(),
            "gemini-2.0-flash".to_string(),
            Duration::from_secs(10),
        );
        assert_eq!(
            backend.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(backend.model(), "gemini-2.0-flash");
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let result = GeminiBackend::from_env(
            DEFAULT_GEMINI_ENDPOINT.to_string(),
            "IVS_TEST_KEY_THAT_IS_NEVER_SET",
            "gemini-2.0-flash".to_string(),
            Duration::from_secs(10),
        );
        assert!(matches!(result, Err(AgentError::Config(_))));
    }
}
