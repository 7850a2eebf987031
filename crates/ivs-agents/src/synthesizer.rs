use std::sync::Arc;

use async_trait::async_trait;
use ivs_models::{Analyses, CriticalAssumption, IdeaPayload, NextStep, Recommendation, SynthesisResult};
use rust_decimal::Decimal;
use tracing::debug;

use crate::backend::GenerativeBackend;
use crate::error::AgentError;
use crate::parser::extract_json;
use crate::prompts::{synthesis_user_prompt, synthesizer_system_prompt};

/// Merges the four analyses into one recommendation.
///
/// Callers guarantee `analyses` holds all four variants.
#[async_trait]
pub trait SynthesisProcedure: Send + Sync {
    async fn synthesize(
        &self,
        payload: &IdeaPayload,
        analyses: &Analyses,
    ) -> Result<SynthesisResult, AgentError>;
}

/// A synthesizer backed by a generative model.
pub struct ModelSynthesizer {
    backend: Arc<dyn GenerativeBackend>,
}

impl ModelSynthesizer {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SynthesisProcedure for ModelSynthesizer {
    async fn synthesize(
        &self,
        payload: &IdeaPayload,
        analyses: &Analyses,
    ) -> Result<SynthesisResult, AgentError> {
        let system_prompt = synthesizer_system_prompt();
        let user_prompt = synthesis_user_prompt(payload, analyses)?;

        debug!(model = %self.backend.model(), "Requesting synthesis");
        let raw_output = self.backend.generate(&system_prompt, &user_prompt).await?;
        let json_str = extract_json(&raw_output)?;
        let synthesized: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| AgentError::Parse(format!("Synthesizer JSON parse error: {e}")))?;

        build_synthesis(&synthesized)
    }
}

/// Build a SynthesisResult from the synthesizer's JSON output.
pub fn build_synthesis(synthesized: &serde_json::Value) -> Result<SynthesisResult, AgentError> {
    let parse = |field: &str| -> Result<serde_json::Value, AgentError> {
        synthesized
            .get(field)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| AgentError::Parse(format!("Missing field: {field}")))
    };
    let list = |field: &str| -> Result<Vec<String>, AgentError> {
        match synthesized.get(field) {
            None | Some(serde_json::Value::Null) => Ok(vec![]),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| AgentError::Parse(format!("{field}: {e}"))),
        }
    };

    let recommendation: Recommendation = serde_json::from_value(parse("recommendation")?)
        .map_err(|e| AgentError::Parse(format!("recommendation: {e}")))?;

    let confidence_score: Decimal = serde_json::from_value(parse("confidenceScore")?)
        .map_err(|e| AgentError::Parse(format!("confidenceScore: {e}")))?;
    if confidence_score < Decimal::ZERO || confidence_score > Decimal::TEN {
        return Err(AgentError::Parse(format!(
            "confidenceScore out of range 0-10: {confidence_score}"
        )));
    }

    let executive_summary: String = serde_json::from_value(parse("executiveSummary")?)
        .map_err(|e| AgentError::Parse(format!("executiveSummary: {e}")))?;

    let critical_assumptions: Vec<CriticalAssumption> = match synthesized.get("criticalAssumptions") {
        None | Some(serde_json::Value::Null) => vec![],
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| AgentError::Parse(format!("criticalAssumptions: {e}")))?,
    };

    let mut next_steps: Vec<NextStep> = match synthesized.get("nextSteps") {
        None | Some(serde_json::Value::Null) => vec![],
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| AgentError::Parse(format!("nextSteps: {e}")))?,
    };
    next_steps.sort_by_key(|s| s.priority);

    Ok(SynthesisResult {
        recommendation,
        confidence_score,
        executive_summary,
        strengths: list("strengths")?,
        concerns: list("concerns")?,
        critical_assumptions,
        next_steps,
        potential_pivots: list("potentialPivots")?,
        comparable_startups: list("comparableStartups")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{agriflow_payload, stub_analyses, StubBackend};
    use rust_decimal_macros::dec;

    #[test]
    fn build_synthesis_from_full_json() {
        let synthesized = serde_json::json!({
            "recommendation": "caution",
            "confidenceScore": 6,
            "executiveSummary": "Demand is real but cold-chain costs bite.",
            "strengths": ["Clear pain point"],
            "concerns": ["Working capital"],
            "criticalAssumptions": [
                {"assumption": "Farmers pay via M-Pesa", "importance": "critical", "validationMethod": "Pilot"}
            ],
            "nextSteps": [
                {"action": "Price test", "priority": 2, "timeline": "3 weeks", "resources": []},
                {"action": "Farmer interviews", "priority": 1, "timeline": "2 weeks", "resources": ["enumerators"]}
            ],
            "potentialPivots": ["B2B aggregation"],
            "comparableStartups": ["Twiga Foods"]
        });

        let synthesis = build_synthesis(&synthesized).unwrap();
        assert_eq!(synthesis.recommendation, Recommendation::Caution);
        assert_eq!(synthesis.confidence_score, dec!(6));
        assert_eq!(synthesis.critical_assumptions.len(), 1);
        assert_eq!(synthesis.next_steps[0].action, "Farmer interviews");
        assert_eq!(synthesis.comparable_startups, vec!["Twiga Foods".to_string()]);
    }

    #[test]
    fn build_synthesis_missing_field() {
        let synthesized = serde_json::json!({"recommendation": "go"});
        let err = build_synthesis(&synthesized).unwrap_err();
        assert!(err.to_string().contains("confidenceScore"));
    }

    #[test]
    fn build_synthesis_rejects_unknown_recommendation() {
        let synthesized = serde_json::json!({
            "recommendation": "maybe",
            "confidenceScore": 5,
            "executiveSummary": "Unsure"
        });
        assert!(matches!(build_synthesis(&synthesized), Err(AgentError::Parse(_))));
    }

    #[test]
    fn build_synthesis_rejects_out_of_range_confidence() {
        let synthesized = serde_json::json!({
            "recommendation": "go",
            "confidenceScore": 42,
            "executiveSummary": "Certain"
        });
        let err = build_synthesis(&synthesized).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn model_synthesizer_sends_all_analyses() {
        let backend = Arc::new(StubBackend::replying(
            r#"{"recommendation": "go", "confidenceScore": 7, "executiveSummary": "Strong fit"}"#,
        ));
        let synthesizer = ModelSynthesizer::new(backend.clone());

        let synthesis = synthesizer
            .synthesize(&agriflow_payload(), &stub_analyses())
            .await
            .unwrap();
        assert_eq!(synthesis.recommendation, Recommendation::Go);

        let (_, user) = backend.last_prompts().unwrap();
        for variant in ["market", "financial", "technical", "risk"] {
            assert!(user.contains(&format!("\"{variant}\"")), "missing {variant}");
        }
    }
}
