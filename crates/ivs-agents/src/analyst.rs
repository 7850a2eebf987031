use std::sync::Arc;

use async_trait::async_trait;
use ivs_models::{AnalysisResult, AnalystKind, IdeaPayload};
use tracing::debug;

use crate::backend::GenerativeBackend;
use crate::error::AgentError;
use crate::parser::parse_object;
use crate::prompts::{analyst_system_prompt, analyst_user_prompt};

/// One analyst perspective. Stateless; calling it twice with the same
/// payload may return different output. Mockable for testing.
#[async_trait]
pub trait AnalysisProcedure: Send + Sync {
    fn kind(&self) -> AnalystKind;

    async fn analyze(&self, payload: &IdeaPayload) -> Result<AnalysisResult, AgentError>;
}

/// An analyst backed by a generative model.
pub struct ModelAnalyst {
    kind: AnalystKind,
    backend: Arc<dyn GenerativeBackend>,
}

impl ModelAnalyst {
    pub fn new(kind: AnalystKind, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { kind, backend }
    }
}

#[async_trait]
impl AnalysisProcedure for ModelAnalyst {
    fn kind(&self) -> AnalystKind {
        self.kind
    }

    async fn analyze(&self, payload: &IdeaPayload) -> Result<AnalysisResult, AgentError> {
        let system_prompt = analyst_system_prompt(self.kind);
        let user_prompt = analyst_user_prompt(self.kind, payload);

        debug!(variant = %self.kind, model = %self.backend.model(), "Requesting analysis");
        let raw_output = self.backend.generate(&system_prompt, &user_prompt).await?;
        Ok(AnalysisResult(parse_object(&raw_output)?))
    }
}

/// Exactly one procedure for each of the four analyst kinds.
#[derive(Clone)]
pub struct AnalystPanel {
    market: Arc<dyn AnalysisProcedure>,
    financial: Arc<dyn AnalysisProcedure>,
    technical: Arc<dyn AnalysisProcedure>,
    risk: Arc<dyn AnalysisProcedure>,
}

impl AnalystPanel {
    /// Assemble a panel, rejecting duplicates and missing kinds.
    pub fn new(procedures: Vec<Arc<dyn AnalysisProcedure>>) -> Result<Self, AgentError> {
        let mut slots: [Option<Arc<dyn AnalysisProcedure>>; 4] = [None, None, None, None];

        for procedure in procedures {
            let kind = procedure.kind();
            let slot = &mut slots[slot_index(kind)];
            if slot.is_some() {
                return Err(AgentError::Config(format!("duplicate {kind} analyst")));
            }
            *slot = Some(procedure);
        }

        let [market, financial, technical, risk] = slots;
        let missing = |kind: AnalystKind| AgentError::Config(format!("missing {kind} analyst"));
        Ok(Self {
            market: market.ok_or_else(|| missing(AnalystKind::Market))?,
            financial: financial.ok_or_else(|| missing(AnalystKind::Financial))?,
            technical: technical.ok_or_else(|| missing(AnalystKind::Technical))?,
            risk: risk.ok_or_else(|| missing(AnalystKind::Risk))?,
        })
    }

    pub fn get(&self, kind: AnalystKind) -> &Arc<dyn AnalysisProcedure> {
        match kind {
            AnalystKind::Market => &self.market,
            AnalystKind::Financial => &self.financial,
            AnalystKind::Technical => &self.technical,
            AnalystKind::Risk => &self.risk,
        }
    }
}

fn slot_index(kind: AnalystKind) -> usize {
    match kind {
        AnalystKind::Market => 0,
        AnalystKind::Financial => 1,
        AnalystKind::Technical => 2,
        AnalystKind::Risk => 3,
    }
}
