use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ivs_models::store_schema::now;
use ivs_models::{
    Analyses, AnalysisResult, AnalystKind, Claim, IdeaPayload, Report, StatusUpdate,
    SynthesisResult,
};
use ivs_store::SubmissionStore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analyst::AnalystPanel;
use crate::error::{AgentError, OrchestrationError};
use crate::synthesizer::SynthesisProcedure;

/// The orchestrator runs the four analysts in parallel, synthesizes their
/// output and persists the report before flipping the submission's status.
pub struct Orchestrator {
    panel: AnalystPanel,
    synthesizer: Arc<dyn SynthesisProcedure>,
    store: Arc<dyn SubmissionStore>,
    analyst_timeout: Duration,
    synthesis_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        panel: AnalystPanel,
        synthesizer: Arc<dyn SynthesisProcedure>,
        store: Arc<dyn SubmissionStore>,
        analyst_timeout: Duration,
        synthesis_timeout: Duration,
    ) -> Self {
        Self {
            panel,
            synthesizer,
            store,
            analyst_timeout,
            synthesis_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    /// Evaluate one submission end to end.
    ///
    /// The submission must be `analyzing` and unclaimed. On success the
    /// report is stored and the status reads `completed`. On any failure
    /// after the claim, a `failed` status carrying the error text is written
    /// on a best-effort basis and the original error is returned.
    pub async fn run(
        &self,
        submission_id: Uuid,
        payload: &IdeaPayload,
    ) -> Result<Report, OrchestrationError> {
        let start = Instant::now();
        let claim = self
            .store
            .claim(submission_id)
            .await
            .map_err(OrchestrationError::Claim)?;
        info!(%submission_id, run_id = %claim.run_id, "Starting analysis");

        match self.execute(&claim, payload).await {
            Ok(report) => {
                info!(
                    %submission_id,
                    recommendation = %report.synthesis.recommendation,
                    confidence = %report.synthesis.confidence_score,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Analysis complete"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(
                    %submission_id,
                    variant = e.variant().map(|v| v.as_str()),
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Analysis failed"
                );
                let update = StatusUpdate::Failed {
                    error_detail: e.to_string(),
                };
                if let Err(write_err) = self.store.update_status(&claim, update).await {
                    // Left in `analyzing`; the reconciler sweep picks it up.
                    error!(%submission_id, error = %write_err, "Could not record failed status");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, claim: &Claim, payload: &IdeaPayload) -> Result<Report, OrchestrationError> {
        let analyses = self.analyze_all(payload).await?;
        let synthesis = self.synthesize(payload, &analyses).await?;

        let report = Report::new(claim.submission_id, analyses, synthesis);
        self.store
            .create_report(claim, &report)
            .await
            .map_err(|source| OrchestrationError::Persistence {
                operation: "create_report",
                source,
            })?;

        self.store
            .update_status(claim, StatusUpdate::Completed { completed_at: now() })
            .await
            .map_err(|source| OrchestrationError::Persistence {
                operation: "update_status",
                source,
            })?;

        Ok(report)
    }

    /// Fan out to all four analysts. The first failure cancels the rest.
    async fn analyze_all(&self, payload: &IdeaPayload) -> Result<Analyses, OrchestrationError> {
        let (market, financial, technical, risk) = tokio::try_join!(
            self.analyze(AnalystKind::Market, payload),
            self.analyze(AnalystKind::Financial, payload),
            self.analyze(AnalystKind::Technical, payload),
            self.analyze(AnalystKind::Risk, payload),
        )?;

        Ok([
            (AnalystKind::Market, market),
            (AnalystKind::Financial, financial),
            (AnalystKind::Technical, technical),
            (AnalystKind::Risk, risk),
        ]
        .into_iter()
        .collect())
    }

    async fn analyze(
        &self,
        variant: AnalystKind,
        payload: &IdeaPayload,
    ) -> Result<AnalysisResult, OrchestrationError> {
        let agent_start = Instant::now();
        let procedure = self.panel.get(variant);
        let result = with_timeout(self.analyst_timeout, procedure.analyze(payload)).await;

        match result {
            Ok(analysis) => {
                debug!(%variant, elapsed_ms = agent_start.elapsed().as_millis(), "Analyst succeeded");
                Ok(analysis)
            }
            Err(source) => {
                debug!(%variant, error = %source, elapsed_ms = agent_start.elapsed().as_millis(), "Analyst failed");
                Err(OrchestrationError::Analysis { variant, source })
            }
        }
    }

    async fn synthesize(
        &self,
        payload: &IdeaPayload,
        analyses: &Analyses,
    ) -> Result<SynthesisResult, OrchestrationError> {
        with_timeout(
            self.synthesis_timeout,
            self.synthesizer.synthesize(payload, analyses),
        )
        .await
        .map_err(OrchestrationError::Synthesis)
    }
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, AgentError>>,
) -> Result<T, AgentError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Timeout(limit.as_millis() as u64)),
    }
}
