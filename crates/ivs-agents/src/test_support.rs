//! Test doubles for the analysis pipeline.
//!
//! Stub analysts and synthesizers stand in for model-backed procedures so
//! orchestration can be exercised without a network. `RecordingStore` wraps
//! an in-memory SQLite store, logs every write in order and can be told to
//! fail specific writes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ivs_models::{
    Analyses, AnalysisResult, AnalystKind, Claim, IdeaPayload, Recommendation, Report,
    StatusUpdate, Submission, SynthesisResult,
};
use ivs_store::{SqliteStore, StoreError, SubmissionStore};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::analyst::{AnalysisProcedure, AnalystPanel};
use crate::backend::GenerativeBackend;
use crate::error::AgentError;
use crate::synthesizer::SynthesisProcedure;

/// The AgriFlow idea used across tests.
pub fn agriflow_payload() -> IdeaPayload {
    IdeaPayload {
        title: "AgriFlow".to_string(),
        description: "Cold-chain logistics marketplace for smallholder farmers".to_string(),
        category: "Agritech".to_string(),
        problem_statement: "Up to 40% of produce spoils between farm and market".to_string(),
        proposed_solution: "Shared solar cold rooms booked by SMS, paid via mobile money"
            .to_string(),
        target_customers: "Smallholder farmers and produce aggregators".to_string(),
        distribution_channels: Some("Farmer cooperatives".to_string()),
        target_countries: vec!["Kenya".to_string(), "Uganda".to_string()],
        target_city: Some("Nairobi".to_string()),
        stage: "Idea only".to_string(),
        competitors: Some("Twiga Foods, ColdHubs".to_string()),
        budget: "$50k".to_string(),
        team_size: "2-3".to_string(),
        timeline: "6 months".to_string(),
    }
}

/// Canned analysis output for a variant.
pub fn stub_analysis(kind: AnalystKind) -> AnalysisResult {
    let value = serde_json::json!({
        "variant": kind.as_str(),
        "summary": format!("{kind} outlook is favourable"),
        "score": 7,
    });
    AnalysisResult::try_from(value).unwrap_or_default()
}

pub fn stub_analyses() -> Analyses {
    AnalystKind::ALL
        .iter()
        .map(|k| (*k, stub_analysis(*k)))
        .collect()
}

pub fn stub_synthesis() -> SynthesisResult {
    SynthesisResult {
        recommendation: Recommendation::Go,
        confidence_score: Decimal::from(7),
        executive_summary: "Strong demand and a credible path to unit economics.".to_string(),
        strengths: vec!["Acute, measurable pain".to_string()],
        concerns: vec!["Capital-intensive hardware".to_string()],
        critical_assumptions: vec![],
        next_steps: vec![],
        potential_pivots: vec![],
        comparable_startups: vec!["ColdHubs".to_string()],
    }
}

/// A panel of four succeeding stub analysts.
pub fn stub_panel() -> AnalystPanel {
    panel_of(AnalystKind::ALL.iter().map(|k| StubAnalyst::ok(*k)).collect())
}

/// Build a panel from stub analysts. Panics on duplicates or gaps.
pub fn panel_of(analysts: Vec<StubAnalyst>) -> AnalystPanel {
    let procedures: Vec<Arc<dyn AnalysisProcedure>> = analysts
        .into_iter()
        .map(|a| Arc::new(a) as Arc<dyn AnalysisProcedure>)
        .collect();
    match AnalystPanel::new(procedures) {
        Ok(panel) => panel,
        Err(e) => panic!("invalid stub panel: {e}"),
    }
}

/// An analyst that returns a fixed result after an optional delay.
pub struct StubAnalyst {
    kind: AnalystKind,
    outcome: Result<AnalysisResult, String>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StubAnalyst {
    pub fn ok(kind: AnalystKind) -> Self {
        Self::with_output(kind, stub_analysis(kind))
    }

    pub fn with_output(kind: AnalystKind, output: AnalysisResult) -> Self {
        Self {
            kind,
            outcome: Ok(output),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(kind: AnalystKind, message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            ..Self::ok(kind)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter of `analyze` invocations.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl AnalysisProcedure for StubAnalyst {
    fn kind(&self) -> AnalystKind {
        self.kind
    }

    async fn analyze(&self, _payload: &IdeaPayload) -> Result<AnalysisResult, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone().map_err(AgentError::Backend)
    }
}

/// A synthesizer that records the analyses it was given.
pub struct StubSynthesizer {
    outcome: Result<SynthesisResult, String>,
    delay: Duration,
    seen: Mutex<Option<Analyses>>,
}

impl StubSynthesizer {
    pub fn new() -> Self {
        Self {
            outcome: Ok(stub_synthesis()),
            delay: Duration::ZERO,
            seen: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn seen_analyses(&self) -> Option<Analyses> {
        self.seen.lock().ok().and_then(|seen| seen.clone())
    }
}

impl Default for StubSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SynthesisProcedure for StubSynthesizer {
    async fn synthesize(
        &self,
        _payload: &IdeaPayload,
        analyses: &Analyses,
    ) -> Result<SynthesisResult, AgentError> {
        if let Ok(mut seen) = self.seen.lock() {
            *seen = Some(analyses.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone().map_err(AgentError::Backend)
    }
}

/// A backend that replies with fixed text and remembers the last prompts.
pub struct StubBackend {
    reply: Result<String, String>,
    prompts: Mutex<Option<(String, String)>>,
}

impl StubBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(None),
        }
    }

    /// The (system, user) prompts of the most recent call.
    pub fn last_prompts(&self) -> Option<(String, String)> {
        self.prompts.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl GenerativeBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-model"
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AgentError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            *prompts = Some((system_prompt.to_string(), user_prompt.to_string()));
        }
        self.reply.clone().map_err(AgentError::Backend)
    }
}

/// An in-memory store that logs writes and can inject write failures.
pub struct RecordingStore {
    inner: SqliteStore,
    fail_report: AtomicBool,
    fail_completed: AtomicBool,
    fail_failed: AtomicBool,
    ops: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        let inner = match SqliteStore::open_in_memory() {
            Ok(store) => store,
            Err(e) => panic!("in-memory store: {e}"),
        };
        Self {
            inner,
            fail_report: AtomicBool::new(false),
            fail_completed: AtomicBool::new(false),
            fail_failed: AtomicBool::new(false),
            ops: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_report_writes(&self) {
        self.fail_report.store(true, Ordering::SeqCst);
    }

    pub fn fail_completed_writes(&self) {
        self.fail_completed.store(true, Ordering::SeqCst);
    }

    pub fn fail_failed_writes(&self) {
        self.fail_failed.store(true, Ordering::SeqCst);
    }

    /// Claim and write operations in the order they were attempted.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    fn record(&self, op: &str) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op.to_string());
        }
    }
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionStore for RecordingStore {
    async fn create_submission(
        &self,
        owner_id: &str,
        payload: &IdeaPayload,
    ) -> Result<Submission, StoreError> {
        self.inner.create_submission(owner_id, payload).await
    }

    async fn begin_analysis(&self, id: Uuid) -> Result<Submission, StoreError> {
        self.record("begin_analysis");
        self.inner.begin_analysis(id).await
    }

    async fn claim(&self, id: Uuid) -> Result<Claim, StoreError> {
        self.record("claim");
        self.inner.claim(id).await
    }

    async fn create_report(&self, claim: &Claim, report: &Report) -> Result<(), StoreError> {
        self.record("create_report");
        if self.fail_report.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected report write failure".into()));
        }
        self.inner.create_report(claim, report).await
    }

    async fn update_status(&self, claim: &Claim, update: StatusUpdate) -> Result<(), StoreError> {
        self.record(&format!("update_status:{}", update.status()));
        let fail = match update {
            StatusUpdate::Completed { .. } => &self.fail_completed,
            StatusUpdate::Failed { .. } => &self.fail_failed,
        };
        if fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected status write failure".into()));
        }
        self.inner.update_status(claim, update).await
    }

    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        self.inner.get_submission(id).await
    }

    async fn get_report(&self, submission_id: Uuid) -> Result<Option<Report>, StoreError> {
        self.inner.get_report(submission_id).await
    }

    async fn list_submissions(&self, owner_id: &str) -> Result<Vec<Submission>, StoreError> {
        self.inner.list_submissions(owner_id).await
    }

    async fn delete_submission(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete_submission(id).await
    }

    async fn fail_stale(
        &self,
        older_than: DateTime<Utc>,
        error_detail: &str,
    ) -> Result<Vec<Uuid>, StoreError> {
        self.inner.fail_stale(older_than, error_detail).await
    }
}
