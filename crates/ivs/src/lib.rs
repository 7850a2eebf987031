//! IVS - Idea Validation System
//!
//! Evaluates startup ideas with four parallel analyst procedures (market,
//! financial, technical, risk) and a synthesis step, persisting one report
//! per submission.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use ivs::models::{IdeaPayload, IvsConfig};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = IvsConfig::default();
//! let store = ivs::build_store(&config)?;
//! let orchestrator = std::sync::Arc::new(ivs::build_orchestrator(&config, store.clone())?);
//! let dispatcher = ivs::agents::Dispatcher::new(orchestrator);
//! let id = dispatcher.submit("founder-1", IdeaPayload::default()).await?;
//! dispatcher.shutdown().await;
//! let reader = ivs::build_reader(&config, store);
//! let _report = reader.report_for(id).await?;
//! # Ok(())
//! # }
//! ```

pub use ivs_agents as agents;
pub use ivs_models as models;
pub use ivs_store as store;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ivs_agents::claude_cli::ClaudeCliBackend;
use ivs_agents::gemini::GeminiBackend;
use ivs_agents::{
    Advisor, AnalysisProcedure, AnalystPanel, GenerativeBackend, ModelAnalyst, ModelSynthesizer,
    Orchestrator, Reconciler,
};
use ivs_models::{AnalystKind, BackendKind, IvsConfig};
use ivs_store::{SqliteStore, SubmissionReader, SubmissionStore};

/// Load configuration from a TOML file.
pub fn load_config(path: &str) -> Result<IvsConfig, anyhow::Error> {
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config: {path}"))
}

/// Open the SQLite store, creating its parent directory if needed.
pub fn build_store(config: &IvsConfig) -> Result<Arc<dyn SubmissionStore>, anyhow::Error> {
    let path = &config.store.sqlite_path;
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let store = SqliteStore::open(path).with_context(|| format!("Failed to open store: {path}"))?;
    Ok(Arc::new(store))
}

/// Build the configured generative backend for one model.
///
/// `json_output` asks HTTP backends for a JSON document; the CLI backend
/// relies on the prompt alone.
pub fn build_backend(
    config: &IvsConfig,
    model: &str,
    timeout: Duration,
    json_output: bool,
) -> Result<Arc<dyn GenerativeBackend>, anyhow::Error> {
    let backend: Arc<dyn GenerativeBackend> = match config.backend.kind {
        BackendKind::Gemini => {
            let gemini = GeminiBackend::from_env(
                config.backend.endpoint.clone(),
                &config.backend.api_key_env,
                model.to_string(),
                timeout,
            )?;
            if json_output {
                Arc::new(gemini)
            } else {
                Arc::new(gemini.plain_text())
            }
        }
        BackendKind::ClaudeCli => Arc::new(ClaudeCliBackend::new(model.to_string(), timeout)),
    };
    Ok(backend)
}

/// Build an Orchestrator with one model-backed analyst per kind.
pub fn build_orchestrator(
    config: &IvsConfig,
    store: Arc<dyn SubmissionStore>,
) -> Result<Orchestrator, anyhow::Error> {
    let agents = &config.agents;
    let analyst_timeout = Duration::from_secs(agents.analyst_timeout_seconds);
    let synthesis_timeout = Duration::from_secs(agents.synthesis_timeout_seconds);

    let mut procedures: Vec<Arc<dyn AnalysisProcedure>> = Vec::with_capacity(4);
    for kind in AnalystKind::ALL {
        let backend = build_backend(config, &agents.model_for(kind), analyst_timeout, true)?;
        procedures.push(Arc::new(ModelAnalyst::new(kind, backend)));
    }
    let panel = AnalystPanel::new(procedures)?;

    let synthesizer_backend =
        build_backend(config, &agents.synthesizer_model, synthesis_timeout, true)?;

    Ok(Orchestrator::new(
        panel,
        Arc::new(ModelSynthesizer::new(synthesizer_backend)),
        store,
        analyst_timeout,
        synthesis_timeout,
    ))
}

pub fn build_reader(config: &IvsConfig, store: Arc<dyn SubmissionStore>) -> SubmissionReader {
    SubmissionReader::new(
        store,
        config.store.report_cache_capacity,
        Duration::from_secs(config.store.report_cache_ttl_seconds),
    )
}

pub fn build_advisor(
    config: &IvsConfig,
    store: Arc<dyn SubmissionStore>,
) -> Result<Advisor, anyhow::Error> {
    let backend = build_backend(
        config,
        &config.agents.synthesizer_model,
        Duration::from_secs(config.agents.synthesis_timeout_seconds),
        false,
    )?;
    Ok(Advisor::new(store, backend))
}

/// Build the stale-run sweeper.
///
/// A healthy run can take every analyst timeout plus the synthesis timeout,
/// so `stale_after_seconds` must be longer than that.
pub fn build_reconciler(
    config: &IvsConfig,
    store: Arc<dyn SubmissionStore>,
) -> Result<Reconciler, anyhow::Error> {
    let agents = &config.agents;
    let longest_run = agents
        .analyst_timeout_seconds
        .saturating_add(agents.synthesis_timeout_seconds);
    if config.store.stale_after_seconds <= longest_run {
        anyhow::bail!(
            "stale_after_seconds ({}) must exceed analyst_timeout_seconds + \
             synthesis_timeout_seconds ({longest_run})",
            config.store.stale_after_seconds
        );
    }
    Ok(Reconciler::new(
        store,
        Duration::from_secs(config.store.stale_after_seconds),
        Duration::from_secs(config.store.sweep_interval_seconds),
    )?)
}
