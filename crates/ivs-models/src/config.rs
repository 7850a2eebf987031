use serde::{Deserialize, Serialize};

use crate::report::AnalystKind;

/// Top-level configuration for IVS.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IvsConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Configuration for the submission store and its read-side cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database holding submissions and reports.
    pub sqlite_path: String,
    /// Maximum number of reports kept in the in-memory moka cache.
    pub report_cache_capacity: u64,
    /// How long a cached report stays in memory.
    pub report_cache_ttl_seconds: u64,
    /// Submissions left in `analyzing` longer than this are failed by the sweep.
    pub stale_after_seconds: u64,
    /// Interval between reconciliation sweeps.
    pub sweep_interval_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/ivs.db".to_string(),
            report_cache_capacity: 1_000,
            report_cache_ttl_seconds: 300,
            stale_after_seconds: 900,
            sweep_interval_seconds: 300,
        }
    }
}

/// Configuration for the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    /// Upper bound for each analyst call.
    pub analyst_timeout_seconds: u64,
    /// Upper bound for the synthesis call.
    pub synthesis_timeout_seconds: u64,
    /// Default model for the four analysts.
    pub analyst_model: String,
    /// Model used for synthesis and the advisor.
    pub synthesizer_model: String,
    /// Per-analyst overrides. Analysts not listed use `analyst_model`.
    pub analysts: Vec<AnalystConfig>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            analyst_timeout_seconds: 60,
            synthesis_timeout_seconds: 90,
            analyst_model: "gemini-2.0-flash".to_string(),
            synthesizer_model: "gemini-2.0-flash".to_string(),
            analysts: vec![],
        }
    }
}

impl AgentsConfig {
    /// Resolve the model for an analyst, falling back to `analyst_model`.
    pub fn model_for(&self, kind: AnalystKind) -> String {
        self.analysts
            .iter()
            .find(|a| a.kind == kind)
            .and_then(|a| a.model.clone())
            .unwrap_or_else(|| self.analyst_model.clone())
    }
}

/// Per-analyst configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalystConfig {
    pub kind: AnalystKind,
    /// Override model for this analyst.
    pub model: Option<String>,
}

/// Which generative backend serves the procedures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Gemini,
    ClaudeCli,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Environment variable holding the API key (HTTP backends only).
    pub api_key_env: String,
    /// Base URL of the HTTP API.
    pub endpoint: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Gemini,
            api_key_env: "GEMINI_API_KEY".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}
