use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Current version of the report output schema.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// The four independent analyst perspectives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnalystKind {
    Market,
    Financial,
    Technical,
    Risk,
}

impl AnalystKind {
    pub const ALL: [AnalystKind; 4] = [
        AnalystKind::Market,
        AnalystKind::Financial,
        AnalystKind::Technical,
        AnalystKind::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalystKind::Market => "market",
            AnalystKind::Financial => "financial",
            AnalystKind::Technical => "technical",
            AnalystKind::Risk => "risk",
        }
    }
}

impl fmt::Display for AnalystKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalystKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(AnalystKind::Market),
            "financial" => Ok(AnalystKind::Financial),
            "technical" => Ok(AnalystKind::Technical),
            "risk" => Ok(AnalystKind::Risk),
            other => Err(format!("unknown analyst: {other}")),
        }
    }
}

/// One analyst's structured output. Its keys are variant-specific and are
/// forwarded to synthesis without inspection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AnalysisResult(pub serde_json::Map<String, serde_json::Value>);

impl AnalysisResult {
    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

impl TryFrom<serde_json::Value> for AnalysisResult {
    type Error = serde_json::Value;

    /// Only JSON objects are accepted; anything else is handed back.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(AnalysisResult(map)),
            other => Err(other),
        }
    }
}

/// Analyst outputs keyed by variant, never by arrival order.
pub type Analyses = BTreeMap<AnalystKind, AnalysisResult>;

/// Overall verdict from synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recommendation {
    Go,
    Caution,
    Reconsider,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Go => "go",
            Recommendation::Caution => "caution",
            Recommendation::Reconsider => "reconsider",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recommendation {
    type Err = String;

    /// Accepts the closed set plus the long-form labels models tend to echo.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "go" => Ok(Recommendation::Go),
            "caution" | "proceed-with-caution" => Ok(Recommendation::Caution),
            "reconsider" | "no-go" | "nogo" => Ok(Recommendation::Reconsider),
            _ => Err(format!("unknown recommendation: {s}")),
        }
    }
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Recommendation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CriticalAssumption {
    pub assumption: String,
    /// "critical", "important" or "nice-to-validate".
    #[serde(default)]
    pub importance: String,
    #[serde(default)]
    pub validation_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NextStep {
    pub action: String,
    /// Lower runs first.
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub timeline: String,
    #[serde(default)]
    pub resources: Vec<String>,
}

/// The merged recommendation produced from all four analyses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    pub recommendation: Recommendation,
    /// 0 to 10.
    pub confidence_score: Decimal,
    pub executive_summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub critical_assumptions: Vec<CriticalAssumption>,
    #[serde(default)]
    pub next_steps: Vec<NextStep>,
    #[serde(default)]
    pub potential_pivots: Vec<String>,
    #[serde(default)]
    pub comparable_startups: Vec<String>,
}

impl SynthesisResult {
    /// Next steps ordered by ascending priority.
    pub fn prioritized_steps(&self) -> Vec<&NextStep> {
        let mut steps: Vec<&NextStep> = self.next_steps.iter().collect();
        steps.sort_by_key(|s| s.priority);
        steps
    }
}

/// Terminal artifact of one successful orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: Uuid,
    pub schema_version: u32,
    pub submission_id: Uuid,
    pub analyses: Analyses,
    pub synthesis: SynthesisResult,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn new(submission_id: Uuid, analyses: Analyses, synthesis: SynthesisResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            schema_version: REPORT_SCHEMA_VERSION,
            submission_id,
            analyses,
            synthesis,
            created_at: crate::store_schema::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        AnalystKind::ALL
            .iter()
            .all(|kind| self.analyses.contains_key(kind))
    }
}
