//! Data models for the forensic pipeline.
//!
//! This module contains the core data structures passed between the
//! collector, the analysis layer and the report renderer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Outcome of a single collection routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Whether the routine ran and exited with status 0.
    pub success: bool,
    /// Captured standard output.
    pub output: String,
    /// Captured standard error, or the spawn diagnostic.
    pub error: String,
    /// Exit status of the routine, `-1` when it could not be started.
    pub exit_code: i32,
}

impl TaskResult {
    /// Creates a result for a routine that could not be invoked at all.
    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: message.into(),
            exit_code: -1,
        }
    }

    /// Returns the most useful diagnostic for a failed run.
    pub fn diagnostic(&self) -> &str {
        if self.error.trim().is_empty() {
            self.output.trim()
        } else {
            self.error.trim()
        }
    }
}

/// Risk or confidence level reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    #[default]
    Low,
}

impl From<&str> for Level {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Level::High,
            "medium" => Level::Medium,
            _ => Level::Low,
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Level::from).unwrap_or_default())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::High => write!(f, "HIGH"),
            Level::Medium => write!(f, "MEDIUM"),
            Level::Low => write!(f, "LOW"),
        }
    }
}

/// A single finding extracted from the model's structured reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: Level,
    #[serde(default)]
    pub risk_level: Level,
    #[serde(default, deserialize_with = "lenient_text")]
    pub evidence: Option<String>,
}

/// The structured object embedded in a model reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    /// General analysis paragraph.
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: Option<String>,
    /// Findings in the order the model returned them.
    #[serde(default, deserialize_with = "lenient_findings")]
    pub findings: Vec<Finding>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub recommendations: Vec<String>,
    /// Metric name to value, in the model's key order.
    #[serde(default, deserialize_with = "lenient_map")]
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub statistics: Map<String, Value>,
}

impl StructuredAnalysis {
    /// The skeleton used when the reply carries no decodable object.
    pub fn fallback(summary: &str) -> Self {
        Self {
            summary: Some(summary.to_string()),
            ..Self::default()
        }
    }
}

/// Result of one analysis round-trip with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    /// Short prose summary preceding the structured object.
    pub summary_short: String,
    pub structured: StructuredAnalysis,
    /// The model's reply, verbatim.
    pub full_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Creates a failed analysis carrying only a diagnostic.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            summary_short: String::new(),
            structured: StructuredAnalysis::default(),
            full_text: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Converts a JSON scalar into display text. `null` yields nothing.
pub fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(value_to_text))
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let items = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter_map(value_to_text).collect(),
        other => value_to_text(other).into_iter().collect(),
    };
    Ok(items)
}

/// Keeps the entries that are objects. Anything else in the list, or a
/// list that is not an array, is dropped.
fn lenient_findings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Finding>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    let findings = items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    Ok(findings)
}

fn lenient_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map<String, Value>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
