//! Weather context document (schema 1.0.0)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version string stamped on every saved document
pub const CONTEXT_VERSION: &str = "1.0.0";

/// The complete development context persisted at `.garden/weather-context.json`
///
/// Every field has an empty default so that a structurally incomplete file is
/// reported by [`WeatherContext::validate`] instead of failing to parse.
/// Unknown top-level keys are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeatherContext {
    /// Set on every save
    pub updated: DateTime<Utc>,
    pub session_id: String,
    /// Garden root that owns this document
    pub garden_path: String,
    pub version: String,

    pub current_focus: FocusArea,
    pub recent_progress: ProgressSummary,
    pub next_steps: NextSteps,
    pub weather: WeatherConditions,
    pub git: GitContext,

    /// Onboarding data produced by the documentation scanner, kept verbatim
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub onboarding: serde_json::Value,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// What the developer is currently working on
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FocusArea {
    /// e.g. "authentication system"
    pub area: String,
    /// Confidence in the inference, 0-1
    pub confidence: f64,
    pub last_active: DateTime<Utc>,
    /// e.g. "recent commits to auth/ directory"
    pub inferred_from: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressSummary {
    pub summary: String,
    pub commits: Vec<GitCommit>,
    /// e.g. "last 2 hours"
    pub timespan: String,
    /// Activity level, 0-100
    pub momentum: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NextSteps {
    pub suggestions: Vec<String>,
    /// Urgency, 0-100
    pub priority: i32,
    pub based_on: String,
}

/// Current development "weather"
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeatherConditions {
    /// Activity level, 0-100
    pub temperature: i32,
    pub condition: WeatherCondition,
    /// Deadline/urgency pressure, 0-100
    pub pressure: i32,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeatherCondition {
    /// Smooth progress, no blockers
    #[default]
    Sunny,
    PartlyCloudy,
    Cloudy,
    /// Major blockers
    Stormy,
    /// Unclear direction or exploration phase
    Foggy,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitContext {
    pub current_branch: String,
    pub last_commit: GitCommit,
    pub uncommitted_changes: bool,
    pub recent_branches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitCommit {
    pub hash: String,
    pub message: String,
    pub smart_summary: String,
    pub timestamp: DateTime<Utc>,
    pub files_changed: Vec<String>,
    /// e.g. "frontend/auth"
    pub inferred_scope: String,
    pub author: String,
}

impl WeatherContext {
    /// Check the structural invariants of the document
    ///
    /// Returns a human-readable reason for the first violation found.
    /// Numeric ranges are inclusive.
    pub fn validate(&self) -> Result<(), String> {
        if self.version.trim().is_empty() {
            return Err("missing version field".to_string());
        }
        if self.session_id.trim().is_empty() {
            return Err("missing session ID".to_string());
        }
        if self.garden_path.trim().is_empty() {
            return Err("missing garden path".to_string());
        }
        if self.updated.timestamp() <= 0 {
            return Err("invalid update timestamp".to_string());
        }
        if !(0.0..=1.0).contains(&self.current_focus.confidence) {
            return Err(format!(
                "focus confidence must be between 0 and 1 (got {})",
                self.current_focus.confidence
            ));
        }
        if !(0..=100).contains(&self.weather.temperature) {
            return Err(format!(
                "temperature must be between 0 and 100 (got {})",
                self.weather.temperature
            ));
        }
        if !(0..=100).contains(&self.weather.pressure) {
            return Err(format!(
                "pressure must be between 0 and 100 (got {})",
                self.weather.pressure
            ));
        }
        Ok(())
    }
}
