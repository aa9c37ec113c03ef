use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::AnalysisId;

/// Response of the analyze endpoint: where the image was stored and what the
/// service found in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image_url: String,
    pub analysis: DamageAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageAnalysis {
    pub is_vehicle: bool,
    pub damage_detected: bool,
    /// Overall confidence, 0 to 100.
    pub confidence_score: f64,
    /// May be empty even when `damage_detected` is set.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub damage_details: Vec<DamageFinding>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub damage_related_text: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub all_labels: Vec<DetectedLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageFinding {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLabel {
    pub name: String,
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parents: Vec<String>,
}

/// One row of the analysis history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub analysis_id: AnalysisId,
    pub image_url: String,
    /// ISO-8601 as sent by the service; see [`AnalysisSummary::recorded_at`].
    pub timestamp: String,
    pub damage_detected: bool,
    pub confidence_score: f64,
}

impl AnalysisSummary {
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        parse_service_timestamp(&self.timestamp)
    }
}

/// Full record for a single stored analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetail {
    #[serde(flatten)]
    pub summary: AnalysisSummary,
    #[serde(default)]
    pub analysis_results: Option<AnalysisResults>,
}

impl AnalysisDetail {
    pub fn analysis_id(&self) -> &AnalysisId {
        &self.summary.analysis_id
    }

    /// Itemized findings. Missing, null and empty are all reported as empty.
    pub fn damage_details(&self) -> &[DamageFinding] {
        self.analysis_results
            .as_ref()
            .and_then(|results| results.damage_details.as_deref())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    #[serde(default)]
    pub damage_details: Option<Vec<DamageFinding>>,
    /// Everything else the service stored alongside the findings.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses RFC 3339 timestamps, falling back to naive ISO-8601 which is read as UTC.
pub fn parse_service_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
