//! Data models for readings, prediction payloads and related structures
//!
//! Defines the wire types exchanged with the monitoring backend and the
//! prediction services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Label the risk model returns for a positive classification
pub const HIGH_RISK_LABEL: &str = "Risiko Tinggi";

/// Number of readings the trend model consumes
pub const TREND_WINDOW: usize = 3;

/// Number of points the trend model forecasts
pub const TREND_HORIZON: usize = 5;

/// One monitoring sample owned by the backend store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    /// Blood glucose (mg/dL)
    #[serde(deserialize_with = "wire::number")]
    pub glucose_level: f64,

    /// Heart rate (BPM)
    #[serde(deserialize_with = "wire::number")]
    pub heart_rate: f64,

    #[serde(deserialize_with = "wire::timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Current value pair from the live sensor endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSensorValues {
    #[serde(default, deserialize_with = "wire::number_or_zero")]
    pub glucose: f64,

    #[serde(default, deserialize_with = "wire::number_or_zero")]
    pub heart_rate: f64,
}

/// Educational FAQ entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub id: i64,
    #[serde(rename = "judul")]
    pub title: String,
    #[serde(rename = "deskripsi")]
    pub description: String,
}

/// Risk-model input, built fresh per submission
///
/// Categorical fields use the integer codes the model was trained on:
/// gender 1 = male / 0 = female, hypertension and heart disease 0/1,
/// smoking history 0 = never, 1 = former, 2 = current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PredictionInput {
    #[validate(range(max = 1, message = "Gender code must be 0 or 1"))]
    pub gender: u8,

    #[validate(range(min = 1, max = 120, message = "Age must be between 1 and 120"))]
    pub age: u32,

    #[validate(range(max = 1, message = "Hypertension code must be 0 or 1"))]
    pub hypertension: u8,

    #[validate(range(max = 1, message = "Heart disease code must be 0 or 1"))]
    pub heart_disease: u8,

    #[validate(range(max = 2, message = "Smoking history code must be 0, 1 or 2"))]
    pub smoking_history: u8,

    /// Body weight (kg)
    #[serde(rename = "berat")]
    #[validate(range(min = 1.0, max = 500.0, message = "Weight must be between 1 and 500 kg"))]
    pub weight: f64,

    /// Body height (cm), used server-side for BMI
    #[serde(rename = "tinggi")]
    #[validate(range(min = 30.0, max = 300.0, message = "Height must be between 30 and 300 cm"))]
    pub height: f64,

    /// Supplied by the user or estimated from `blood_glucose`
    pub hba1c_level: f64,

    /// Current blood glucose (mg/dL)
    pub blood_glucose: f64,
}

/// One explained feature in a risk prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub feature: String,
    pub value: serde_json::Value,
    pub status: String,
}

/// Risk classification returned by the remote model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub result: String,

    /// Risk probability in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,

    #[serde(default)]
    pub risk_factors: Vec<RiskFactor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PredictionResult {
    pub fn is_high_risk(&self) -> bool {
        self.result == HIGH_RISK_LABEL
    }
}

/// Trend-model input: the latest readings, oldest first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendInput {
    pub glucose_readings: [f64; TREND_WINDOW],
}

impl TrendInput {
    pub fn new(glucose_readings: [f64; TREND_WINDOW]) -> Self {
        Self { glucose_readings }
    }
}

/// Five-point glucose forecast returned by the remote model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub predictions: Vec<f64>,
    pub average_prediction: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TrendResult {
    /// Direction of the forecast, comparing last and first point
    pub fn direction(&self) -> TrendDirection {
        match (self.predictions.first(), self.predictions.last()) {
            (Some(first), Some(last)) if last > first => TrendDirection::Rising,
            (Some(first), Some(last)) if last < first => TrendDirection::Falling,
            _ => TrendDirection::Stable,
        }
    }
}

/// Overall movement of a glucose forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    /// Indonesian label used in recommendation prompts
    pub fn label(&self) -> &'static str {
        match self {
            TrendDirection::Rising => "meningkat",
            TrendDirection::Falling => "menurun",
            TrendDirection::Stable => "stabil",
        }
    }
}

/// Error body shape used by the backend (`{"error": ...}` or `{"message": ...}`)
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|m| !m.trim().is_empty())
    }
}

/// Lenient deserializers for values produced by the Flask backend
mod wire {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    /// Number, or a string holding a number (MySQL DECIMAL columns)
    pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid numeric value: {:?}", s))),
        }
    }

    /// Like [`number`] but anything unparsable (including null) becomes 0
    pub fn number_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<NumberOrText>::deserialize(deserializer).unwrap_or(None);
        Ok(match value {
            Some(NumberOrText::Number(n)) if n.is_finite() => n,
            Some(NumberOrText::Text(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .unwrap_or(0.0),
            _ => 0.0,
        })
    }

    /// RFC 3339, RFC 2822 (Flask's default) or a naive `YYYY-MM-DD HH:MM:SS` in UTC
    pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("unrecognised timestamp: {:?}", raw)))
    }

    pub(super) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}
