//! Input validation module
//!
//! Turns the risk form into a [`PredictionInput`], resolving HbA1c from the
//! estimator when requested. Everything here runs before the network layer.

use crate::error::{AppResult, PredictionError};
use crate::estimator::estimate_hba1c;
use crate::models::PredictionInput;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use validator::Validate;

/// Where the HbA1c value of a submission comes from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum HbA1cSource {
    /// Estimate from the current blood glucose
    Estimated,
    /// Value typed by the user; `None` when the field was left empty
    Manual(Option<f64>),
}

/// Raw risk form as filled in by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskForm {
    pub gender: u8,
    pub age: u32,
    pub hypertension: u8,
    pub heart_disease: u8,
    pub smoking_history: u8,
    pub weight: f64,
    pub height: f64,
    pub blood_glucose: f64,
    pub hba1c: HbA1cSource,
}

impl RiskForm {
    /// HbA1c the form would submit, or `None` when the submit must stay disabled
    pub fn resolved_hba1c(&self) -> Option<f64> {
        match self.hba1c {
            HbA1cSource::Estimated => estimate_hba1c(self.blood_glucose),
            HbA1cSource::Manual(value) => value.filter(|v| v.is_finite() && *v > 0.0),
        }
    }
}

/// Validate the risk form and build the model input
pub fn build_prediction_input(form: &RiskForm) -> AppResult<PredictionInput> {
    let hba1c_level = form.resolved_hba1c().ok_or_else(|| {
        let message = match form.hba1c {
            HbA1cSource::Estimated => {
                "HbA1c could not be estimated. Make sure the current blood glucose is filled in correctly."
            }
            HbA1cSource::Manual(_) => "An HbA1c value is required.",
        };
        warn!(source = ?form.hba1c, "HbA1c missing from risk form");
        PredictionError::Validation(message.to_string())
    })?;

    validate_blood_glucose(form.blood_glucose)?;

    let input = PredictionInput {
        gender: form.gender,
        age: form.age,
        hypertension: form.hypertension,
        heart_disease: form.heart_disease,
        smoking_history: form.smoking_history,
        weight: form.weight,
        height: form.height,
        hba1c_level,
        blood_glucose: form.blood_glucose,
    };

    validate_prediction_input(&input)?;

    debug!(hba1c_level, "Risk form validation passed");
    Ok(input)
}

/// Struct-level validation of a prediction input
pub fn validate_prediction_input(input: &PredictionInput) -> AppResult<()> {
    if let Err(validation_errors) = input.validate() {
        let mut error_messages: Vec<String> = validation_errors
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let msgs: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|c| c.as_ref()))
                    .collect();
                format!("{}: {}", field, msgs.join(", "))
            })
            .collect();
        error_messages.sort();

        warn!(errors = ?error_messages, "Prediction input validation failed");
        return Err(PredictionError::Validation(error_messages.join("; ")));
    }

    if !input.hba1c_level.is_finite() || input.hba1c_level <= 0.0 {
        return Err(PredictionError::Validation(
            "HbA1c must be a positive number".to_string(),
        ));
    }

    validate_blood_glucose(input.blood_glucose)
}

fn validate_blood_glucose(value: f64) -> AppResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PredictionError::Validation(
            "Blood glucose must be a positive number".to_string(),
        ));
    }

    Ok(())
}
