//! Centralized error handling module
//!
//! One taxonomy for every failure the prediction pipeline can surface, plus
//! the user-facing message mapping the presentation layer relies on.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Generic message shown when no better text is available
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Message shown when the prediction service reports 503
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "The prediction service is currently unavailable. Please contact the administrator.";

/// Prediction pipeline error types
#[derive(Error, Debug)]
pub enum PredictionError {
    /// Input rejected before any network call was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not enough readings to build the model input
    #[error("Insufficient data: {required} readings required, {available} available")]
    InsufficientData { required: usize, available: usize },

    /// Transport-level failure (connect, timeout, TLS, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// The remote service answered 503
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Any other non-2xx answer
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 2xx answer whose body does not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl PredictionError {
    /// Stable classification used in logs and error reports
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Validation(_) => "VALIDATION_ERROR",
            PredictionError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            PredictionError::Network(_) => "NETWORK_ERROR",
            PredictionError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            PredictionError::Api { .. } => "API_ERROR",
            PredictionError::MalformedResponse(_) => "MALFORMED_RESPONSE",
        }
    }

    /// Message safe to show to the user
    pub fn user_message(&self) -> String {
        match self {
            PredictionError::Validation(msg) => msg.clone(),
            PredictionError::InsufficientData { required, .. } => format!(
                "Not enough examination history (at least {} readings required).",
                required
            ),
            PredictionError::ServiceUnavailable(_) => SERVICE_UNAVAILABLE_MESSAGE.to_string(),
            PredictionError::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            PredictionError::Api { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
            PredictionError::Network(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            PredictionError::MalformedResponse(msg) => {
                // Same wording as a network failure, but keep a trace for diagnosis
                error!(error = %msg, "Malformed response from remote service");
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }

    /// Whether the caller may offer the user a manual retry
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PredictionError::Validation(_) | PredictionError::InsufficientData { .. }
        )
    }

    /// Whether the error was raised locally, before reaching the network
    pub fn is_validation(&self) -> bool {
        !self.is_retryable()
    }
}

impl From<reqwest::Error> for PredictionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PredictionError::MalformedResponse(err.to_string())
        } else {
            PredictionError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PredictionError {
    fn from(err: serde_json::Error) -> Self {
        PredictionError::MalformedResponse(err.to_string())
    }
}

/// Standardized error report handed to the presentation layer
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    /// Unique correlation ID for tracing
    pub correlation_id: String,
    /// Error type classification
    pub error_type: String,
    /// Human-readable error message (safe for users)
    pub message: String,
    /// Whether a manual retry makes sense
    pub retryable: bool,
    /// Timestamp of the error
    pub timestamp: String,
}

impl ErrorReport {
    pub fn new(error: &PredictionError) -> Self {
        let report = Self {
            correlation_id: Uuid::new_v4().to_string(),
            error_type: error.kind().to_string(),
            message: error.user_message(),
            retryable: error.is_retryable(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        error!(
            correlation_id = %report.correlation_id,
            error_type = %report.error_type,
            detail = %error,
            "Error report generated"
        );

        report
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl From<&PredictionError> for ErrorReport {
    fn from(error: &PredictionError) -> Self {
        ErrorReport::new(error)
    }
}

/// Result type alias for pipeline errors
pub type AppResult<T> = Result<T, PredictionError>;
