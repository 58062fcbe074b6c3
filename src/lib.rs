//! GlucoSense client core
//!
//! Data-fetching side of the GlucoSense patient-monitoring app: HbA1c
//! estimation, selection of recent readings, requests to the risk and trend
//! prediction services, generated recommendations, and interval polling of
//! the live monitoring feeds.
//!
//! ⚠️ DISCLAIMER:
//! Predictions and recommendations are NOT a medical diagnosis.

pub mod client;
pub mod config;
pub mod error;
pub mod estimator;
pub mod models;
pub mod pipeline;
pub mod polling;
pub mod recommendation;
pub mod selector;
pub mod telemetry;
pub mod validation;

pub use crate::client::{ApiClient, PredictionService, ViewSnapshot};
pub use crate::config::{SessionContext, Settings};
pub use crate::error::{AppResult, ErrorReport, PredictionError};
pub use crate::estimator::estimate_hba1c;
pub use crate::models::{
    PredictionInput, PredictionResult, Reading, TrendDirection, TrendInput, TrendResult,
};
pub use crate::pipeline::PredictionPipeline;
pub use crate::polling::{FeedState, PollingScope, PollingSession};
pub use crate::recommendation::{parse_recommendation, RecommendationClient, RecommendationSections};
pub use crate::selector::{select_recent, select_trend_window};
pub use crate::validation::{HbA1cSource, RiskForm};
