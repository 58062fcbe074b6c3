//! Prediction request pipeline
//!
//! Input preparation (reading selection, HbA1c resolution, validation) runs
//! locally; only a fully valid input reaches the [`PredictionService`].
//! Results are handed back exactly as the service produced them.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::client::PredictionService;
use crate::error::AppResult;
use crate::models::{PredictionResult, Reading, TrendResult};
use crate::selector::select_trend_window;
use crate::validation::{build_prediction_input, RiskForm};

pub struct PredictionPipeline<S: ?Sized> {
    service: Arc<S>,
}

impl<S: ?Sized> Clone for PredictionPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S> PredictionPipeline<S>
where
    S: PredictionService + ?Sized,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Forecast from the three most recent readings.
    ///
    /// Fails with insufficient data before any request when fewer than three
    /// readings are available.
    #[instrument(skip_all, fields(readings = readings.len()))]
    pub async fn run_trend(&self, readings: &[Reading]) -> AppResult<TrendResult> {
        let input = select_trend_window(readings)?;
        info!(glucose_readings = ?input.glucose_readings, "Requesting trend prediction");

        self.service.predict_trend(&input).await
    }

    /// Risk classification for a filled-in form.
    ///
    /// A missing or unestimable HbA1c blocks the request.
    #[instrument(skip_all)]
    pub async fn run_risk(&self, form: &RiskForm) -> AppResult<PredictionResult> {
        let input = build_prediction_input(form)?;
        info!(hba1c_level = input.hba1c_level, "Requesting risk prediction");

        self.service.predict_risk(&input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictionError;
    use crate::models::{PredictionInput, TrendInput};
    use crate::validation::HbA1cSource;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Mutex;

    /// Records every request and answers with canned results
    #[derive(Default)]
    struct RecordingService {
        trend_inputs: Mutex<Vec<TrendInput>>,
        risk_inputs: Mutex<Vec<PredictionInput>>,
        unavailable: bool,
    }

    #[async_trait]
    impl PredictionService for RecordingService {
        async fn predict_risk(&self, input: &PredictionInput) -> AppResult<PredictionResult> {
            self.risk_inputs.lock().unwrap().push(input.clone());
            if self.unavailable {
                return Err(PredictionError::ServiceUnavailable("model not loaded".into()));
            }
            Ok(PredictionResult {
                result: "Risiko Rendah".to_string(),
                probability: Some(12.5),
                risk_factors: vec![],
                prediction_code: Some(0),
                message: None,
            })
        }

        async fn predict_trend(&self, input: &TrendInput) -> AppResult<TrendResult> {
            self.trend_inputs.lock().unwrap().push(*input);
            Ok(TrendResult {
                predictions: vec![108.0, 112.0, 115.0, 118.0, 120.0],
                average_prediction: 114.6,
                message: None,
            })
        }
    }

    fn reading(id: i64, glucose: f64, minutes: i64) -> Reading {
        Reading {
            id,
            user_id: Some(1),
            glucose_level: glucose,
            heart_rate: 70.0,
            timestamp: Utc.with_ymd_and_hms(2025, 10, 1, 7, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    fn risk_form(hba1c: HbA1cSource, blood_glucose: f64) -> RiskForm {
        RiskForm {
            gender: 1,
            age: 50,
            hypertension: 0,
            heart_disease: 0,
            smoking_history: 2,
            weight: 80.0,
            height: 175.0,
            blood_glucose,
            hba1c,
        }
    }

    #[tokio::test]
    async fn test_trend_end_to_end_passthrough() {
        let service = Arc::new(RecordingService::default());
        let pipeline = PredictionPipeline::new(Arc::clone(&service));

        // Deliberately unordered
        let readings = vec![
            reading(3, 105.0, 60),
            reading(1, 100.0, 0),
            reading(2, 110.0, 30),
        ];

        let result = pipeline.run_trend(&readings).await.unwrap();

        assert_eq!(
            service.trend_inputs.lock().unwrap().as_slice(),
            &[TrendInput::new([100.0, 110.0, 105.0])]
        );
        assert_eq!(
            result,
            TrendResult {
                predictions: vec![108.0, 112.0, 115.0, 118.0, 120.0],
                average_prediction: 114.6,
                message: None,
            }
        );
    }

    #[tokio::test]
    async fn test_trend_insufficient_data_skips_network() {
        let service = Arc::new(RecordingService::default());
        let pipeline = PredictionPipeline::new(Arc::clone(&service));

        let err = pipeline
            .run_trend(&[reading(1, 100.0, 0), reading(2, 101.0, 5)])
            .await
            .unwrap_err();

        assert!(matches!(err, PredictionError::InsufficientData { .. }));
        assert!(service.trend_inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_risk_uses_estimated_hba1c() {
        let service = Arc::new(RecordingService::default());
        let pipeline = PredictionPipeline::new(Arc::clone(&service));

        let result = pipeline
            .run_risk(&risk_form(HbA1cSource::Estimated, 140.0))
            .await
            .unwrap();

        assert!(!result.is_high_risk());
        let sent = service.risk_inputs.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].hba1c_level, 6.5);
    }

    #[tokio::test]
    async fn test_risk_validation_skips_network() {
        let service = Arc::new(RecordingService::default());
        let pipeline = PredictionPipeline::new(Arc::clone(&service));

        let err = pipeline
            .run_risk(&risk_form(HbA1cSource::Estimated, 0.0))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(service.risk_inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_service_errors_propagate_unchanged() {
        let service = Arc::new(RecordingService {
            unavailable: true,
            ..Default::default()
        });
        let pipeline: PredictionPipeline<dyn PredictionService> = PredictionPipeline::new(service);

        let err = pipeline
            .run_risk(&risk_form(HbA1cSource::Manual(Some(7.0)), 150.0))
            .await
            .unwrap_err();

        assert!(matches!(err, PredictionError::ServiceUnavailable(_)));
    }
}
