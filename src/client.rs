//! REST client for the monitoring backend and the prediction services
//!
//! All calls carry the injected session token and a fresh correlation ID.
//! Failures are folded into [`PredictionError`]; nothing is retried here.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ApiSettings, SessionContext};
use crate::error::{AppResult, PredictionError};
use crate::models::{
    ApiErrorBody, Faq, LiveSensorValues, PredictionInput, PredictionResult, Reading, TrendInput,
    TrendResult, TREND_HORIZON,
};

/// Header used to correlate client and server logs
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// Backend paths, relative to the configured base URL
pub mod paths {
    pub const MY_READINGS: &str = "/monitoring/me";
    pub const LATEST_SENSOR: &str = "/sensors/latest";
    pub const RISK_PREDICTION: &str = "/ml/predict";
    pub const TREND_PREDICTION: &str = "/predict/glucose-trend";
    pub const FAQ: &str = "/faq";
}

/// Remote prediction models
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Diabetes risk classification
    async fn predict_risk(&self, input: &PredictionInput) -> AppResult<PredictionResult>;

    /// Five-point glucose forecast from the three latest readings
    async fn predict_trend(&self, input: &TrendInput) -> AppResult<TrendResult>;
}

/// Data a patient view loads once when it opens
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub readings: Vec<Reading>,
    pub faqs: Vec<Faq>,
}

/// HTTP client bound to one backend and one session
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings, session: SessionContext) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        info!(base_url = %settings.base_url, "API client initialised");

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Readings of the logged-in user, in no particular order
    pub async fn fetch_readings(&self) -> AppResult<Vec<Reading>> {
        self.execute(Method::GET, paths::MY_READINGS, |req| req).await
    }

    /// Current live glucose / heart-rate pair
    pub async fn fetch_latest_sensor(&self) -> AppResult<LiveSensorValues> {
        self.execute(Method::GET, paths::LATEST_SENSOR, |req| req).await
    }

    /// Educational FAQ entries
    pub async fn fetch_faqs(&self) -> AppResult<Vec<Faq>> {
        self.execute(Method::GET, paths::FAQ, |req| req).await
    }

    /// Readings and FAQ entries fetched together on view entry
    pub async fn fetch_view_snapshot(&self) -> AppResult<ViewSnapshot> {
        let (readings, faqs) =
            futures::future::try_join(self.fetch_readings(), self.fetch_faqs()).await?;

        debug!(
            readings = readings.len(),
            faqs = faqs.len(),
            "View snapshot loaded"
        );
        Ok(ViewSnapshot { readings, faqs })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T, F>(&self, method: Method, path: &str, build: F) -> AppResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let correlation_id = Uuid::new_v4().to_string();

        let mut request = self
            .http
            .request(method.clone(), self.url(path))
            .header(CORRELATION_HEADER, &correlation_id);
        if let Some(token) = &self.session.token {
            request = request.bearer_auth(token);
        }

        debug!(
            correlation_id = %correlation_id,
            method = %method,
            path = path,
            "Sending request"
        );

        let response = build(request).send().await.map_err(|e| {
            warn!(
                correlation_id = %correlation_id,
                path = path,
                error = %e,
                "Request failed before a response arrived"
            );
            PredictionError::Network(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        if !status.is_success() {
            let error = status_error(status, &body);
            warn!(
                correlation_id = %correlation_id,
                path = path,
                status = status.as_u16(),
                error_type = error.kind(),
                "Request rejected"
            );
            return Err(error);
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(
                correlation_id = %correlation_id,
                path = path,
                error = %e,
                "Malformed response body"
            );
            PredictionError::MalformedResponse(format!("{}: {}", path, e))
        })
    }
}

/// Map a non-2xx answer, preferring the server's own message
fn status_error(status: StatusCode, body: &str) -> PredictionError {
    let server_message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(ApiErrorBody::into_message);

    if status == StatusCode::SERVICE_UNAVAILABLE {
        return PredictionError::ServiceUnavailable(
            server_message.unwrap_or_else(|| "prediction service unavailable".to_string()),
        );
    }

    PredictionError::Api {
        status: status.as_u16(),
        message: server_message.unwrap_or_default(),
    }
}

fn check_trend_shape(result: &TrendResult) -> AppResult<()> {
    if result.predictions.len() != TREND_HORIZON {
        return Err(PredictionError::MalformedResponse(format!(
            "expected {} trend predictions, got {}",
            TREND_HORIZON,
            result.predictions.len()
        )));
    }

    if !result
        .predictions
        .iter()
        .chain(std::iter::once(&result.average_prediction))
        .all(|v| v.is_finite())
    {
        return Err(PredictionError::MalformedResponse(
            "trend predictions contain non-finite values".to_string(),
        ));
    }

    Ok(())
}

#[async_trait]
impl PredictionService for ApiClient {
    async fn predict_risk(&self, input: &PredictionInput) -> AppResult<PredictionResult> {
        let result: PredictionResult = self
            .execute(Method::POST, paths::RISK_PREDICTION, |req| req.json(input))
            .await?;

        info!(
            result = %result.result,
            high_risk = result.is_high_risk(),
            "Risk prediction received"
        );
        Ok(result)
    }

    async fn predict_trend(&self, input: &TrendInput) -> AppResult<TrendResult> {
        let result: TrendResult = self
            .execute(Method::POST, paths::TREND_PREDICTION, |req| req.json(input))
            .await?;

        if let Err(e) = check_trend_shape(&result) {
            error!(error = %e, "Trend prediction has an unexpected shape");
            return Err(e);
        }

        info!(
            average_prediction = result.average_prediction,
            "Trend prediction received"
        );
        Ok(result)
    }
}
