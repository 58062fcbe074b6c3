//! GlucoSense headless monitor
//!
//! Polls the live sensor feed and the monitoring history of the configured
//! session and logs every update until Ctrl-C.
//!
//! ⚠️ DISCLAIMER:
//! This program is NOT a medical diagnostic tool.

use anyhow::Context;
use tracing::{debug, info, warn};

use glucosense::config::Settings;
use glucosense::estimator::estimate_hba1c;
use glucosense::polling::PollingScope;
use glucosense::selector::select_trend_window;
use glucosense::{telemetry, ApiClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenv::dotenv().ok();

    // Logging
    telemetry::init().context("Failed to install tracing subscriber")?;

    // Load configuration
    let settings = Settings::from_env().context("Failed to load configuration")?;

    info!(base_url = %settings.api.base_url, "Starting GlucoSense monitor");
    if settings.session.token.is_none() {
        warn!("No SESSION_TOKEN configured, history requests will be rejected");
    }

    let api = ApiClient::new(&settings.api, settings.session.clone())
        .context("Failed to build API client")?;

    match api.fetch_view_snapshot().await {
        Ok(snapshot) => info!(
            readings = snapshot.readings.len(),
            faqs = snapshot.faqs.len(),
            "Initial data loaded"
        ),
        Err(e) => warn!(error_type = e.kind(), message = %e.user_message(), "Initial data unavailable"),
    }

    // ---------------------------------------------------------------------
    // Polling feeds, owned by one scope and torn down together
    // ---------------------------------------------------------------------
    let mut scope = PollingScope::new("monitor");

    let sensor_api = api.clone();
    let mut live = scope.start(
        "sensors/latest",
        settings.polling.sensor_interval(),
        move || {
            let api = sensor_api.clone();
            async move { api.fetch_latest_sensor().await }
        },
    );

    let history_api = api.clone();
    let mut history = scope.start(
        "monitoring/me",
        settings.polling.history_interval(),
        move || {
            let api = history_api.clone();
            async move { api.fetch_readings().await }
        },
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            changed = live.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = live.borrow_and_update().clone();
                if let Some(values) = state.data {
                    info!(
                        glucose = values.glucose,
                        heart_rate = values.heart_rate,
                        estimated_hba1c = ?estimate_hba1c(values.glucose),
                        "Live sensor update"
                    );
                }
            }
            changed = history.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = history.borrow_and_update().clone();
                if let Some(readings) = state.data {
                    match select_trend_window(&readings) {
                        Ok(window) => info!(
                            readings = readings.len(),
                            latest_glucose = ?window.glucose_readings,
                            "Monitoring history update"
                        ),
                        Err(e) => debug!(readings = readings.len(), reason = %e, "History too short for trend input"),
                    }
                }
            }
        }
    }

    scope.teardown();
    info!("GlucoSense monitor stopped");
    Ok(())
}
