//! Recent-readings selection for the trend model

use tracing::{debug, warn};

use crate::error::{AppResult, PredictionError};
use crate::models::{Reading, TrendInput, TREND_WINDOW};

/// The `count` most recent readings, oldest first.
///
/// Readings sharing a timestamp keep their input order: the sort is stable on
/// timestamp descending, so among equal timestamps the one appearing earlier in
/// `readings` counts as more recent. Fewer than `count` readings is an
/// insufficient-data failure; nothing is padded or duplicated.
pub fn select_recent(readings: &[Reading], count: usize) -> AppResult<Vec<Reading>> {
    if readings.len() < count {
        warn!(
            available = readings.len(),
            required = count,
            "Not enough readings for model input"
        );
        return Err(PredictionError::InsufficientData {
            required: count,
            available: readings.len(),
        });
    }

    let mut sorted: Vec<&Reading> = readings.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut recent: Vec<Reading> = sorted.into_iter().take(count).cloned().collect();
    recent.reverse();

    debug!(selected = recent.len(), "Selected recent readings");
    Ok(recent)
}

/// Glucose values of the three most recent readings, oldest first
pub fn select_trend_window(readings: &[Reading]) -> AppResult<TrendInput> {
    let recent = select_recent(readings, TREND_WINDOW)?;

    let mut glucose_readings = [0.0; TREND_WINDOW];
    for (slot, reading) in glucose_readings.iter_mut().zip(&recent) {
        *slot = reading.glucose_level;
    }

    Ok(TrendInput::new(glucose_readings))
}
