use super::NormalizeStats;
use crate::error::{AppError, Result};
use crate::model::{ForecastPoint, RiverForecast};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// NWPS marks missing forecast values with large negative numbers.
const NWPS_MISSING_BELOW: f64 = -999.0;

#[derive(Debug, Deserialize)]
struct StageFlowResponse {
    #[serde(default)]
    forecast: Option<ForecastSeries>,
}

#[derive(Debug, Deserialize)]
struct ForecastSeries {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ForecastDatum {
    #[serde(rename = "validTime")]
    valid_time: String,
    primary: Option<f64>,
}

/// Predicted stage series, sorted by valid time.
///
/// A response without any forecast data is `InvalidData`: the gauge exists
/// but there is nothing to show.
pub fn parse_forecast(body: &str) -> Result<(RiverForecast, NormalizeStats)> {
    let response: StageFlowResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Parse(format!("NWPS stageflow: {}", e)))?;

    let data = response.forecast.map(|f| f.data).unwrap_or_default();
    if data.is_empty() {
        return Err(AppError::InvalidData("No forecast data".to_string()));
    }

    let mut points = Vec::with_capacity(data.len());
    let mut stats = NormalizeStats::new();

    for (index, raw) in data.into_iter().enumerate() {
        let datum: ForecastDatum = match serde_json::from_value(raw) {
            Ok(datum) => datum,
            Err(e) => {
                stats.record_malformed("NWPS forecast", index, &e.to_string());
                continue;
            }
        };

        let Some(stage_ft) = datum.primary.filter(|v| v.is_finite() && *v > NWPS_MISSING_BELOW)
        else {
            stats.record_no_data();
            continue;
        };

        let valid_time = match DateTime::parse_from_rfc3339(&datum.valid_time) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                stats.record_malformed(
                    "NWPS forecast",
                    index,
                    &format!("validTime '{}': {}", datum.valid_time, e),
                );
                continue;
            }
        };

        points.push(ForecastPoint {
            valid_time,
            stage_ft,
        });
        stats.record_ok();
    }

    points.sort_by_key(|p| p.valid_time);

    Ok((RiverForecast { points }, stats))
}
