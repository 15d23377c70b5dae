use super::NormalizeStats;
use crate::config::WaterwayConfig;
use crate::error::{AppError, Result};
use crate::model::{
    GaugeReading, UpstreamReading, PARAM_DISCHARGE, PARAM_STAGE, PARAM_WATER_TEMP, USGS_NO_DATA,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Points considered for the upstream trend (five-minute data, about an hour).
const TREND_WINDOW: usize = 12;

/// NWIS instantaneous values: one `timeSeries` entry per site and parameter,
/// points in chronological order.
#[derive(Debug, Deserialize)]
struct IvResponse {
    value: IvValue,
}

#[derive(Debug, Deserialize)]
struct IvValue {
    #[serde(rename = "timeSeries", default)]
    time_series: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TimeSeries {
    #[serde(rename = "sourceInfo")]
    source_info: SourceInfo,
    variable: Variable,
    values: Vec<ValueSet>,
}

#[derive(Debug, Deserialize)]
struct SourceInfo {
    #[serde(rename = "siteName", default)]
    site_name: String,
    #[serde(rename = "siteCode")]
    site_code: Vec<CodeValue>,
}

#[derive(Debug, Deserialize)]
struct Variable {
    #[serde(rename = "variableCode")]
    variable_code: Vec<CodeValue>,
}

#[derive(Debug, Deserialize)]
struct CodeValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ValueSet {
    #[serde(default)]
    value: Vec<IvPoint>,
}

#[derive(Debug, Deserialize)]
struct IvPoint {
    value: String,
    #[serde(rename = "dateTime")]
    date_time: String,
}

/// One successfully decoded series.
struct Series {
    site_code: String,
    site_name: String,
    parameter: String,
    points: Vec<IvPoint>,
}

fn decode_series(raw: serde_json::Value) -> Result<Series> {
    let ts: TimeSeries = serde_json::from_value(raw)
        .map_err(|e| AppError::MalformedRecord(format!("time series: {}", e)))?;

    let site_code = ts
        .source_info
        .site_code
        .into_iter()
        .next()
        .map(|c| c.value)
        .ok_or_else(|| AppError::MalformedRecord("series without siteCode".to_string()))?;

    let parameter = ts
        .variable
        .variable_code
        .into_iter()
        .next()
        .map(|c| c.value)
        .ok_or_else(|| AppError::MalformedRecord("series without variableCode".to_string()))?;

    let points = ts
        .values
        .into_iter()
        .next()
        .map(|set| set.value)
        .unwrap_or_default();

    Ok(Series {
        site_code,
        site_name: ts.source_info.site_name,
        parameter,
        points,
    })
}

fn parse_response(body: &str) -> Result<Vec<serde_json::Value>> {
    let response: IvResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Parse(format!("USGS IV response: {}", e)))?;
    Ok(response.value.time_series)
}

fn parse_value(point: &IvPoint) -> Result<Option<f64>> {
    let raw = point.value.trim();
    if raw == USGS_NO_DATA {
        return Ok(None);
    }
    let value = raw
        .parse::<f64>()
        .map_err(|e| AppError::MalformedRecord(format!("value '{}': {}", point.value, e)))?;
    // f64 parsing accepts "NaN" and "inf"; neither is a measurement.
    if !value.is_finite() {
        return Err(AppError::MalformedRecord(format!(
            "value '{}' is not finite",
            point.value
        )));
    }
    Ok(Some(value))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::MalformedRecord(format!("dateTime '{}': {}", raw, e)))
}

/// Latest reading per configured waterway.
///
/// Series for sites not in `waterways`, and parameters other than flow,
/// stage and water temperature, are ignored. Waterways with no usable series
/// are simply absent from the returned map.
pub fn parse_current(
    body: &str,
    waterways: &[WaterwayConfig],
) -> Result<(BTreeMap<String, GaugeReading>, NormalizeStats)> {
    let mut readings: BTreeMap<String, GaugeReading> = BTreeMap::new();
    let mut stats = NormalizeStats::new();

    for (index, raw) in parse_response(body)?.into_iter().enumerate() {
        let series = match decode_series(raw) {
            Ok(series) => series,
            Err(e) => {
                stats.record_malformed("USGS", index, &e.to_string());
                continue;
            }
        };

        let Some(waterway) = waterways.iter().find(|w| w.site_id == series.site_code) else {
            continue;
        };

        let Some(latest) = series.points.last() else {
            stats.record_no_data();
            continue;
        };

        let value = match parse_value(latest) {
            Ok(Some(value)) => value,
            Ok(None) => {
                stats.record_no_data();
                continue;
            }
            Err(e) => {
                stats.record_malformed("USGS", index, &e.to_string());
                continue;
            }
        };

        let observed_at = match parse_timestamp(&latest.date_time) {
            Ok(ts) => ts,
            Err(e) => {
                stats.record_malformed("USGS", index, &e.to_string());
                continue;
            }
        };

        let reading = readings.entry(waterway.id.clone()).or_default();
        match series.parameter.as_str() {
            PARAM_DISCHARGE => reading.flow_cfs = Some(value),
            PARAM_STAGE => reading.stage_ft = Some(value),
            PARAM_WATER_TEMP => reading.water_temp_c = Some(value),
            _ => continue,
        }
        reading.observed_at = Some(match reading.observed_at {
            Some(existing) if existing > observed_at => existing,
            _ => observed_at,
        });
        stats.record_ok();
    }

    Ok((readings, stats))
}

/// Upstream gauge readings keyed by the downstream waterway's id.
///
/// The trend is the stage change across the last `TREND_WINDOW` valid
/// points and needs at least two of them.
pub fn parse_upstream(
    body: &str,
    waterways: &[WaterwayConfig],
) -> Result<(BTreeMap<String, UpstreamReading>, NormalizeStats)> {
    let mut readings: BTreeMap<String, UpstreamReading> = BTreeMap::new();
    let mut stats = NormalizeStats::new();

    for (index, raw) in parse_response(body)?.into_iter().enumerate() {
        let series = match decode_series(raw) {
            Ok(series) => series,
            Err(e) => {
                stats.record_malformed("USGS upstream", index, &e.to_string());
                continue;
            }
        };

        let Some((waterway, upstream)) = waterways.iter().find_map(|w| {
            w.upstream
                .as_ref()
                .filter(|u| u.site_id == series.site_code)
                .map(|u| (w, u))
        }) else {
            continue;
        };

        // Invalid points inside a series are dropped individually.
        let values: Vec<f64> = series
            .points
            .iter()
            .filter_map(|p| parse_value(p).ok().flatten())
            .collect();

        let Some(&latest) = values.last() else {
            stats.record_no_data();
            continue;
        };

        let reading = readings
            .entry(waterway.id.clone())
            .or_insert_with(|| UpstreamReading {
                site_id: upstream.site_id.clone(),
                site_name: if series.site_name.is_empty() {
                    upstream.name.clone()
                } else {
                    series.site_name.clone()
                },
                ..Default::default()
            });

        match series.parameter.as_str() {
            PARAM_DISCHARGE => reading.flow_cfs = Some(latest),
            PARAM_STAGE => {
                reading.stage_ft = Some(latest);
                let recent = &values[values.len().saturating_sub(TREND_WINDOW)..];
                if recent.len() >= 2 {
                    reading.trend_ft = Some(recent[recent.len() - 1] - recent[0]);
                }
            }
            _ => continue,
        }
        stats.record_ok();
    }

    Ok((readings, stats))
}

/// Primary gauge site codes, in waterway order. Config validation keeps
/// them distinct.
pub fn primary_site_codes(waterways: &[WaterwayConfig]) -> Vec<&str> {
    waterways.iter().map(|w| w.site_id.as_str()).collect()
}

pub fn upstream_site_codes(waterways: &[WaterwayConfig]) -> Vec<&str> {
    waterways
        .iter()
        .filter_map(|w| w.upstream.as_ref().map(|u| u.site_id.as_str()))
        .collect()
}
