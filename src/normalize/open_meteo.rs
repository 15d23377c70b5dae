use crate::error::{AppError, Result};
use crate::model::{AirQualityReading, DailyOutlook, WeatherSnapshot};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current: CurrentWeather,
    #[serde(default)]
    daily: DailyArrays,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentWeather {
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    wind_gusts_10m: Option<f64>,
    precipitation: Option<f64>,
    // Sent as a number; kept as f64 so "95.0" style encodings still decode.
    weather_code: Option<f64>,
    cloud_cover: Option<f64>,
    visibility: Option<f64>,
}

/// Parallel arrays indexed by day, today first.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DailyArrays {
    sunrise: Vec<Option<String>>,
    sunset: Vec<Option<String>>,
    uv_index_max: Vec<Option<f64>>,
    precipitation_probability_max: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
    wind_speed_10m_max: Vec<Option<f64>>,
}

impl DailyArrays {
    fn day(&self, index: usize) -> DailyOutlook {
        fn at<T: Clone>(values: &[Option<T>], index: usize) -> Option<T> {
            values.get(index).cloned().flatten()
        }

        DailyOutlook {
            precip_probability_pct: at(&self.precipitation_probability_max, index),
            precip_sum_in: at(&self.precipitation_sum, index),
            wind_max_mph: at(&self.wind_speed_10m_max, index),
            uv_index_max: at(&self.uv_index_max, index),
            sunrise: at(&self.sunrise, index),
            sunset: at(&self.sunset, index),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    #[serde(default)]
    current: CurrentAirQuality,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentAirQuality {
    us_aqi: Option<f64>,
    pm2_5: Option<f64>,
    pm10: Option<f64>,
}

fn weather_code(raw: Option<f64>) -> Option<u16> {
    raw.filter(|c| c.is_finite() && *c >= 0.0 && *c <= u16::MAX as f64)
        .map(|c| c.round() as u16)
}

/// Current conditions plus today's and tomorrow's daily aggregates.
///
/// Units follow the request: mph, Fahrenheit and inches. Visibility stays
/// in meters.
pub fn parse_weather(body: &str) -> Result<WeatherSnapshot> {
    let response: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Parse(format!("Open-Meteo forecast: {}", e)))?;

    let current = response.current;
    Ok(WeatherSnapshot {
        wind_speed_mph: current.wind_speed_10m,
        wind_gust_mph: current.wind_gusts_10m,
        wind_direction_deg: current.wind_direction_10m,
        temperature_f: current.temperature_2m,
        apparent_temperature_f: current.apparent_temperature,
        precipitation_in: current.precipitation,
        weather_code: weather_code(current.weather_code),
        cloud_cover_pct: current.cloud_cover,
        visibility_m: current.visibility,
        today: response.daily.day(0),
        tomorrow: response.daily.day(1),
    })
}

pub fn parse_air_quality(body: &str) -> Result<AirQualityReading> {
    let response: AirQualityResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Parse(format!("Open-Meteo air quality: {}", e)))?;

    let current = response.current;
    Ok(AirQualityReading {
        us_aqi: current
            .us_aqi
            .filter(|v| v.is_finite() && *v >= 0.0)
            // Rounded up so an integer threshold test matches the raw value.
            .map(|v| v.ceil() as u32),
        pm2_5: current.pm2_5,
        pm10: current.pm10,
    })
}
