use crate::model::DailyOutlook;
use crate::stage::ColorToken;

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass direction for a bearing in degrees.
pub fn wind_compass(degrees: f64) -> &'static str {
    let index = (degrees.rem_euclid(360.0) / 22.5).round() as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[index]
}

pub fn aqi_category(aqi: Option<u32>) -> (String, ColorToken) {
    match aqi {
        None => ("—".to_string(), ColorToken::Muted),
        Some(v) if v <= 50 => (format!("GOOD ({})", v), ColorToken::Good),
        Some(v) if v <= 100 => (format!("MODERATE ({})", v), ColorToken::Elevated),
        Some(v) if v <= 150 => (format!("UNHEALTHY SENSITIVE ({})", v), ColorToken::Warning),
        Some(v) if v <= 200 => (format!("UNHEALTHY ({})", v), ColorToken::Danger),
        Some(v) => (format!("VERY UNHEALTHY ({})", v), ColorToken::Danger),
    }
}

pub fn uv_category(uv_index: Option<f64>) -> Option<&'static str> {
    let uv = uv_index?;
    Some(if uv <= 2.0 {
        "LOW"
    } else if uv <= 5.0 {
        "MODERATE"
    } else if uv <= 7.0 {
        "HIGH"
    } else {
        "VERY HIGH"
    })
}

/// Short description of a WMO weather interpretation code.
pub fn weather_description(code: u16) -> Option<&'static str> {
    let text = match code {
        0 => "Clear",
        1 => "Mainly Clear",
        2 => "Partly Cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Freezing Fog",
        51 => "Light Drizzle",
        53 => "Drizzle",
        55 => "Heavy Drizzle",
        61 => "Light Rain",
        63 => "Rain",
        65 => "Heavy Rain",
        71 => "Light Snow",
        73 => "Snow",
        75 => "Heavy Snow",
        77 => "Snow Grains",
        80 => "Light Showers",
        81 => "Showers",
        82 => "Heavy Showers",
        85 => "Light Snow Showers",
        86 => "Snow Showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm+Hail",
        99 => "Heavy T-Storm+Hail",
        _ => return None,
    };
    Some(text)
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// USGS reports water temperature in Celsius; it is shown in Fahrenheit.
pub fn water_temperature_label(water_temp_c: Option<f64>) -> String {
    match water_temp_c {
        Some(celsius) => format!("{:.0}°F", celsius_to_fahrenheit(celsius)),
        None => "—".to_string(),
    }
}

/// One-line daily outlook: rain chance and total, peak wind, UV.
pub fn outlook_summary(day: &DailyOutlook) -> String {
    let rain = match (day.precip_probability_pct, day.precip_sum_in) {
        (Some(pct), Some(sum)) => format!("rain {:.0}% / {:.2} in", pct, sum),
        (Some(pct), None) => format!("rain {:.0}%", pct),
        (None, Some(sum)) => format!("rain {:.2} in", sum),
        (None, None) => "rain —".to_string(),
    };
    let wind = day
        .wind_max_mph
        .map(|w| format!("wind to {:.0} mph", w))
        .unwrap_or_else(|| "wind —".to_string());
    let uv = match (day.uv_index_max, uv_category(day.uv_index_max)) {
        (Some(index), Some(category)) => format!("UV {} ({:.1})", category, index),
        _ => "UV —".to_string(),
    };
    format!("{}, {}, {}", rain, wind, uv)
}
