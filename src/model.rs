use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// USGS parameter codes
// ---------------------------------------------------------------------------

/// Discharge (streamflow), cubic feet per second.
pub const PARAM_DISCHARGE: &str = "00060";

/// Gage height (stage), feet.
pub const PARAM_STAGE: &str = "00065";

/// Water temperature, degrees Celsius.
pub const PARAM_WATER_TEMP: &str = "00010";

/// Value USGS substitutes for a missing measurement.
pub const USGS_NO_DATA: &str = "-999999";

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// The independent external feeds polled each refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    UsgsCurrent,
    UsgsUpstream,
    Weather,
    AirQuality,
    NwsAlerts,
    NwpsForecast,
    AlcosanSoak,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::UsgsCurrent,
        Provider::UsgsUpstream,
        Provider::Weather,
        Provider::AirQuality,
        Provider::NwsAlerts,
        Provider::NwpsForecast,
        Provider::AlcosanSoak,
    ];
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::UsgsCurrent => "USGS",
            Provider::UsgsUpstream => "USGS-upstream",
            Provider::Weather => "Open-Meteo",
            Provider::AirQuality => "Open-Meteo-AQ",
            Provider::NwsAlerts => "NWS",
            Provider::NwpsForecast => "NWPS",
            Provider::AlcosanSoak => "ALCOSAN",
        };
        write!(f, "{}", name)
    }
}

/// How a provider's data reached the current cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderStatus {
    /// Fetched during this cycle.
    Fresh,
    /// Served from cache, fetched `age_minutes` ago.
    Cached { age_minutes: i64 },
    /// Not needed this cycle (e.g. overflow status outside its season).
    Skipped,
    /// Fetch failed or timed out; the provider's fields are absent.
    Unavailable(String),
}

impl ProviderStatus {
    pub fn is_available(&self) -> bool {
        !matches!(self, ProviderStatus::Unavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReport {
    pub provider: Provider,
    pub status: ProviderStatus,
}

// ---------------------------------------------------------------------------
// Gauge readings
// ---------------------------------------------------------------------------

/// Latest values reported by a waterway's primary gauge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaugeReading {
    pub flow_cfs: Option<f64>,
    pub stage_ft: Option<f64>,
    pub water_temp_c: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// Headwater gauge used as an early warning for a downstream waterway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamReading {
    pub site_id: String,
    pub site_name: String,
    pub flow_cfs: Option<f64>,
    pub stage_ft: Option<f64>,
    /// Change in stage over roughly the last hour, feet.
    pub trend_ft: Option<f64>,
}

// ---------------------------------------------------------------------------
// Weather and air quality
// ---------------------------------------------------------------------------

const METERS_PER_MILE: f64 = 1609.34;

/// One day of Open-Meteo daily aggregates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyOutlook {
    pub precip_probability_pct: Option<f64>,
    pub precip_sum_in: Option<f64>,
    pub wind_max_mph: Option<f64>,
    pub uv_index_max: Option<f64>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherSnapshot {
    pub wind_speed_mph: Option<f64>,
    pub wind_gust_mph: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub temperature_f: Option<f64>,
    pub apparent_temperature_f: Option<f64>,
    pub precipitation_in: Option<f64>,
    /// WMO weather interpretation code.
    pub weather_code: Option<u16>,
    pub cloud_cover_pct: Option<f64>,
    pub visibility_m: Option<f64>,
    pub today: DailyOutlook,
    pub tomorrow: DailyOutlook,
}

impl WeatherSnapshot {
    /// Visibility in statute miles, rounded to one decimal place the way the
    /// dashboard displays it.
    pub fn visibility_mi(&self) -> Option<f64> {
        self.visibility_m
            .map(|m| (m / METERS_PER_MILE * 10.0).round() / 10.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirQualityReading {
    pub us_aqi: Option<u32>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Closed classification of an NWS alert, assigned by the normalizer from
/// configurable keyword sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCategory {
    Flood,
    Storm,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub category: AlertCategory,
    pub event: String,
    pub headline: String,
    pub severity: String,
    pub expires: Option<DateTime<Utc>>,
}

impl AlertEvent {
    /// An alert without an expiry stays active until the feed drops it.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|expires| expires > now).unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// Forecasts and overflow status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub valid_time: DateTime<Utc>,
    pub stage_ft: f64,
}

/// NWPS predicted stage series, ordered by valid time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiverForecast {
    pub points: Vec<ForecastPoint>,
}

impl RiverForecast {
    /// Highest predicted stage; the earliest point wins a tie.
    pub fn peak(&self) -> Option<&ForecastPoint> {
        self.points.iter().fold(None, |best, p| match best {
            Some(b) if b.stage_ft >= p.stage_ft => Some(b),
            _ => Some(p),
        })
    }
}

/// Authoritative combined-sewer-overflow status published by ALCOSAN during
/// its April through October monitoring season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoakStatus {
    Inactive,
    NoOverflow,
    OverflowActive,
    Unclear,
    Unavailable,
}

impl fmt::Display for SoakStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SoakStatus::Inactive => "INACTIVE",
            SoakStatus::NoOverflow => "NO OVERFLOW",
            SoakStatus::OverflowActive => "OVERFLOW ACTIVE",
            SoakStatus::Unclear => "CHECK SITE",
            SoakStatus::Unavailable => "UNAVAILABLE",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Engine input
// ---------------------------------------------------------------------------

/// Everything the scoring engine looks at for one cycle. Built once after
/// fan-in and never mutated afterwards. `None` means not reported, never
/// zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionsSnapshot {
    pub as_of: DateTime<Utc>,
    /// Primary gauge readings keyed by waterway id. A waterway missing from
    /// the map is treated exactly like one whose fields are all absent.
    pub gauges: BTreeMap<String, GaugeReading>,
    pub weather: WeatherSnapshot,
    pub air_quality: AirQualityReading,
    pub alerts: Vec<AlertEvent>,
}

impl ConditionsSnapshot {
    /// Snapshot with every provider unavailable.
    pub fn empty(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            gauges: BTreeMap::new(),
            weather: WeatherSnapshot::default(),
            air_quality: AirQualityReading::default(),
            alerts: Vec::new(),
        }
    }

    pub fn gauge(&self, waterway_id: &str) -> Option<&GaugeReading> {
        self.gauges.get(waterway_id)
    }
}
