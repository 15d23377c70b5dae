use crate::error::{AppError, Result};
use crate::model::Provider;
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub location: LocationConfig,
    pub scheduler: SchedulerConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub alerts: AlertKeywords,
    /// Monitored rivers, in display order. Factor ordering in the verdict
    /// follows this list.
    pub waterways: Vec<WaterwayConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA zone used for local calendar math (overflow season).
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

fn default_timezone() -> Tz {
    chrono_tz::America::New_York
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub interval_minutes: u64,
    #[serde(default)]
    pub initial_delay_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    pub usgs_base_url: String,
    pub open_meteo_base_url: String,
    pub air_quality_base_url: String,
    pub nws_base_url: String,
    pub nwps_base_url: String,
    pub alcosan_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_seconds", deserialize_with = "deserialize_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub ttl_minutes: TtlConfig,
}

fn default_user_agent() -> String {
    "river-conditions/0.1.0".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    1
}

/// Custom deserializer that handles a duration as both number and string
///
/// Accepts:
/// - `timeout_seconds: 10` (number)
/// - `timeout_seconds: "10"` (string that parses to number)
/// - `timeout_seconds: ${PROVIDER_TIMEOUT}` (env var substituted to either)
fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SecondsValue {
        Number(u64),
        String(String),
    }

    match SecondsValue::deserialize(deserializer)? {
        SecondsValue::Number(n) => Ok(n),
        SecondsValue::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid number of seconds: '{}'", s))),
    }
}

/// Freshness window for each provider's cached snapshot, in minutes.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TtlConfig {
    pub usgs_current: u64,
    pub usgs_upstream: u64,
    pub weather: u64,
    pub air_quality: u64,
    pub nws_alerts: u64,
    pub nwps_forecast: u64,
    pub alcosan_soak: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            usgs_current: 5,
            usgs_upstream: 5,
            weather: 10,
            air_quality: 10,
            nws_alerts: 10,
            nwps_forecast: 15,
            alcosan_soak: 10,
        }
    }
}

impl TtlConfig {
    pub fn minutes_for(&self, provider: Provider) -> u64 {
        match provider {
            Provider::UsgsCurrent => self.usgs_current,
            Provider::UsgsUpstream => self.usgs_upstream,
            Provider::Weather => self.weather,
            Provider::AirQuality => self.air_quality,
            Provider::NwsAlerts => self.nws_alerts,
            Provider::NwpsForecast => self.nwps_forecast,
            Provider::AlcosanSoak => self.alcosan_soak,
        }
    }
}

/// Keyword sets used to classify NWS alert events. Matching is a
/// case-insensitive substring test; flood keywords win over storm keywords.
#[derive(Debug, Deserialize, Clone)]
pub struct AlertKeywords {
    #[serde(default = "default_flood_keywords")]
    pub flood_keywords: Vec<String>,
    #[serde(default = "default_storm_keywords")]
    pub storm_keywords: Vec<String>,
}

fn default_flood_keywords() -> Vec<String> {
    vec!["flood".to_string(), "flash".to_string()]
}

fn default_storm_keywords() -> Vec<String> {
    vec![
        "storm".to_string(),
        "tornado".to_string(),
        "thunder".to_string(),
    ]
}

impl Default for AlertKeywords {
    fn default() -> Self {
        Self {
            flood_keywords: default_flood_keywords(),
            storm_keywords: default_storm_keywords(),
        }
    }
}

/// Static description of one monitored river.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WaterwayConfig {
    pub id: String,
    pub name: String,
    /// Gauge location, e.g. "Braddock".
    #[serde(default)]
    pub location: String,
    /// USGS site code of the primary gauge.
    pub site_id: String,
    /// Presentation only.
    #[serde(default = "default_color")]
    pub color: String,
    pub action_stage_ft: f64,
    pub flood_stage_ft: f64,
    /// NWS Water Prediction Service gauge id for stage forecasts.
    #[serde(default)]
    pub nwps_id: Option<String>,
    #[serde(default)]
    pub upstream: Option<UpstreamGauge>,
}

fn default_color() -> String {
    "#4FC3F7".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UpstreamGauge {
    pub site_id: String,
    pub name: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text, substituting
    /// `${VAR}` references from the environment first.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn waterway(&self, id: &str) -> Option<&WaterwayConfig> {
        self.waterways.iter().find(|w| w.id == id)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Unexpanded environment variables
    /// - A non-empty, uniquely keyed waterway list with ordered thresholds
    /// - Plausible coordinates and time intervals
    /// - Valid provider URL formats
    fn validate(&self) -> Result<()> {
        let urls = [
            ("usgs_base_url", &self.providers.usgs_base_url),
            ("open_meteo_base_url", &self.providers.open_meteo_base_url),
            ("air_quality_base_url", &self.providers.air_quality_base_url),
            ("nws_base_url", &self.providers.nws_base_url),
            ("nwps_base_url", &self.providers.nwps_base_url),
            ("alcosan_url", &self.providers.alcosan_url),
        ];

        for (field_name, value) in &urls {
            if value.contains("${") {
                return Err(AppError::Config(format!(
                    "{} references an environment variable that is not set. \
                     Please set it or create a .env file.",
                    field_name
                )));
            }
            validate_url(field_name, value)?;
        }

        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(AppError::Config(format!(
                "Latitude {} out of range (-90 to 90)",
                self.location.latitude
            )));
        }

        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(AppError::Config(format!(
                "Longitude {} out of range (-180 to 180)",
                self.location.longitude
            )));
        }

        if self.scheduler.interval_minutes == 0 {
            return Err(AppError::Config(
                "Scheduler interval_minutes must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.interval_minutes < 5 {
            tracing::warn!(
                "Scheduler interval of {} minutes is shorter than the freshest provider TTL",
                self.scheduler.interval_minutes
            );
        }

        if self.providers.timeout_seconds == 0 || self.providers.timeout_seconds > 60 {
            return Err(AppError::Config(format!(
                "Provider timeout_seconds must be between 1 and 60, got {}",
                self.providers.timeout_seconds
            )));
        }

        if !(8..=15).contains(&self.providers.timeout_seconds) {
            tracing::warn!(
                "Provider timeout of {}s is outside the usual 8-15s range",
                self.providers.timeout_seconds
            );
        }

        if self.alerts.flood_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::Config(
                "alerts.flood_keywords must contain at least one keyword".to_string(),
            ));
        }

        if self.waterways.is_empty() {
            return Err(AppError::Config(
                "At least one waterway must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut primary_sites = HashSet::new();
        let mut upstream_sites = HashSet::new();
        for waterway in &self.waterways {
            if waterway.id.trim().is_empty() {
                return Err(AppError::Config("Waterway id cannot be empty".to_string()));
            }

            if !seen.insert(waterway.id.as_str()) {
                return Err(AppError::Config(format!(
                    "Duplicate waterway id '{}'",
                    waterway.id
                )));
            }

            validate_site_code(&waterway.id, &waterway.site_id)?;
            // Readings are keyed back to a single waterway per site.
            if !primary_sites.insert(waterway.site_id.as_str()) {
                return Err(AppError::Config(format!(
                    "Site code '{}' for '{}' is already used by another waterway",
                    waterway.site_id, waterway.id
                )));
            }
            if let Some(upstream) = &waterway.upstream {
                validate_site_code(&waterway.id, &upstream.site_id)?;
                if !upstream_sites.insert(upstream.site_id.as_str()) {
                    return Err(AppError::Config(format!(
                        "Upstream site code '{}' for '{}' is already used by another waterway",
                        upstream.site_id, waterway.id
                    )));
                }
            }

            if !waterway.action_stage_ft.is_finite() || !waterway.flood_stage_ft.is_finite() {
                return Err(AppError::Config(format!(
                    "Stage thresholds for '{}' must be finite numbers",
                    waterway.id
                )));
            }

            if waterway.action_stage_ft >= waterway.flood_stage_ft {
                return Err(AppError::Config(format!(
                    "Action stage ({} ft) must be below flood stage ({} ft) for '{}'",
                    waterway.action_stage_ft, waterway.flood_stage_ft, waterway.id
                )));
            }
        }

        Ok(())
    }
}

fn validate_url(field_name: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", field_name, value, e)))?;

    // Plain HTTP is tolerated only for local mock servers.
    let loopback = matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"));
    if parsed.scheme() != "https" && !loopback {
        return Err(AppError::Config(format!(
            "{} must use HTTPS, got: {}",
            field_name,
            parsed.scheme()
        )));
    }

    Ok(())
}

fn validate_site_code(waterway_id: &str, site_code: &str) -> Result<()> {
    // USGS site codes are 8 to 15 digit numeric strings; anything else is
    // silently dropped from IV responses.
    if site_code.len() < 8 || site_code.len() > 15 || !site_code.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AppError::Config(format!(
            "Site code '{}' for '{}' is not a valid USGS site code",
            site_code, waterway_id
        )));
    }
    Ok(())
}

/// Substitute `${VAR}` references line by line. Full-line `#` comments are
/// passed through untouched.
fn expand_env_vars(content: &str) -> Result<String> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AppError::Config(format!("Invalid substitution pattern: {}", e)))?;

    let mut missing_vars: Vec<String> = Vec::new();
    let mut lines = Vec::new();

    for line in content.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut expanded = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    expanded = expanded.replace(&cap[0], &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(expanded);
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root (copy .env.example)\n\
             2. Set the missing variable{}: export {}=<value>\n\
             3. Or set {} in your environment before running",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
            missing_vars.join(", ")
        )));
    }

    let mut result = lines.join("\n");
    if content.ends_with('\n') {
        result.push('\n');
    }
    Ok(result)
}
