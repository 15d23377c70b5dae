use crate::config::{LocationConfig, ProvidersConfig};
use crate::error::{AppError, Result};
use crate::model::{PARAM_DISCHARGE, PARAM_STAGE, PARAM_WATER_TEMP};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const FORECAST_CURRENT_FIELDS: &str = "temperature_2m,apparent_temperature,wind_speed_10m,\
wind_direction_10m,wind_gusts_10m,precipitation,weather_code,cloud_cover,visibility";

const FORECAST_DAILY_FIELDS: &str = "sunrise,sunset,uv_index_max,precipitation_probability_max,\
wind_speed_10m_max,precipitation_sum";

const AIR_QUALITY_FIELDS: &str = "us_aqi,pm2_5,pm10";

/// HTTP access to every upstream provider. Holds one connection pool and
/// the provider base URLs; callers own caching and timeouts per provider.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    providers: ProvidersConfig,
}

impl Fetcher {
    pub fn new(providers: &ProvidersConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(providers.user_agent.as_str())
            .timeout(Duration::from_secs(providers.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            providers: providers.clone(),
        })
    }

    /// GET `url` and return the body, retrying transient failures.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);

        retry_with_backoff(self.providers.max_retries, || async {
            let response = self.client.get(url).send().await?;
            let response = response.error_for_status()?;
            let content = response.text().await?;
            Ok(content)
        })
        .await
    }

    /// Instantaneous values for the given sites. `recent_hour` requests the
    /// last hour of points instead of only the latest one.
    pub fn usgs_iv_url(&self, site_codes: &[&str], recent_hour: bool) -> Result<Url> {
        let parameters = if recent_hour {
            format!("{},{}", PARAM_DISCHARGE, PARAM_STAGE)
        } else {
            format!("{},{},{}", PARAM_DISCHARGE, PARAM_STAGE, PARAM_WATER_TEMP)
        };

        let mut url = endpoint(&self.providers.usgs_base_url, "nwis/iv/")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("format", "json")
                .append_pair("sites", &site_codes.join(","))
                .append_pair("parameterCd", &parameters);
            if recent_hour {
                query.append_pair("period", "PT1H");
            }
        }
        Ok(url)
    }

    pub fn forecast_url(&self, location: &LocationConfig) -> Result<Url> {
        let mut url = endpoint(&self.providers.open_meteo_base_url, "v1/forecast")?;
        url.query_pairs_mut()
            .append_pair("latitude", &location.latitude.to_string())
            .append_pair("longitude", &location.longitude.to_string())
            .append_pair("current", FORECAST_CURRENT_FIELDS)
            .append_pair("daily", FORECAST_DAILY_FIELDS)
            .append_pair("timezone", "auto")
            .append_pair("forecast_days", "3")
            .append_pair("wind_speed_unit", "mph")
            .append_pair("temperature_unit", "fahrenheit")
            .append_pair("precipitation_unit", "inch");
        Ok(url)
    }

    pub fn air_quality_url(&self, location: &LocationConfig) -> Result<Url> {
        let mut url = endpoint(&self.providers.air_quality_base_url, "v1/air-quality")?;
        url.query_pairs_mut()
            .append_pair("latitude", &location.latitude.to_string())
            .append_pair("longitude", &location.longitude.to_string())
            .append_pair("current", AIR_QUALITY_FIELDS)
            .append_pair("timezone", "auto");
        Ok(url)
    }

    pub fn alerts_url(&self, location: &LocationConfig) -> Result<Url> {
        let mut url = endpoint(&self.providers.nws_base_url, "alerts/active")?;
        url.query_pairs_mut().append_pair(
            "point",
            &format!("{},{}", location.latitude, location.longitude),
        );
        Ok(url)
    }

    pub fn nwps_url(&self, gauge_id: &str) -> Result<Url> {
        endpoint(
            &self.providers.nwps_base_url,
            &format!("nwps/v1/gauges/{}/stageflow", gauge_id),
        )
    }

    pub fn alcosan_url(&self) -> Result<Url> {
        Url::parse(&self.providers.alcosan_url)
            .map_err(|e| AppError::Config(format!("Invalid alcosan_url: {}", e)))
    }
}

fn endpoint(base_url: &str, path: &str) -> Result<Url> {
    let joined = format!("{}/{}", base_url.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| AppError::Config(format!("Invalid URL '{}': {}", joined, e)))
}

/// Retry a future with exponential backoff
async fn retry_with_backoff<F, Fut, T>(max_retries: u32, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                retries += 1;

                if retries > max_retries {
                    return Err(e);
                }

                let should_retry = match &e {
                    AppError::Http(reqwest_err) => {
                        // Connection errors, timeouts, server errors (5xx)
                        reqwest_err.is_timeout()
                            || reqwest_err.is_connect()
                            || reqwest_err
                                .status()
                                .map(|s| s.is_server_error())
                                .unwrap_or(false)
                    }
                    AppError::Io(_) => true,
                    _ => false,
                };

                if !should_retry {
                    return Err(e);
                }

                let delay = Duration::from_millis(500 * 2u64.pow(retries.saturating_sub(1)));
                warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    retries, max_retries, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
