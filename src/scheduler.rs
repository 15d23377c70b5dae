use crate::assessment::{assess, Assessment, CycleInputs};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::model::{
    AirQualityReading, AlertEvent, ConditionsSnapshot, GaugeReading, Provider, ProviderReport,
    ProviderStatus, RiverForecast, SoakStatus, UpstreamReading, WeatherSnapshot,
};
use crate::normalize::{alcosan, nwps, nws, open_meteo, usgs, NormalizeStats};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

pub type AssessmentReceiver = watch::Receiver<Option<Arc<Assessment>>>;

/// Write side of the assessment channel. Readers always see a complete
/// assessment; one from an older cycle never replaces a newer one.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: watch::Sender<Option<Arc<Assessment>>>,
}

impl Publisher {
    pub fn channel() -> (Self, AssessmentReceiver) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    /// Returns false when the assessment was discarded as stale.
    pub fn publish(&self, assessment: Arc<Assessment>) -> bool {
        let cycle = assessment.cycle;
        let published = self.tx.send_if_modified(|current| {
            if current.as_ref().is_some_and(|c| c.cycle >= cycle) {
                return false;
            }
            *current = Some(assessment);
            true
        });

        if !published {
            warn!("Discarding assessment from stale cycle {}", cycle);
        }
        published
    }

    pub fn subscribe(&self) -> AssessmentReceiver {
        self.tx.subscribe()
    }
}

/// Last good value per provider.
#[derive(Debug, Default)]
struct ProviderCaches {
    usgs_current: TtlCache<BTreeMap<String, GaugeReading>>,
    usgs_upstream: TtlCache<BTreeMap<String, UpstreamReading>>,
    weather: TtlCache<WeatherSnapshot>,
    air_quality: TtlCache<AirQualityReading>,
    alerts: TtlCache<Vec<AlertEvent>>,
    forecasts: TtlCache<BTreeMap<String, RiverForecast>>,
    soak: TtlCache<SoakStatus>,
}

/// One provider's contribution to a cycle.
struct Provided<T> {
    value: Option<T>,
    status: ProviderStatus,
}

impl<T: Clone> Provided<T> {
    fn skipped(value: T) -> Self {
        Self {
            value: Some(value),
            status: ProviderStatus::Skipped,
        }
    }

    /// Store a freshly fetched value so later cycles can reuse it.
    fn remember(&self, cache: &mut TtlCache<T>, now: DateTime<Utc>) {
        if let (ProviderStatus::Fresh, Some(value)) = (&self.status, &self.value) {
            cache.store(value.clone(), now);
        }
    }
}

pub struct Scheduler {
    config: Config,
    fetcher: Fetcher,
    caches: ProviderCaches,
    cycle: u64,
    publisher: Publisher,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        publisher: Publisher,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let fetcher = Fetcher::new(&config.providers)?;
        Ok(Self {
            config,
            fetcher,
            caches: ProviderCaches::default(),
            cycle: 0,
            publisher,
            shutdown_rx,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let initial_delay = Duration::from_secs(self.config.scheduler.initial_delay_seconds);
        let poll_interval = Duration::from_secs(self.config.scheduler.interval_minutes * 60);

        info!(
            "Scheduler starting with {}s initial delay, {}m interval",
            self.config.scheduler.initial_delay_seconds, self.config.scheduler.interval_minutes
        );

        let mut shutdown = self.shutdown_rx.clone();

        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {},
            _ = shutdown.changed() => {
                info!("Shutdown received during initial delay");
                return Ok(());
            }
        }

        let mut ticker = interval(poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // A refresh in flight is dropped if shutdown arrives first.
                    tokio::select! {
                        _ = self.refresh() => {}
                        _ = shutdown.changed() => {
                            info!("Shutdown received during refresh, abandoning cycle");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run one refresh cycle now and publish its assessment.
    pub async fn refresh(&mut self) -> Arc<Assessment> {
        self.refresh_at(Utc::now()).await
    }

    /// Run one refresh cycle as of `now`. Cache freshness and the overflow
    /// season are judged against `now`.
    pub async fn refresh_at(&mut self, now: DateTime<Utc>) -> Arc<Assessment> {
        self.cycle += 1;
        let cycle = self.cycle;
        info!("Starting refresh cycle {}", cycle);

        let inputs = self.gather(now).await;
        let assessment = assess(cycle, &self.config.waterways, &inputs);

        let verdict = &assessment.verdict;
        info!(
            "Cycle {} verdict: {} ({})",
            cycle,
            verdict.tier(),
            verdict.detail()
        );
        let unavailable = assessment.unavailable_providers();
        if !unavailable.is_empty() {
            warn!(
                "Cycle {} ran without {} of {} providers: {:?}",
                cycle,
                unavailable.len(),
                Provider::ALL.len(),
                unavailable
            );
        }

        let assessment = Arc::new(assessment);
        if !self.publisher.publish(Arc::clone(&assessment)) {
            error!("Cycle {} was not published", cycle);
        }
        assessment
    }

    async fn gather(&mut self, now: DateTime<Utc>) -> CycleInputs {
        let config = &self.config;
        let fetcher = &self.fetcher;
        let caches = &self.caches;
        let waterways = config.waterways.as_slice();

        let has_upstream = waterways.iter().any(|w| w.upstream.is_some());
        let has_forecasts = waterways.iter().any(|w| w.nwps_id.is_some());
        let budget = Some(Duration::from_secs(config.providers.timeout_seconds));
        let in_season = alcosan::is_soak_season(local_month(now, config.location.timezone));

        let (current, upstream, weather, air_quality, alerts, forecasts, soak) = tokio::join!(
            self.provide(
                Provider::UsgsCurrent,
                &caches.usgs_current,
                now,
                budget,
                fetch_usgs_current(fetcher, config),
            ),
            async {
                if !has_upstream {
                    return Provided::skipped(BTreeMap::new());
                }
                self.provide(
                    Provider::UsgsUpstream,
                    &caches.usgs_upstream,
                    now,
                    budget,
                    fetch_usgs_upstream(fetcher, config),
                )
                .await
            },
            self.provide(
                Provider::Weather,
                &caches.weather,
                now,
                budget,
                fetch_weather(fetcher, config),
            ),
            self.provide(
                Provider::AirQuality,
                &caches.air_quality,
                now,
                budget,
                fetch_air_quality(fetcher, config),
            ),
            self.provide(
                Provider::NwsAlerts,
                &caches.alerts,
                now,
                budget,
                fetch_alerts(fetcher, config),
            ),
            async {
                if !has_forecasts {
                    return Provided::skipped(BTreeMap::new());
                }
                self.provide(
                    Provider::NwpsForecast,
                    &caches.forecasts,
                    now,
                    // Each gauge carries its own timeout.
                    None,
                    fetch_forecasts(fetcher, config),
                )
                .await
            },
            async {
                if !in_season {
                    debug!("Outside overflow season, skipping ALCOSAN");
                    return Provided::skipped(SoakStatus::Inactive);
                }
                self.provide(
                    Provider::AlcosanSoak,
                    &caches.soak,
                    now,
                    budget,
                    fetch_soak(fetcher),
                )
                .await
            },
        );

        let caches = &mut self.caches;
        current.remember(&mut caches.usgs_current, now);
        upstream.remember(&mut caches.usgs_upstream, now);
        weather.remember(&mut caches.weather, now);
        air_quality.remember(&mut caches.air_quality, now);
        alerts.remember(&mut caches.alerts, now);
        forecasts.remember(&mut caches.forecasts, now);
        soak.remember(&mut caches.soak, now);

        let providers = vec![
            report(Provider::UsgsCurrent, &current.status),
            report(Provider::UsgsUpstream, &upstream.status),
            report(Provider::Weather, &weather.status),
            report(Provider::AirQuality, &air_quality.status),
            report(Provider::NwsAlerts, &alerts.status),
            report(Provider::NwpsForecast, &forecasts.status),
            report(Provider::AlcosanSoak, &soak.status),
        ];

        CycleInputs {
            snapshot: ConditionsSnapshot {
                as_of: now,
                gauges: current.value.unwrap_or_default(),
                weather: weather.value.unwrap_or_default(),
                air_quality: air_quality.value.unwrap_or_default(),
                alerts: alerts.value.unwrap_or_default(),
            },
            upstream: upstream.value.unwrap_or_default(),
            forecasts: forecasts.value.unwrap_or_default(),
            soak: soak.value.unwrap_or(SoakStatus::Unavailable),
            providers,
        }
    }

    /// Serve `provider` from cache when fresh, otherwise run `fetch` under
    /// `budget`. Failures become `Unavailable`.
    async fn provide<T, Fut>(
        &self,
        provider: Provider,
        cache: &TtlCache<T>,
        now: DateTime<Utc>,
        budget: Option<Duration>,
        fetch: Fut,
    ) -> Provided<T>
    where
        T: Clone,
        Fut: Future<Output = Result<T>>,
    {
        let ttl_minutes = self.config.providers.ttl_minutes.minutes_for(provider);
        if let Some((value, age_minutes)) = cache.fresh_at(now, ttl_minutes) {
            debug!("{} served from cache ({}m old)", provider, age_minutes);
            return Provided {
                value: Some(value),
                status: ProviderStatus::Cached { age_minutes },
            };
        }

        let outcome = match budget {
            Some(budget) => bounded(provider.to_string(), budget, fetch).await,
            None => fetch.await,
        };

        match outcome {
            Ok(value) => Provided {
                value: Some(value),
                status: ProviderStatus::Fresh,
            },
            Err(e) => {
                warn!("{} unavailable: {}", provider, e);
                Provided {
                    value: None,
                    status: ProviderStatus::Unavailable(e.to_string()),
                }
            }
        }
    }
}

async fn bounded<T, Fut>(label: String, budget: Duration, fetch: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, fetch).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            provider: label,
            seconds: budget.as_secs(),
        }),
    }
}

fn report(provider: Provider, status: &ProviderStatus) -> ProviderReport {
    ProviderReport {
        provider,
        status: status.clone(),
    }
}

fn local_month(now: DateTime<Utc>, timezone: Tz) -> u32 {
    now.with_timezone(&timezone).month()
}

fn log_stats(provider: Provider, stats: &NormalizeStats) {
    if stats.malformed > 0 {
        warn!(
            "{}: {} records, {} normalized, {} without data, {} malformed ({:.1}% failure rate)",
            provider,
            stats.total_records,
            stats.normalized,
            stats.no_data,
            stats.malformed,
            stats.failure_rate() * 100.0
        );
    } else {
        debug!(
            "{}: {} records, {} normalized, {} without data",
            provider, stats.total_records, stats.normalized, stats.no_data
        );
    }
}

async fn fetch_usgs_current(
    fetcher: &Fetcher,
    config: &Config,
) -> Result<BTreeMap<String, GaugeReading>> {
    let sites = usgs::primary_site_codes(&config.waterways);
    let url = fetcher.usgs_iv_url(&sites, false)?;
    let body = fetcher.get_text(url.as_str()).await?;
    let (readings, stats) = usgs::parse_current(&body, &config.waterways)?;
    log_stats(Provider::UsgsCurrent, &stats);
    Ok(readings)
}

async fn fetch_usgs_upstream(
    fetcher: &Fetcher,
    config: &Config,
) -> Result<BTreeMap<String, UpstreamReading>> {
    let sites = usgs::upstream_site_codes(&config.waterways);
    let url = fetcher.usgs_iv_url(&sites, true)?;
    let body = fetcher.get_text(url.as_str()).await?;
    let (readings, stats) = usgs::parse_upstream(&body, &config.waterways)?;
    log_stats(Provider::UsgsUpstream, &stats);
    Ok(readings)
}

async fn fetch_weather(fetcher: &Fetcher, config: &Config) -> Result<WeatherSnapshot> {
    let url = fetcher.forecast_url(&config.location)?;
    let body = fetcher.get_text(url.as_str()).await?;
    open_meteo::parse_weather(&body)
}

async fn fetch_air_quality(fetcher: &Fetcher, config: &Config) -> Result<AirQualityReading> {
    let url = fetcher.air_quality_url(&config.location)?;
    let body = fetcher.get_text(url.as_str()).await?;
    open_meteo::parse_air_quality(&body)
}

async fn fetch_alerts(fetcher: &Fetcher, config: &Config) -> Result<Vec<AlertEvent>> {
    let url = fetcher.alerts_url(&config.location)?;
    let body = fetcher.get_text(url.as_str()).await?;
    let (alerts, stats) = nws::parse_alerts(&body, &config.alerts)?;
    log_stats(Provider::NwsAlerts, &stats);
    Ok(alerts)
}

/// Forecasts for every waterway with an NWPS gauge, fetched concurrently
/// with one timeout per gauge. A slow or failing gauge only drops that
/// waterway; the provider fails when every gauge does.
async fn fetch_forecasts(
    fetcher: &Fetcher,
    config: &Config,
) -> Result<BTreeMap<String, RiverForecast>> {
    let budget = Duration::from_secs(config.providers.timeout_seconds);
    let mut join_set = JoinSet::new();

    for waterway in &config.waterways {
        let Some(gauge_id) = waterway.nwps_id.clone() else {
            continue;
        };
        let fetcher = fetcher.clone();
        let waterway_id = waterway.id.clone();

        join_set.spawn(async move {
            let label = format!("{} {}", Provider::NwpsForecast, gauge_id);
            let outcome = bounded(label, budget, fetch_forecast(&fetcher, &gauge_id)).await;
            (waterway_id, gauge_id, outcome)
        });
    }

    let mut forecasts = BTreeMap::new();
    let mut last_error = None;

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((waterway_id, _, Ok((forecast, stats)))) => {
                log_stats(Provider::NwpsForecast, &stats);
                forecasts.insert(waterway_id, forecast);
            }
            Ok((waterway_id, gauge_id, Err(e))) => {
                warn!("NWPS forecast for {} ({}) unavailable: {}", waterway_id, gauge_id, e);
                last_error = Some(e);
            }
            Err(e) => {
                error!("NWPS forecast task failed: {}", e);
                last_error = Some(AppError::InvalidData(format!("forecast task: {}", e)));
            }
        }
    }

    match last_error {
        Some(e) if forecasts.is_empty() => Err(e),
        _ => Ok(forecasts),
    }
}

async fn fetch_forecast(
    fetcher: &Fetcher,
    gauge_id: &str,
) -> Result<(RiverForecast, NormalizeStats)> {
    let url = fetcher.nwps_url(gauge_id)?;
    let body = fetcher.get_text(url.as_str()).await?;
    nwps::parse_forecast(&body)
}

async fn fetch_soak(fetcher: &Fetcher) -> Result<SoakStatus> {
    let url = fetcher.alcosan_url()?;
    let body = fetcher.get_text(url.as_str()).await?;
    alcosan::parse_soak_page(&body)
}
