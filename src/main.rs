use river_conditions::assessment::Assessment;
use river_conditions::config::Config;
use river_conditions::labels::{
    aqi_category, outlook_summary, water_temperature_label, weather_description, wind_compass,
};
use river_conditions::scheduler::{Publisher, Scheduler};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,river_conditions=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("River conditions service starting...");

    let config_path =
        std::env::var("RIVER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = Config::load(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration from {}: {}\n\n\
             Make sure:\n\
             1. {} exists (or point RIVER_CONFIG at your file)\n\
             2. Every waterway has action_stage_ft below flood_stage_ft\n\
             3. All referenced environment variables are set (check .env.example)",
            config_path,
            e,
            config_path
        )
    })?;
    info!(
        "Configuration loaded: {} waterways, refresh every {}m",
        config.waterways.len(),
        config.scheduler.interval_minutes
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let (publisher, mut assessments) = Publisher::channel();

    // Presentation: log each published assessment.
    tokio::spawn(async move {
        while assessments.changed().await.is_ok() {
            let latest = assessments.borrow_and_update().clone();
            if let Some(assessment) = latest {
                log_assessment(&assessment);
            }
        }
    });

    let mut scheduler = Scheduler::new(config, publisher, shutdown_rx)
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

    if let Err(e) = scheduler.run().await {
        error!("Scheduler error: {}", e);
    }

    info!("River conditions service shutting down");
    Ok(())
}

fn log_assessment(assessment: &Assessment) {
    let verdict = &assessment.verdict;
    info!(
        "[cycle {}] {} | {}",
        assessment.cycle,
        verdict.tier(),
        verdict.detail()
    );

    for waterway in &assessment.waterways {
        let speed = waterway
            .current_speed_mph
            .map(|s| format!("{:.2} mph", s))
            .unwrap_or_else(|| "—".to_string());
        let forecast = match (&waterway.forecast_peak, &waterway.forecast_tier) {
            (Some(peak), Some(tier)) => format!(
                "peak {:.2} ft at {} ({})",
                peak.stage_ft,
                peak.valid_time.format("%a %H:%MZ"),
                tier.tier
            ),
            _ => "no forecast".to_string(),
        };
        let upstream = waterway
            .upstream
            .as_ref()
            .and_then(|u| {
                u.trend_ft
                    .map(|t| format!("{} {:+.2} ft/h", u.site_name, t))
            })
            .unwrap_or_default();
        info!(
            "  {:<12} {} current {} water {} {} {}",
            waterway.name,
            waterway.stage.label,
            speed,
            water_temperature_label(waterway.gauge.water_temp_c),
            forecast,
            upstream
        );
    }

    let weather = &assessment.conditions.weather;
    if let Some(wind) = weather.wind_speed_mph {
        let direction = weather
            .wind_direction_deg
            .map(wind_compass)
            .unwrap_or("—");
        let sky = weather
            .weather_code
            .and_then(weather_description)
            .unwrap_or("—");
        info!("  wind {:.0} mph {} | {}", wind, direction, sky);
    }
    info!("  today:    {}", outlook_summary(&weather.today));
    info!("  tomorrow: {}", outlook_summary(&weather.tomorrow));

    let (aqi, _) = aqi_category(assessment.conditions.air_quality.us_aqi);
    let fog = assessment
        .fog_risk
        .map(|f| f.to_string())
        .unwrap_or_else(|| "—".to_string());
    info!(
        "  AQI {} | fog {} | CSO {:?} | SOAK {}",
        aqi, fog, assessment.cso_outlook, assessment.soak
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
