use crate::config::WaterwayConfig;
use crate::model::{AlertCategory, AlertEvent, ConditionsSnapshot};
use chrono::{DateTime, Utc};
use std::fmt;

pub const WIND_DANGER_MPH: f64 = 25.0;
pub const WIND_CAUTION_MPH: f64 = 15.0;
pub const PRECIP_PROBABILITY_CAUTION_PCT: f64 = 70.0;
pub const PRECIP_SUM_CAUTION_IN: f64 = 0.5;
pub const AQI_DANGER: u32 = 150;
pub const AQI_CAUTION: u32 = 100;
pub const VISIBILITY_DANGER_MI: f64 = 0.5;
pub const VISIBILITY_CAUTION_MI: f64 = 2.0;
/// WMO codes 95 and above are thunderstorm classes.
pub const THUNDERSTORM_CODE: u16 = 95;

/// Number of factors shown in the one-line verdict detail.
const DETAIL_FACTORS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerdictTier {
    Favorable,
    Caution,
    Danger,
}

impl VerdictTier {
    pub fn label(&self) -> &'static str {
        match self {
            VerdictTier::Favorable => "CONDITIONS FAVORABLE",
            VerdictTier::Caution => "USE CAUTION",
            VerdictTier::Danger => "STAY OFF WATER",
        }
    }
}

impl fmt::Display for VerdictTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of one scoring pass. The tier is derived from the two factor
/// lists at construction and cannot drift from them afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    tier: VerdictTier,
    issues: Vec<String>,
    warnings: Vec<String>,
}

impl Verdict {
    pub fn from_factors(issues: Vec<String>, warnings: Vec<String>) -> Self {
        let tier = if !issues.is_empty() {
            VerdictTier::Danger
        } else if !warnings.is_empty() {
            VerdictTier::Caution
        } else {
            VerdictTier::Favorable
        };
        Self {
            tier,
            issues,
            warnings,
        }
    }

    pub fn tier(&self) -> VerdictTier {
        self.tier
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Issues first, then warnings, each in evaluation order.
    pub fn factors(&self) -> impl Iterator<Item = &String> {
        self.issues.iter().chain(self.warnings.iter())
    }

    /// One-line summary: the first two factors, or a reassurance when there
    /// are none.
    pub fn detail(&self) -> String {
        let shown: Vec<&str> = self
            .factors()
            .take(DETAIL_FACTORS)
            .map(String::as_str)
            .collect();
        if shown.is_empty() {
            "All systems normal".to_string()
        } else {
            shown.join(" · ")
        }
    }
}

/// A single rule's contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Issue(String),
    Warning(String),
}

/// Score a snapshot. Waterway rules run in the configured order, followed by
/// the global rules; the order only affects factor listing, never the tier.
/// A rule whose input is absent stays silent.
pub fn evaluate(waterways: &[WaterwayConfig], snapshot: &ConditionsSnapshot) -> Verdict {
    let stage_findings = waterways.iter().filter_map(|waterway| {
        let stage = snapshot.gauge(&waterway.id).and_then(|g| g.stage_ft);
        stage_rule(waterway, stage)
    });

    let weather = &snapshot.weather;
    let global_findings = [
        alert_rule(&snapshot.alerts, snapshot.as_of),
        wind_rule(weather.wind_speed_mph),
        precipitation_rule(
            weather.today.precip_probability_pct,
            weather.today.precip_sum_in,
        ),
        air_quality_rule(snapshot.air_quality.us_aqi),
        visibility_rule(weather.visibility_mi()),
        weather_code_rule(weather.weather_code),
    ];

    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    for finding in stage_findings.chain(global_findings.into_iter().flatten()) {
        match finding {
            Finding::Issue(text) => issues.push(text),
            Finding::Warning(text) => warnings.push(text),
        }
    }

    Verdict::from_factors(issues, warnings)
}

/// Action and flood stage are issues. Elevated is display-only.
pub fn stage_rule(waterway: &WaterwayConfig, stage_ft: Option<f64>) -> Option<Finding> {
    let stage = stage_ft?;
    if stage >= waterway.flood_stage_ft {
        Some(Finding::Issue(format!("{} at FLOOD STAGE", waterway.name)))
    } else if stage >= waterway.action_stage_ft {
        Some(Finding::Issue(format!("{} at ACTION STAGE", waterway.name)))
    } else {
        None
    }
}

pub fn alert_rule(alerts: &[AlertEvent], now: DateTime<Utc>) -> Option<Finding> {
    alerts
        .iter()
        .any(|alert| alert.category == AlertCategory::Flood && alert.is_active_at(now))
        .then(|| Finding::Issue("NWS FLOOD ALERT ACTIVE".to_string()))
}

pub fn wind_rule(wind_speed_mph: Option<f64>) -> Option<Finding> {
    let speed = wind_speed_mph?;
    if speed > WIND_DANGER_MPH {
        Some(Finding::Issue(format!("DANGEROUS WIND ({:.0} mph)", speed)))
    } else if speed > WIND_CAUTION_MPH {
        Some(Finding::Warning(format!("HIGH WIND ({:.0} mph)", speed)))
    } else {
        None
    }
}

/// Warning only. Heavy rain drives sewer overflows rather than immediate
/// danger on the water.
pub fn precipitation_rule(
    precip_probability_pct: Option<f64>,
    precip_sum_in: Option<f64>,
) -> Option<Finding> {
    let likely = precip_probability_pct.is_some_and(|p| p > PRECIP_PROBABILITY_CAUTION_PCT);
    let heavy = precip_sum_in.is_some_and(|s| s > PRECIP_SUM_CAUTION_IN);
    (likely || heavy).then(|| Finding::Warning("RAIN / CSO RISK".to_string()))
}

pub fn air_quality_rule(us_aqi: Option<u32>) -> Option<Finding> {
    let aqi = us_aqi?;
    if aqi > AQI_DANGER {
        Some(Finding::Issue(format!("POOR AIR QUALITY (AQI {})", aqi)))
    } else if aqi > AQI_CAUTION {
        Some(Finding::Warning(format!("MODERATE AIR QUALITY (AQI {})", aqi)))
    } else {
        None
    }
}

pub fn visibility_rule(visibility_mi: Option<f64>) -> Option<Finding> {
    let visibility = visibility_mi?;
    if visibility < VISIBILITY_DANGER_MI {
        Some(Finding::Issue("DENSE FOG / LIMITED VISIBILITY".to_string()))
    } else if visibility < VISIBILITY_CAUTION_MI {
        Some(Finding::Warning("REDUCED VISIBILITY/FOG".to_string()))
    } else {
        None
    }
}

pub fn weather_code_rule(weather_code: Option<u16>) -> Option<Finding> {
    weather_code
        .filter(|code| *code >= THUNDERSTORM_CODE)
        .map(|_| Finding::Issue("THUNDERSTORM ACTIVE".to_string()))
}
