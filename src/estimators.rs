use crate::model::SoakStatus;
use crate::scoring::{VISIBILITY_CAUTION_MI, VISIBILITY_DANGER_MI};
use std::fmt;

/// Empirical flow-to-surface-speed factor for the Pittsburgh gauge
/// cross-sections (10,000 cfs is roughly 0.36 mph per USACE sailing data).
/// Not a hydraulic formula; do not reuse for other rivers.
pub const PITTSBURGH_FLOW_TO_SPEED_MPH: f64 = 0.000036;

pub fn estimate_current_speed_mph(flow_cfs: Option<f64>) -> Option<f64> {
    flow_cfs.map(|flow| flow * PITTSBURGH_FLOW_TO_SPEED_MPH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FogRisk {
    Low,
    Moderate,
    High,
}

impl fmt::Display for FogRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FogRisk::Low => "LOW",
            FogRisk::Moderate => "MODERATE",
            FogRisk::High => "HIGH",
        };
        write!(f, "{}", label)
    }
}

/// Both thresholds are exclusive: exactly 2.0 mi is `Low`.
pub fn fog_risk(visibility_mi: Option<f64>) -> Option<FogRisk> {
    let visibility = visibility_mi?;
    Some(if visibility < VISIBILITY_DANGER_MI {
        FogRisk::High
    } else if visibility < VISIBILITY_CAUTION_MI {
        FogRisk::Moderate
    } else {
        FogRisk::Low
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CsoRisk {
    Low,
    Moderate,
    High,
}

impl fmt::Display for CsoRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CsoRisk::Low => "LOW RISK",
            CsoRisk::Moderate => "MODERATE RISK",
            CsoRisk::High => "HIGH OVERFLOW RISK",
        };
        write!(f, "{}", label)
    }
}

/// Precipitation proxy for combined sewer overflow risk.
///
/// Stands in for an authoritative overflow feed, which is only published
/// in season. Either term alone can raise the risk; an absent term cannot.
/// Returns `None` only when both inputs are absent.
pub fn cso_risk(precip_sum_24h_in: Option<f64>, precip_probability_pct: Option<f64>) -> Option<CsoRisk> {
    if precip_sum_24h_in.is_none() && precip_probability_pct.is_none() {
        return None;
    }

    let sum_at_least = |threshold: f64| precip_sum_24h_in.is_some_and(|s| s >= threshold);
    let probability_at_least = |threshold: f64| precip_probability_pct.is_some_and(|p| p >= threshold);

    Some(if sum_at_least(0.5) || probability_at_least(70.0) {
        CsoRisk::High
    } else if sum_at_least(0.2) || probability_at_least(40.0) {
        CsoRisk::Moderate
    } else {
        CsoRisk::Low
    })
}

/// Where the displayed overflow outlook came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsoOutlook {
    /// ALCOSAN reported a definite status.
    Reported(SoakStatus),
    /// No definite report; precipitation proxy used instead.
    Estimated(CsoRisk),
    Unknown,
}

/// Prefer a definite ALCOSAN report; otherwise fall back to the proxy.
pub fn cso_outlook(soak: SoakStatus, proxy: Option<CsoRisk>) -> CsoOutlook {
    match soak {
        SoakStatus::NoOverflow | SoakStatus::OverflowActive => CsoOutlook::Reported(soak),
        SoakStatus::Inactive | SoakStatus::Unclear | SoakStatus::Unavailable => proxy
            .map(CsoOutlook::Estimated)
            .unwrap_or(CsoOutlook::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_speed_from_flow() {
        let speed = estimate_current_speed_mph(Some(10_000.0)).unwrap();
        assert!((speed - 0.36).abs() < 1e-9);
        assert_eq!(estimate_current_speed_mph(Some(0.0)), Some(0.0));
        assert_eq!(estimate_current_speed_mph(None), None);
    }

    #[test]
    fn test_fog_risk_boundaries() {
        assert_eq!(fog_risk(Some(0.4)), Some(FogRisk::High));
        assert_eq!(fog_risk(Some(0.5)), Some(FogRisk::Moderate));
        assert_eq!(fog_risk(Some(1.8)), Some(FogRisk::Moderate));
        assert_eq!(fog_risk(Some(2.0)), Some(FogRisk::Low));
        assert_eq!(fog_risk(None), None);
    }

    #[test]
    fn test_fog_risk_agrees_with_visibility_rule() {
        use crate::scoring::{visibility_rule, Finding};

        for visibility in [0.0, 0.3, 0.5, 1.0, 1.9, 2.0, 5.0] {
            let rule = visibility_rule(Some(visibility));
            match fog_risk(Some(visibility)) {
                Some(FogRisk::High) => assert!(matches!(rule, Some(Finding::Issue(_)))),
                Some(FogRisk::Moderate) => assert!(matches!(rule, Some(Finding::Warning(_)))),
                Some(FogRisk::Low) => assert_eq!(rule, None),
                None => unreachable!(),
            }
        }
    }

    #[test]
    fn test_cso_sum_alone_triggers_high() {
        assert_eq!(cso_risk(Some(0.6), Some(10.0)), Some(CsoRisk::High));
        assert_eq!(cso_risk(Some(0.5), None), Some(CsoRisk::High));
    }

    #[test]
    fn test_cso_probability_alone_triggers() {
        assert_eq!(cso_risk(Some(0.0), Some(70.0)), Some(CsoRisk::High));
        assert_eq!(cso_risk(None, Some(40.0)), Some(CsoRisk::Moderate));
        assert_eq!(cso_risk(Some(0.1), Some(39.0)), Some(CsoRisk::Low));
    }

    #[test]
    fn test_cso_moderate_band() {
        assert_eq!(cso_risk(Some(0.2), Some(0.0)), Some(CsoRisk::Moderate));
        assert_eq!(cso_risk(Some(0.49), Some(69.0)), Some(CsoRisk::Moderate));
    }

    #[test]
    fn test_cso_absent_inputs() {
        assert_eq!(cso_risk(None, None), None);
    }

    #[test]
    fn test_outlook_prefers_definite_report() {
        assert_eq!(
            cso_outlook(SoakStatus::OverflowActive, Some(CsoRisk::Low)),
            CsoOutlook::Reported(SoakStatus::OverflowActive)
        );
        assert_eq!(
            cso_outlook(SoakStatus::Inactive, Some(CsoRisk::High)),
            CsoOutlook::Estimated(CsoRisk::High)
        );
        assert_eq!(cso_outlook(SoakStatus::Unavailable, None), CsoOutlook::Unknown);
    }
}
