use crate::config::WaterwayConfig;
use crate::estimators::{
    cso_outlook, cso_risk, estimate_current_speed_mph, fog_risk, CsoOutlook, CsoRisk, FogRisk,
};
use crate::model::{
    ConditionsSnapshot, ForecastPoint, GaugeReading, Provider, ProviderReport, ProviderStatus,
    RiverForecast, SoakStatus, UpstreamReading,
};
use crate::scoring::{evaluate, Verdict};
use crate::stage::{classify_for, StageStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Everything gathered during a cycle's fan-in.
#[derive(Debug, Clone)]
pub struct CycleInputs {
    pub snapshot: ConditionsSnapshot,
    /// Keyed by the downstream waterway id.
    pub upstream: BTreeMap<String, UpstreamReading>,
    /// Keyed by waterway id.
    pub forecasts: BTreeMap<String, RiverForecast>,
    pub soak: SoakStatus,
    pub providers: Vec<ProviderReport>,
}

impl CycleInputs {
    /// Inputs for a cycle in which no provider delivered anything.
    pub fn unavailable(as_of: DateTime<Utc>, reason: &str) -> Self {
        Self {
            snapshot: ConditionsSnapshot::empty(as_of),
            upstream: BTreeMap::new(),
            forecasts: BTreeMap::new(),
            soak: SoakStatus::Unavailable,
            providers: Provider::ALL
                .iter()
                .map(|&provider| ProviderReport {
                    provider,
                    status: ProviderStatus::Unavailable(reason.to_string()),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterwayAssessment {
    pub id: String,
    pub name: String,
    pub location: String,
    pub color: String,
    pub gauge: GaugeReading,
    pub stage: StageStatus,
    pub current_speed_mph: Option<f64>,
    pub upstream: Option<UpstreamReading>,
    pub forecast_peak: Option<ForecastPoint>,
    /// Tier the forecast peak would reach against this waterway's thresholds.
    pub forecast_tier: Option<StageStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub cycle: u64,
    pub as_of: DateTime<Utc>,
    pub verdict: Verdict,
    /// Same order as the configured waterway list.
    pub waterways: Vec<WaterwayAssessment>,
    pub fog_risk: Option<FogRisk>,
    pub cso_risk: Option<CsoRisk>,
    pub cso_outlook: CsoOutlook,
    pub soak: SoakStatus,
    pub conditions: ConditionsSnapshot,
    pub providers: Vec<ProviderReport>,
}

impl Assessment {
    pub fn provider_status(&self, provider: Provider) -> Option<&ProviderStatus> {
        self.providers
            .iter()
            .find(|r| r.provider == provider)
            .map(|r| &r.status)
    }

    pub fn unavailable_providers(&self) -> Vec<Provider> {
        self.providers
            .iter()
            .filter(|r| !r.status.is_available())
            .map(|r| r.provider)
            .collect()
    }
}

pub fn assess(cycle: u64, waterways: &[WaterwayConfig], inputs: &CycleInputs) -> Assessment {
    let snapshot = &inputs.snapshot;
    let verdict = evaluate(waterways, snapshot);

    let waterway_assessments = waterways
        .iter()
        .map(|waterway| {
            let gauge = snapshot.gauge(&waterway.id).cloned().unwrap_or_default();
            let forecast_peak = inputs
                .forecasts
                .get(&waterway.id)
                .and_then(|f| f.peak())
                .cloned();
            let forecast_tier = forecast_peak
                .as_ref()
                .map(|peak| classify_for(waterway, Some(peak.stage_ft)));

            WaterwayAssessment {
                id: waterway.id.clone(),
                name: waterway.name.clone(),
                location: waterway.location.clone(),
                color: waterway.color.clone(),
                stage: classify_for(waterway, gauge.stage_ft),
                current_speed_mph: estimate_current_speed_mph(gauge.flow_cfs),
                upstream: inputs.upstream.get(&waterway.id).cloned(),
                forecast_peak,
                forecast_tier,
                gauge,
            }
        })
        .collect();

    let today = &snapshot.weather.today;
    let cso = cso_risk(today.precip_sum_in, today.precip_probability_pct);

    Assessment {
        cycle,
        as_of: snapshot.as_of,
        verdict,
        waterways: waterway_assessments,
        fog_risk: fog_risk(snapshot.weather.visibility_mi()),
        cso_risk: cso,
        cso_outlook: cso_outlook(inputs.soak, cso),
        soak: inputs.soak,
        conditions: snapshot.clone(),
        providers: inputs.providers.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::VerdictTier;
    use crate::stage::StageTier;
    use chrono::TimeZone;

    fn waterway(id: &str, action: f64, flood: f64) -> WaterwayConfig {
        WaterwayConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            location: "Somewhere".to_string(),
            site_id: "03085000".to_string(),
            color: "#4FC3F7".to_string(),
            action_stage_ft: action,
            flood_stage_ft: flood,
            nwps_id: None,
            upstream: None,
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_total_outage_assessment() {
        let waterways = vec![waterway("mon", 17.0, 25.0), waterway("ohio", 16.0, 24.0)];
        let inputs = CycleInputs::unavailable(as_of(), "offline");

        let assessment = assess(4, &waterways, &inputs);
        assert_eq!(assessment.cycle, 4);
        assert_eq!(assessment.verdict.tier(), VerdictTier::Favorable);
        assert_eq!(assessment.waterways.len(), 2);
        assert_eq!(assessment.waterways[0].stage.tier, StageTier::Unknown);
        assert_eq!(assessment.waterways[0].current_speed_mph, None);
        assert_eq!(assessment.fog_risk, None);
        assert_eq!(assessment.cso_outlook, CsoOutlook::Unknown);
        assert_eq!(assessment.unavailable_providers().len(), 7);
    }

    #[test]
    fn test_waterway_details_and_forecast_tier() {
        let waterways = vec![waterway("mon", 17.0, 25.0)];
        let mut inputs = CycleInputs::unavailable(as_of(), "offline");
        inputs.snapshot.gauges.insert(
            "mon".to_string(),
            GaugeReading {
                flow_cfs: Some(20_000.0),
                stage_ft: Some(15.0),
                ..Default::default()
            },
        );
        inputs.forecasts.insert(
            "mon".to_string(),
            RiverForecast {
                points: vec![
                    ForecastPoint {
                        valid_time: as_of(),
                        stage_ft: 16.0,
                    },
                    ForecastPoint {
                        valid_time: as_of() + chrono::Duration::hours(6),
                        stage_ft: 18.2,
                    },
                ],
            },
        );

        let assessment = assess(1, &waterways, &inputs);
        let mon = &assessment.waterways[0];
        assert_eq!(mon.stage.tier, StageTier::Elevated);
        assert!((mon.current_speed_mph.unwrap() - 0.72).abs() < 1e-9);
        assert_eq!(mon.forecast_peak.as_ref().unwrap().stage_ft, 18.2);
        assert_eq!(mon.forecast_tier.as_ref().unwrap().tier, StageTier::Action);
        // Forecasts never feed the verdict.
        assert_eq!(assessment.verdict.tier(), VerdictTier::Favorable);
    }

    #[test]
    fn test_reported_overflow_wins_over_proxy() {
        let waterways = vec![waterway("mon", 17.0, 25.0)];
        let mut inputs = CycleInputs::unavailable(as_of(), "offline");
        inputs.snapshot.weather.today.precip_sum_in = Some(0.0);
        inputs.snapshot.weather.today.precip_probability_pct = Some(5.0);
        inputs.soak = SoakStatus::OverflowActive;

        let assessment = assess(1, &waterways, &inputs);
        assert_eq!(assessment.cso_risk, Some(CsoRisk::Low));
        assert_eq!(
            assessment.cso_outlook,
            CsoOutlook::Reported(SoakStatus::OverflowActive)
        );
    }

    #[test]
    fn test_provider_status_lookup() {
        let waterways = vec![waterway("mon", 17.0, 25.0)];
        let mut inputs = CycleInputs::unavailable(as_of(), "offline");
        inputs.providers[0].status = ProviderStatus::Fresh;

        let assessment = assess(1, &waterways, &inputs);
        assert_eq!(
            assessment.provider_status(Provider::UsgsCurrent),
            Some(&ProviderStatus::Fresh)
        );
        assert_eq!(assessment.unavailable_providers().len(), 6);
    }
}
