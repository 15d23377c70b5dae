use chrono::{DateTime, TimeZone, Utc};
use river_conditions::assessment::{assess, CycleInputs};
use river_conditions::config::WaterwayConfig;
use river_conditions::estimators::{cso_risk, fog_risk, CsoRisk, FogRisk};
use river_conditions::model::{AlertCategory, AlertEvent, ConditionsSnapshot, GaugeReading};
use river_conditions::scoring::{evaluate, VerdictTier};
use river_conditions::stage::{classify_for, StageTier};

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 16, 0, 0).unwrap()
}

fn river(id: &str, name: &str, action: f64, flood: f64) -> WaterwayConfig {
    WaterwayConfig {
        id: id.to_string(),
        name: name.to_string(),
        location: String::new(),
        site_id: "03085000".to_string(),
        color: "#4FC3F7".to_string(),
        action_stage_ft: action,
        flood_stage_ft: flood,
        nwps_id: None,
        upstream: None,
    }
}

fn pittsburgh() -> Vec<WaterwayConfig> {
    vec![
        river("monongahela", "Monongahela", 17.0, 25.0),
        river("allegheny", "Allegheny", 18.0, 25.0),
        river("ohio", "Ohio", 16.0, 24.0),
    ]
}

fn with_stage(snapshot: &mut ConditionsSnapshot, id: &str, stage_ft: f64) {
    snapshot.gauges.insert(
        id.to_string(),
        GaugeReading {
            stage_ft: Some(stage_ft),
            ..Default::default()
        },
    );
}

fn flood_alert(expires: Option<DateTime<Utc>>) -> AlertEvent {
    AlertEvent {
        category: AlertCategory::Flood,
        event: "Flood Warning".to_string(),
        headline: "Flood Warning for the Ohio River".to_string(),
        severity: "Severe".to_string(),
        expires,
    }
}

/// Every input present and bad at once.
fn clearly_danger() -> ConditionsSnapshot {
    let mut snapshot = ConditionsSnapshot::empty(as_of());
    with_stage(&mut snapshot, "monongahela", 26.0);
    with_stage(&mut snapshot, "allegheny", 19.0);
    with_stage(&mut snapshot, "ohio", 10.0);
    snapshot.alerts.push(flood_alert(None));
    snapshot.weather.wind_speed_mph = Some(31.0);
    snapshot.weather.today.precip_probability_pct = Some(90.0);
    snapshot.weather.today.precip_sum_in = Some(1.2);
    snapshot.weather.visibility_m = Some(400.0);
    snapshot.weather.weather_code = Some(96);
    snapshot.air_quality.us_aqi = Some(180);
    snapshot
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Level {
    Quiet,
    Warn,
    Issue,
}

/// Levels each global rule can actually produce.
const ALERT_LEVELS: [Level; 2] = [Level::Quiet, Level::Issue];
const WIND_LEVELS: [Level; 3] = [Level::Quiet, Level::Warn, Level::Issue];
const PRECIP_LEVELS: [Level; 2] = [Level::Quiet, Level::Warn];
const AQI_LEVELS: [Level; 3] = [Level::Quiet, Level::Warn, Level::Issue];
const VISIBILITY_LEVELS: [Level; 3] = [Level::Quiet, Level::Warn, Level::Issue];
const CODE_LEVELS: [Level; 2] = [Level::Quiet, Level::Issue];

#[test]
fn test_truth_table_global_rules_by_stage_state() {
    let waterways = vec![river("mon", "Monongahela", 17.0, 25.0)];
    // normal, action, flood
    let stages = [(10.0, Level::Quiet), (18.0, Level::Issue), (25.5, Level::Issue)];

    let mut combinations = 0;
    for &(stage, stage_level) in &stages {
        for alert in ALERT_LEVELS {
            for wind in WIND_LEVELS {
                for precip in PRECIP_LEVELS {
                    for aqi in AQI_LEVELS {
                        for visibility in VISIBILITY_LEVELS {
                            for code in CODE_LEVELS {
                                let mut snapshot = ConditionsSnapshot::empty(as_of());
                                with_stage(&mut snapshot, "mon", stage);

                                if alert == Level::Issue {
                                    snapshot.alerts.push(flood_alert(None));
                                }
                                snapshot.weather.wind_speed_mph = Some(match wind {
                                    Level::Quiet => 5.0,
                                    Level::Warn => 20.0,
                                    Level::Issue => 30.0,
                                });
                                snapshot.weather.today.precip_probability_pct =
                                    Some(if precip == Level::Warn { 85.0 } else { 10.0 });
                                snapshot.weather.today.precip_sum_in = Some(0.0);
                                snapshot.air_quality.us_aqi = Some(match aqi {
                                    Level::Quiet => 40,
                                    Level::Warn => 120,
                                    Level::Issue => 175,
                                });
                                snapshot.weather.visibility_m = Some(match visibility {
                                    Level::Quiet => 16_000.0,
                                    Level::Warn => 2_896.8,
                                    Level::Issue => 480.0,
                                });
                                snapshot.weather.weather_code =
                                    Some(if code == Level::Issue { 95 } else { 2 });

                                let levels =
                                    [stage_level, alert, wind, precip, aqi, visibility, code];
                                let expected_issues =
                                    levels.iter().filter(|l| **l == Level::Issue).count();
                                let expected_warnings =
                                    levels.iter().filter(|l| **l == Level::Warn).count();
                                let expected_tier = if expected_issues > 0 {
                                    VerdictTier::Danger
                                } else if expected_warnings > 0 {
                                    VerdictTier::Caution
                                } else {
                                    VerdictTier::Favorable
                                };

                                let verdict = evaluate(&waterways, &snapshot);
                                assert_eq!(verdict.tier(), expected_tier, "{:?}", levels);
                                assert_eq!(verdict.issues().len(), expected_issues, "{:?}", levels);
                                assert_eq!(
                                    verdict.warnings().len(),
                                    expected_warnings,
                                    "{:?}",
                                    levels
                                );
                                combinations += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    assert_eq!(combinations, 3 * 2 * 3 * 2 * 3 * 3 * 2);
}

#[test]
fn test_scenario_stage_exactly_at_flood() {
    let waterways = vec![river("mon", "Monongahela", 17.0, 25.0)];
    let mut snapshot = ConditionsSnapshot::empty(as_of());
    with_stage(&mut snapshot, "mon", 25.0);

    assert_eq!(classify_for(&waterways[0], Some(25.0)).tier, StageTier::Flood);

    let verdict = evaluate(&waterways, &snapshot);
    assert_eq!(verdict.tier(), VerdictTier::Danger);
    assert_eq!(verdict.issues(), ["Monongahela at FLOOD STAGE"]);
}

#[test]
fn test_scenario_wind_warning_versus_issue() {
    let waterways = pittsburgh();
    let mut snapshot = ConditionsSnapshot::empty(as_of());

    snapshot.weather.wind_speed_mph = Some(20.0);
    let verdict = evaluate(&waterways, &snapshot);
    assert_eq!(verdict.tier(), VerdictTier::Caution);
    assert_eq!(verdict.warnings(), ["HIGH WIND (20 mph)"]);
    assert!(verdict.issues().is_empty());

    snapshot.weather.wind_speed_mph = Some(30.0);
    let verdict = evaluate(&waterways, &snapshot);
    assert_eq!(verdict.tier(), VerdictTier::Danger);
    assert_eq!(verdict.issues(), ["DANGEROUS WIND (30 mph)"]);
    assert!(verdict.warnings().is_empty());
}

#[test]
fn test_scenario_total_outage_is_favorable() {
    let waterways = pittsburgh();
    let inputs = CycleInputs::unavailable(as_of(), "connection refused");

    let assessment = assess(1, &waterways, &inputs);
    assert_eq!(assessment.verdict.tier(), VerdictTier::Favorable);
    assert_eq!(assessment.verdict.factors().count(), 0);
    assert_eq!(assessment.verdict.detail(), "All systems normal");
    assert_eq!(assessment.unavailable_providers().len(), 7);
    assert!(assessment
        .waterways
        .iter()
        .all(|w| w.stage.tier == StageTier::Unknown));
}

#[test]
fn test_scenario_cso_sum_alone_is_high() {
    assert_eq!(cso_risk(Some(0.6), Some(10.0)), Some(CsoRisk::High));
}

#[test]
fn test_scenario_fog_boundaries() {
    let waterways = pittsburgh();
    let mut snapshot = ConditionsSnapshot::empty(as_of());

    // 1.8 mi
    snapshot.weather.visibility_m = Some(2_896.8);
    assert_eq!(fog_risk(snapshot.weather.visibility_mi()), Some(FogRisk::Moderate));
    let verdict = evaluate(&waterways, &snapshot);
    assert_eq!(verdict.warnings(), ["REDUCED VISIBILITY/FOG"]);

    // 2.0 mi
    snapshot.weather.visibility_m = Some(3_218.68);
    assert_eq!(fog_risk(snapshot.weather.visibility_mi()), Some(FogRisk::Low));
    let verdict = evaluate(&waterways, &snapshot);
    assert_eq!(verdict.tier(), VerdictTier::Favorable);
}

#[test]
fn test_absence_safety_never_drops_unrelated_issues() {
    let waterways = pittsburgh();
    let full = evaluate(&waterways, &clearly_danger());
    assert_eq!(full.tier(), VerdictTier::Danger);

    type Strip = fn(&mut ConditionsSnapshot) -> &'static str;
    let strips: [Strip; 8] = [
        |s| {
            s.gauges.remove("monongahela");
            "Monongahela at FLOOD STAGE"
        },
        |s| {
            s.gauges.remove("allegheny");
            "Allegheny at ACTION STAGE"
        },
        |s| {
            s.alerts.clear();
            "NWS FLOOD ALERT ACTIVE"
        },
        |s| {
            s.weather.wind_speed_mph = None;
            "DANGEROUS WIND (31 mph)"
        },
        |s| {
            s.weather.today.precip_probability_pct = None;
            s.weather.today.precip_sum_in = None;
            "RAIN / CSO RISK"
        },
        |s| {
            s.air_quality.us_aqi = None;
            "POOR AIR QUALITY (AQI 180)"
        },
        |s| {
            s.weather.visibility_m = None;
            "DENSE FOG / LIMITED VISIBILITY"
        },
        |s| {
            s.weather.weather_code = None;
            "THUNDERSTORM ACTIVE"
        },
    ];

    for strip in strips {
        let mut snapshot = clearly_danger();
        let removed = strip(&mut snapshot);
        let verdict = evaluate(&waterways, &snapshot);

        let expected: Vec<&String> = full.factors().filter(|f| f.as_str() != removed).collect();
        let actual: Vec<&String> = verdict.factors().collect();
        assert_eq!(actual, expected, "after removing input for {}", removed);
        assert_eq!(verdict.tier(), VerdictTier::Danger);
    }
}

#[test]
fn test_factor_order_follows_waterway_list_then_rules() {
    let waterways = pittsburgh();
    let verdict = evaluate(&waterways, &clearly_danger());

    assert_eq!(
        verdict.issues(),
        [
            "Monongahela at FLOOD STAGE",
            "Allegheny at ACTION STAGE",
            "NWS FLOOD ALERT ACTIVE",
            "DANGEROUS WIND (31 mph)",
            "POOR AIR QUALITY (AQI 180)",
            "DENSE FOG / LIMITED VISIBILITY",
            "THUNDERSTORM ACTIVE",
        ]
    );
    assert_eq!(verdict.warnings(), ["RAIN / CSO RISK"]);
    assert_eq!(
        verdict.detail(),
        "Monongahela at FLOOD STAGE · Allegheny at ACTION STAGE"
    );
}

#[test]
fn test_evaluation_is_idempotent() {
    let waterways = pittsburgh();
    let snapshot = clearly_danger();
    let before = snapshot.clone();

    let first = evaluate(&waterways, &snapshot);
    let second = evaluate(&waterways, &snapshot);

    assert_eq!(first, second);
    assert_eq!(snapshot, before);
}

#[test]
fn test_expired_flood_alert_is_ignored() {
    let waterways = pittsburgh();
    let mut snapshot = ConditionsSnapshot::empty(as_of());
    snapshot
        .alerts
        .push(flood_alert(Some(as_of() - chrono::Duration::minutes(1))));

    assert_eq!(evaluate(&waterways, &snapshot).tier(), VerdictTier::Favorable);

    snapshot.alerts[0].expires = Some(as_of() + chrono::Duration::hours(2));
    assert_eq!(evaluate(&waterways, &snapshot).tier(), VerdictTier::Danger);
}

#[test]
fn test_storm_alert_alone_is_not_an_issue() {
    let waterways = pittsburgh();
    let mut snapshot = ConditionsSnapshot::empty(as_of());
    let mut alert = flood_alert(None);
    alert.category = AlertCategory::Storm;
    alert.event = "Severe Thunderstorm Warning".to_string();
    snapshot.alerts.push(alert);

    assert_eq!(evaluate(&waterways, &snapshot).tier(), VerdictTier::Favorable);
}

#[test]
fn test_zero_readings_are_values_not_absence() {
    let waterways = vec![river("mon", "Monongahela", 0.0, 5.0)];
    let mut snapshot = ConditionsSnapshot::empty(as_of());
    with_stage(&mut snapshot, "mon", 0.0);
    snapshot.weather.visibility_m = Some(0.0);

    let verdict = evaluate(&waterways, &snapshot);
    assert_eq!(
        verdict.issues(),
        ["Monongahela at ACTION STAGE", "DENSE FOG / LIMITED VISIBILITY"]
    );
}
