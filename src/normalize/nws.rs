use super::NormalizeStats;
use crate::config::AlertKeywords;
use crate::error::{AppError, Result};
use crate::model::{AlertCategory, AlertEvent};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct AlertCollection {
    #[serde(default)]
    features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: AlertProperties,
}

#[derive(Debug, Deserialize)]
struct AlertProperties {
    event: String,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    expires: Option<String>,
}

/// Flood keywords are checked first, so "Flash Flood Warning" with a
/// thunderstorm in its text is still a flood alert.
pub fn classify_alert(event: &str, keywords: &AlertKeywords) -> AlertCategory {
    let event = event.to_lowercase();
    let matches = |words: &[String]| {
        words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .any(|w| !w.is_empty() && event.contains(&w))
    };

    if matches(keywords.flood_keywords.as_slice()) {
        AlertCategory::Flood
    } else if matches(keywords.storm_keywords.as_slice()) {
        AlertCategory::Storm
    } else {
        AlertCategory::Other
    }
}

pub fn parse_alerts(
    body: &str,
    keywords: &AlertKeywords,
) -> Result<(Vec<AlertEvent>, NormalizeStats)> {
    let collection: AlertCollection = serde_json::from_str(body)
        .map_err(|e| AppError::Parse(format!("NWS alerts: {}", e)))?;

    let mut alerts = Vec::with_capacity(collection.features.len());
    let mut stats = NormalizeStats::new();

    for (index, raw) in collection.features.into_iter().enumerate() {
        let feature: Feature = match serde_json::from_value(raw) {
            Ok(feature) => feature,
            Err(e) => {
                stats.record_malformed("NWS alert", index, &e.to_string());
                continue;
            }
        };

        let props = feature.properties;
        let expires = match props.expires.as_deref().filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(dt) => Some(dt.with_timezone(&Utc)),
                Err(e) => {
                    warn!(
                        "Alert '{}' has unparseable expiry '{}': {}; treating as open-ended",
                        props.event, raw, e
                    );
                    None
                }
            },
        };

        alerts.push(AlertEvent {
            category: classify_alert(&props.event, keywords),
            event: props.event,
            headline: props.headline.unwrap_or_default(),
            severity: props.severity.unwrap_or_default(),
            expires,
        });
        stats.record_ok();
    }

    Ok((alerts, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ALERTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "id": "urn:oid:1",
                "type": "Feature",
                "properties": {
                    "event": "Flood Warning",
                    "headline": "Flood Warning issued May 1 at 6:02AM EDT",
                    "severity": "Severe",
                    "expires": "2024-05-01T18:00:00-04:00"
                }
            },
            {
                "id": "urn:oid:2",
                "type": "Feature",
                "properties": {
                    "event": "Severe Thunderstorm Watch",
                    "severity": "Moderate",
                    "expires": null
                }
            },
            {
                "id": "urn:oid:3",
                "type": "Feature",
                "properties": { "headline": "no event field" }
            },
            {
                "id": "urn:oid:4",
                "type": "Feature",
                "properties": {
                    "event": "Air Quality Alert",
                    "expires": "tomorrow-ish"
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_and_classify() {
        let (alerts, stats) = parse_alerts(ALERTS, &AlertKeywords::default()).unwrap();
        assert_eq!(alerts.len(), 3);
        assert_eq!(stats.malformed, 1);

        assert_eq!(alerts[0].category, AlertCategory::Flood);
        assert_eq!(
            alerts[0].expires,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 22, 0, 0).unwrap())
        );
        assert_eq!(alerts[1].category, AlertCategory::Storm);
        assert_eq!(alerts[1].headline, "");
        assert_eq!(alerts[1].expires, None);
        assert_eq!(alerts[2].category, AlertCategory::Other);
        assert_eq!(alerts[2].expires, None);
    }

    #[test]
    fn test_flood_keywords_take_precedence() {
        let keywords = AlertKeywords::default();
        assert_eq!(
            classify_alert("Flash Flood Warning", &keywords),
            AlertCategory::Flood
        );
        assert_eq!(
            classify_alert("FLOOD WATCH / THUNDERSTORM", &keywords),
            AlertCategory::Flood
        );
        assert_eq!(classify_alert("Tornado Warning", &keywords), AlertCategory::Storm);
        assert_eq!(classify_alert("Heat Advisory", &keywords), AlertCategory::Other);
    }

    #[test]
    fn test_custom_keywords() {
        let keywords = AlertKeywords {
            flood_keywords: vec!["Hydrologic".to_string()],
            storm_keywords: vec![],
        };
        assert_eq!(
            classify_alert("Hydrologic Outlook", &keywords),
            AlertCategory::Flood
        );
        assert_eq!(classify_alert("Flood Warning", &keywords), AlertCategory::Other);
    }

    #[test]
    fn test_empty_collection() {
        let (alerts, stats) =
            parse_alerts(r#"{"type":"FeatureCollection","features":[]}"#, &AlertKeywords::default())
                .unwrap();
        assert!(alerts.is_empty());
        assert_eq!(stats.total_records, 0);
    }
}
