use crate::config::WaterwayConfig;
use std::fmt;

/// Width of the elevated band below action stage, in feet.
pub const ELEVATED_BAND_FT: f64 = 3.0;

/// Stage severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageTier {
    Unknown,
    Normal,
    Elevated,
    Action,
    Flood,
}

impl fmt::Display for StageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageTier::Unknown => "UNKNOWN",
            StageTier::Normal => "NORMAL",
            StageTier::Elevated => "ELEVATED",
            StageTier::Action => "ACTION STAGE",
            StageTier::Flood => "FLOOD STAGE",
        };
        write!(f, "{}", name)
    }
}

/// Presentation color for a severity, independent of any rendering toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorToken {
    Muted,
    Good,
    Elevated,
    Warning,
    Danger,
}

impl ColorToken {
    pub fn hex(&self) -> &'static str {
        match self {
            ColorToken::Muted => "#546e7a",
            ColorToken::Good => "#66bb6a",
            ColorToken::Elevated => "#ffcc80",
            ColorToken::Warning => "#ffa726",
            ColorToken::Danger => "#ef5350",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageStatus {
    pub tier: StageTier,
    pub label: String,
    pub color: ColorToken,
}

/// Classify a stage reading against action and flood thresholds.
///
/// Both thresholds are inclusive: a stage exactly at flood stage is `Flood`.
pub fn classify_stage(stage_ft: Option<f64>, action_stage_ft: f64, flood_stage_ft: f64) -> StageStatus {
    let Some(stage) = stage_ft else {
        return StageStatus {
            tier: StageTier::Unknown,
            label: "—".to_string(),
            color: ColorToken::Muted,
        };
    };

    let (tier, color) = if stage >= flood_stage_ft {
        (StageTier::Flood, ColorToken::Danger)
    } else if stage >= action_stage_ft {
        (StageTier::Action, ColorToken::Warning)
    } else if stage >= action_stage_ft - ELEVATED_BAND_FT {
        (StageTier::Elevated, ColorToken::Elevated)
    } else {
        (StageTier::Normal, ColorToken::Good)
    };

    StageStatus {
        tier,
        label: format!("{} ({:.2} ft)", tier, stage),
        color,
    }
}

/// `classify_stage` using a waterway's configured thresholds.
pub fn classify_for(waterway: &WaterwayConfig, stage_ft: Option<f64>) -> StageStatus {
    classify_stage(stage_ft, waterway.action_stage_ft, waterway.flood_stage_ft)
}
