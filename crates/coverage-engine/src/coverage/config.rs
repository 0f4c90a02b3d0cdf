use super::domain::CoverageTier;
use serde::{Deserialize, Serialize};

/// Thresholds and limits steering aggregation, classification and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Coverage at or above this rate counts as target achievement.
    pub target_threshold: f64,
    pub tiers: TierBoundaries,
    /// Districts below this rate are listed as low-coverage alerts.
    pub alert_threshold: f64,
    /// A vaccine trailing the overall rate by more than this many points is flagged.
    pub vaccine_gap_points: f64,
    /// A falling trend is only reported once it exceeds this many points.
    pub trend_tolerance: f64,
    /// Spread between recorded genders that triggers an equity note.
    pub gender_gap_points: f64,
    /// Calendar months this far below the mean monthly rate are flagged.
    pub seasonal_dip_points: f64,
    /// Age groups under this rate get an outreach note.
    pub age_group_floor: f64,
    /// Distinct vaccines a child needs before counting as fully vaccinated.
    pub required_vaccine_count: usize,
    pub max_export_rows: usize,
    pub cache_capacity: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            target_threshold: 90.0,
            tiers: TierBoundaries::default(),
            alert_threshold: 70.0,
            vaccine_gap_points: 15.0,
            trend_tolerance: 2.0,
            gender_gap_points: 10.0,
            seasonal_dip_points: 5.0,
            age_group_floor: 80.0,
            required_vaccine_count: 6,
            max_export_rows: 50_000,
            cache_capacity: 64,
        }
    }
}

/// Lower bounds of the Green and Orange tiers; anything below Orange is Red.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBoundaries {
    pub green_min: f64,
    pub orange_min: f64,
}

impl Default for TierBoundaries {
    fn default() -> Self {
        Self {
            green_min: 90.0,
            orange_min: 75.0,
        }
    }
}

impl TierBoundaries {
    /// Boundaries are inclusive on the lower edge, so exact ties take the higher tier.
    pub fn classify(&self, coverage: f64) -> CoverageTier {
        if coverage >= self.green_min {
            CoverageTier::Green
        } else if coverage >= self.orange_min {
            CoverageTier::Orange
        } else {
            CoverageTier::Red
        }
    }
}
