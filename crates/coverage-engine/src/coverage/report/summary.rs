use super::super::aggregate::AggregateResult;
use super::super::config::AnalyticsConfig;
use super::super::domain::CoverageTier;
use super::super::geography::{low_coverage_districts, tier_counts, DistrictSummary};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCount {
    pub tier: CoverageTier,
    pub tier_label: &'static str,
    pub districts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowCoverageAlert {
    pub district: String,
    pub coverage: f64,
}

/// Headline indicators shown at the top of every export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub overall_coverage: Option<f64>,
    pub target_threshold: f64,
    pub target_met: Option<bool>,
    /// Percentage of records at or above the target.
    pub target_achievement: Option<f64>,
    pub record_count: usize,
    pub population: f64,
    pub district_count: usize,
    pub vaccine_count: usize,
    pub tiers: Vec<TierCount>,
    pub alert_threshold: f64,
    pub low_coverage_alerts: Vec<LowCoverageAlert>,
}

impl KpiSummary {
    pub fn from_parts(
        aggregate: &AggregateResult,
        districts: &[DistrictSummary],
        config: &AnalyticsConfig,
    ) -> Self {
        let tiers = tier_counts(districts)
            .into_iter()
            .map(|(tier, count)| TierCount {
                tier,
                tier_label: tier.label(),
                districts: count,
            })
            .collect();

        let low_coverage_alerts = low_coverage_districts(districts, config)
            .into_iter()
            .map(|district| LowCoverageAlert {
                district: district.district.clone(),
                coverage: district.coverage,
            })
            .collect();

        Self {
            overall_coverage: aggregate.overall_coverage,
            target_threshold: aggregate.target_threshold,
            target_met: aggregate
                .overall_coverage
                .map(|rate| rate >= aggregate.target_threshold),
            target_achievement: aggregate.target_achievement(),
            record_count: aggregate.record_count,
            population: aggregate.population,
            district_count: districts.len(),
            vaccine_count: aggregate.by_vaccine.len(),
            tiers,
            alert_threshold: config.alert_threshold,
            low_coverage_alerts,
        }
    }

    pub fn tier_count(&self, tier: CoverageTier) -> usize {
        self.tiers
            .iter()
            .find(|entry| entry.tier == tier)
            .map(|entry| entry.districts)
            .unwrap_or(0)
    }
}
