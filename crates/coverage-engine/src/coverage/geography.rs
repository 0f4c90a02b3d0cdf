use super::aggregate::{vaccine_breakdown, VaccineCoverage, WeightedAccumulator};
use super::config::{AnalyticsConfig, TierBoundaries};
use super::domain::{CoverageTier, VaccinationRecord};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictSummary {
    pub district: String,
    pub coverage: f64,
    pub tier: CoverageTier,
    pub tier_label: &'static str,
    pub record_count: usize,
    pub population: f64,
    pub min_coverage: f64,
    pub max_coverage: f64,
    pub children: usize,
    pub villages: usize,
    pub vaccines: Vec<VaccineCoverage>,
}

struct DistrictGroup<'a> {
    display: &'a str,
    records: Vec<&'a VaccinationRecord>,
}

/// Per-district rollups over the active subset, best covered first.
///
/// Only districts with at least one record in the subset appear; a district
/// that was filtered for but has no data is omitted rather than shown at zero.
pub fn summarize_districts(
    subset: &[&VaccinationRecord],
    tiers: &TierBoundaries,
) -> Vec<DistrictSummary> {
    let mut groups: BTreeMap<&str, DistrictGroup<'_>> = BTreeMap::new();
    for &record in subset {
        groups
            .entry(record.district_key.as_str())
            .or_insert_with(|| DistrictGroup {
                display: record.district.as_str(),
                records: Vec::new(),
            })
            .records
            .push(record);
    }

    let mut summaries: Vec<DistrictSummary> = groups
        .into_values()
        .filter_map(|group| summarize_group(group, tiers))
        .collect();

    summaries.sort_by(|a, b| {
        b.coverage
            .partial_cmp(&a.coverage)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.district.cmp(&b.district))
    });
    summaries
}

fn summarize_group(group: DistrictGroup<'_>, tiers: &TierBoundaries) -> Option<DistrictSummary> {
    let accumulator: WeightedAccumulator = group.records.iter().copied().collect();
    let coverage = accumulator.rate()?;
    let tier = tiers.classify(coverage);

    let (min_coverage, max_coverage) = group.records.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(min, max), record| {
            (
                min.min(record.coverage_percentage),
                max.max(record.coverage_percentage),
            )
        },
    );

    let children: BTreeSet<&str> = group
        .records
        .iter()
        .filter_map(|record| record.child_id.as_deref())
        .collect();
    let villages: BTreeSet<&str> = group
        .records
        .iter()
        .filter_map(|record| record.village.as_deref())
        .collect();

    Some(DistrictSummary {
        district: group.display.to_string(),
        coverage,
        tier,
        tier_label: tier.label(),
        record_count: accumulator.count(),
        population: accumulator.population(),
        min_coverage,
        max_coverage,
        children: children.len(),
        villages: villages.len(),
        vaccines: vaccine_breakdown(group.records.iter().copied()),
    })
}

/// Districts below the alert threshold, lowest rate first.
pub fn low_coverage_districts<'a>(
    districts: &'a [DistrictSummary],
    config: &AnalyticsConfig,
) -> Vec<&'a DistrictSummary> {
    let mut alerts: Vec<&DistrictSummary> = districts
        .iter()
        .filter(|district| district.coverage < config.alert_threshold)
        .collect();
    alerts.sort_by(|a, b| a.coverage.partial_cmp(&b.coverage).unwrap_or(Ordering::Equal));
    alerts
}

pub fn tier_counts(districts: &[DistrictSummary]) -> [(CoverageTier, usize); 3] {
    CoverageTier::ordered().map(|tier| {
        let count = districts.iter().filter(|district| district.tier == tier).count();
        (tier, count)
    })
}
