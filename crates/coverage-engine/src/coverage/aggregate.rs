use super::config::AnalyticsConfig;
use super::domain::VaccinationRecord;
use super::filter::FilterSet;
use serde::Serialize;
use std::collections::BTreeMap;

/// Running Σ(coverage × weight) and Σ(weight) for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedAccumulator {
    weighted_sum: f64,
    population: f64,
    count: usize,
}

impl WeightedAccumulator {
    pub fn add(&mut self, record: &VaccinationRecord) {
        self.weighted_sum += record.coverage_percentage * record.population_weight;
        self.population += record.population_weight;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn population(&self) -> f64 {
        self.population
    }

    /// `None` when nothing was added; never a fabricated zero.
    ///
    /// Sums that left the finite range also give `None`, so a NaN never
    /// reaches tiers or exports.
    pub fn rate(&self) -> Option<f64> {
        if self.count == 0 || self.population <= 0.0 {
            return None;
        }
        let rate = self.weighted_sum / self.population;
        rate.is_finite().then(|| rate.clamp(0.0, 100.0))
    }
}

impl<'a> FromIterator<&'a VaccinationRecord> for WeightedAccumulator {
    fn from_iter<I: IntoIterator<Item = &'a VaccinationRecord>>(iter: I) -> Self {
        let mut accumulator = Self::default();
        for record in iter {
            accumulator.add(record);
        }
        accumulator
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaccineCoverage {
    pub vaccine_type: String,
    pub vaccine_key: String,
    pub coverage: f64,
    pub record_count: usize,
    pub population: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub record_count: usize,
    pub population: f64,
    /// `None` reports "no data" for an empty active subset.
    pub overall_coverage: Option<f64>,
    pub by_vaccine: Vec<VaccineCoverage>,
    pub below_target: usize,
    pub meeting_target: usize,
    pub target_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no data for this selection ({selection})")]
pub struct NoDataError {
    pub selection: String,
}

impl AggregateResult {
    pub fn is_no_data(&self) -> bool {
        self.overall_coverage.is_none()
    }

    pub fn require_data(&self, filters: &FilterSet) -> Result<f64, NoDataError> {
        self.overall_coverage.ok_or_else(|| NoDataError {
            selection: filters.describe(),
        })
    }

    pub fn vaccine(&self, vaccine_key: &str) -> Option<&VaccineCoverage> {
        self.by_vaccine
            .iter()
            .find(|entry| entry.vaccine_key == vaccine_key)
    }

    /// Share of records at or above the target, as a percentage.
    pub fn target_achievement(&self) -> Option<f64> {
        if self.record_count == 0 {
            return None;
        }
        Some(self.meeting_target as f64 / self.record_count as f64 * 100.0)
    }
}

/// Filters the canonical records and aggregates the resulting active subset.
pub fn aggregate(
    records: &[VaccinationRecord],
    filters: &FilterSet,
    config: &AnalyticsConfig,
) -> AggregateResult {
    summarize_subset(&filters.apply(records), config)
}

/// Aggregates an already filtered active subset.
pub fn summarize_subset(subset: &[&VaccinationRecord], config: &AnalyticsConfig) -> AggregateResult {
    let overall: WeightedAccumulator = subset.iter().copied().collect();
    let meeting_target = subset
        .iter()
        .filter(|record| record.coverage_percentage >= config.target_threshold)
        .count();

    AggregateResult {
        record_count: overall.count(),
        population: overall.population(),
        overall_coverage: overall.rate(),
        by_vaccine: vaccine_breakdown(subset.iter().copied()),
        below_target: subset.len() - meeting_target,
        meeting_target,
        target_threshold: config.target_threshold,
    }
}

/// Per-vaccine weighted rates ordered by vaccine key. The display name is the
/// first spelling seen for each key.
pub fn vaccine_breakdown<'a>(
    records: impl IntoIterator<Item = &'a VaccinationRecord>,
) -> Vec<VaccineCoverage> {
    let mut groups: BTreeMap<&str, (&str, WeightedAccumulator)> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.vaccine_key.as_str())
            .or_insert_with(|| (record.vaccine_type.as_str(), WeightedAccumulator::default()))
            .1
            .add(record);
    }

    groups
        .into_iter()
        .filter_map(|(key, (display, accumulator))| {
            accumulator.rate().map(|coverage| VaccineCoverage {
                vaccine_type: display.to_string(),
                vaccine_key: key.to_string(),
                coverage,
                record_count: accumulator.count(),
                population: accumulator.population(),
            })
        })
        .collect()
}
