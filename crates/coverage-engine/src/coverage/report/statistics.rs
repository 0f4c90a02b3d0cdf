use super::super::config::AnalyticsConfig;
use super::super::domain::{Gender, VaccinationRecord};
use super::super::geography::DistrictSummary;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Row-level distribution figures and population counts for the active subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageStatistics {
    pub median_coverage: Option<f64>,
    pub min_coverage: Option<f64>,
    pub max_coverage: Option<f64>,
    /// Sample standard deviation; needs at least two rows.
    pub std_dev_coverage: Option<f64>,
    pub districts_meeting_target: usize,
    pub districts_below_alert: usize,
    pub children: usize,
    pub districts: usize,
    pub villages: usize,
    pub male_children: usize,
    pub female_children: usize,
    pub fully_vaccinated: usize,
}

impl CoverageStatistics {
    pub fn compute(
        subset: &[&VaccinationRecord],
        districts: &[DistrictSummary],
        config: &AnalyticsConfig,
    ) -> Self {
        let mut values: Vec<f64> = subset
            .iter()
            .map(|record| record.coverage_percentage)
            .collect();
        values.sort_by(f64::total_cmp);

        let mut children = BTreeSet::new();
        let mut villages = BTreeSet::new();
        let mut district_keys = BTreeSet::new();
        let mut male = BTreeSet::new();
        let mut female = BTreeSet::new();
        let mut vaccines_per_child: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        for record in subset {
            district_keys.insert(record.district_key.as_str());
            if let Some(village) = record.village.as_deref() {
                villages.insert(village);
            }
            let Some(child) = record.child_id.as_deref() else {
                continue;
            };
            children.insert(child);
            match record.gender {
                Some(Gender::Male) => {
                    male.insert(child);
                }
                Some(Gender::Female) => {
                    female.insert(child);
                }
                _ => {}
            }
            vaccines_per_child
                .entry(child)
                .or_default()
                .insert(record.vaccine_key.as_str());
        }

        let fully_vaccinated = vaccines_per_child
            .values()
            .filter(|vaccines| vaccines.len() >= config.required_vaccine_count)
            .count();

        Self {
            median_coverage: median(&values),
            min_coverage: values.first().copied(),
            max_coverage: values.last().copied(),
            std_dev_coverage: sample_std_dev(&values),
            districts_meeting_target: districts
                .iter()
                .filter(|district| district.coverage >= config.target_threshold)
                .count(),
            districts_below_alert: districts
                .iter()
                .filter(|district| district.coverage < config.alert_threshold)
                .count(),
            children: children.len(),
            districts: district_keys.len(),
            villages: villages.len(),
            male_children: male.len(),
            female_children: female.len(),
            fully_vaccinated,
        }
    }
}

fn median(sorted: &[f64]) -> Option<f64> {
    let mid = sorted.len() / 2;
    match sorted.len() {
        0 => None,
        len if len % 2 == 1 => Some(sorted[mid]),
        _ => Some((sorted[mid - 1] + sorted[mid]) / 2.0),
    }
}

fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCompleteness {
    pub field: &'static str,
    pub missing: usize,
    pub completeness: f64,
}

/// Completeness of the optional columns across the active subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub record_count: usize,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub districts: usize,
    pub villages: usize,
    pub vaccines: usize,
    pub fields: Vec<FieldCompleteness>,
    /// Mean completeness over all optional fields; `None` without records.
    pub completeness: Option<f64>,
}

type FieldCheck = (&'static str, fn(&VaccinationRecord) -> bool);

const OPTIONAL_FIELDS: [FieldCheck; 5] = [
    ("village", |record| record.village.is_some()),
    ("child_id", |record| record.child_id.is_some()),
    ("date", |record| record.date.is_some()),
    ("age_group", |record| record.age_group.is_some()),
    ("gender", |record| record.gender.is_some()),
];

impl DataQualityReport {
    pub fn compute(subset: &[&VaccinationRecord]) -> Self {
        let total = subset.len();
        let dates = subset.iter().filter_map(|record| record.date);
        let earliest_date = dates.clone().min();
        let latest_date = dates.max();

        let fields: Vec<FieldCompleteness> = OPTIONAL_FIELDS
            .iter()
            .map(|&(field, present)| {
                let missing = subset.iter().filter(|record| !present(record)).count();
                let completeness = if total == 0 {
                    0.0
                } else {
                    (total - missing) as f64 / total as f64 * 100.0
                };
                FieldCompleteness {
                    field,
                    missing,
                    completeness,
                }
            })
            .collect();

        let completeness = (total > 0).then(|| {
            fields.iter().map(|field| field.completeness).sum::<f64>() / fields.len() as f64
        });

        Self {
            record_count: total,
            earliest_date,
            latest_date,
            districts: distinct(subset, |record| Some(record.district_key.as_str())),
            villages: distinct(subset, |record| record.village.as_deref()),
            vaccines: distinct(subset, |record| Some(record.vaccine_key.as_str())),
            fields,
            completeness,
        }
    }
}

fn distinct(
    subset: &[&VaccinationRecord],
    key: fn(&VaccinationRecord) -> Option<&str>,
) -> usize {
    subset
        .iter()
        .filter_map(|record| key(record))
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::config::TierBoundaries;
    use crate::coverage::geography::summarize_districts;
    use crate::coverage::test_support::{dated, record};

    fn child(district: &str, vaccine: &str, id: &str, gender: Gender) -> VaccinationRecord {
        let mut record = record(district, vaccine, 100.0);
        record.child_id = Some(id.to_string());
        record.gender = Some(gender);
        record
    }

    #[test]
    fn distribution_figures_use_row_values() {
        let records = vec![
            record("Amritsar", "BCG", 60.0),
            record("Amritsar", "DPT1", 80.0),
            record("Ludhiana", "BCG", 100.0),
        ];
        let subset: Vec<&VaccinationRecord> = records.iter().collect();
        let districts = summarize_districts(&subset, &TierBoundaries::default());
        let stats = CoverageStatistics::compute(&subset, &districts, &AnalyticsConfig::default());
        assert_eq!(stats.median_coverage, Some(80.0));
        assert_eq!(stats.min_coverage, Some(60.0));
        assert_eq!(stats.max_coverage, Some(100.0));
        assert_eq!(stats.std_dev_coverage, Some(20.0));
        assert_eq!(stats.districts_meeting_target, 1);
        assert_eq!(stats.districts_below_alert, 0);
        assert_eq!(stats.districts, 2);
    }

    #[test]
    fn fully_vaccinated_counts_distinct_vaccines_per_child() {
        let config = AnalyticsConfig {
            required_vaccine_count: 2,
            ..AnalyticsConfig::default()
        };
        let records = vec![
            child("Amritsar", "BCG", "C1", Gender::Female),
            child("Amritsar", "DPT1", "C1", Gender::Female),
            child("Amritsar", "BCG", "C2", Gender::Male),
            child("Amritsar", "bcg", "C2", Gender::Male),
        ];
        let subset: Vec<&VaccinationRecord> = records.iter().collect();
        let stats = CoverageStatistics::compute(&subset, &[], &config);
        assert_eq!(stats.children, 2);
        assert_eq!(stats.fully_vaccinated, 1);
        assert_eq!(stats.male_children, 1);
        assert_eq!(stats.female_children, 1);
    }

    #[test]
    fn empty_subset_has_no_distribution() {
        let stats = CoverageStatistics::compute(&[], &[], &AnalyticsConfig::default());
        assert_eq!(stats.median_coverage, None);
        assert_eq!(stats.std_dev_coverage, None);
        let quality = DataQualityReport::compute(&[]);
        assert_eq!(quality.completeness, None);
    }

    #[test]
    fn data_quality_reports_missing_optional_fields() {
        let records = vec![
            dated("Amritsar", "BCG", 90.0, "2024-02-01"),
            dated("Amritsar", "BCG", 90.0, "2024-05-01"),
            record("Ludhiana", "DPT1", 70.0),
            record("Ludhiana", "DPT1", 70.0),
        ];
        let subset: Vec<&VaccinationRecord> = records.iter().collect();
        let quality = DataQualityReport::compute(&subset);
        assert_eq!(quality.record_count, 4);
        assert_eq!(quality.earliest_date, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(quality.latest_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        let date = quality
            .fields
            .iter()
            .find(|field| field.field == "date")
            .expect("date field listed");
        assert_eq!(date.missing, 2);
        assert_eq!(date.completeness, 50.0);
        assert_eq!(quality.completeness, Some(10.0));
        assert_eq!(quality.vaccines, 2);
    }
}
