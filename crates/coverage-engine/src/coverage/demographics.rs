use super::aggregate::WeightedAccumulator;
use super::domain::VaccinationRecord;
use super::validation::normalizer;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicBucket {
    pub age_group: String,
    pub gender: String,
    pub coverage: f64,
    pub record_count: usize,
    pub population: f64,
}

/// Coverage for one value of a single demographic dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicMarginal {
    pub label: String,
    pub coverage: f64,
    pub record_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DemographicBreakdown {
    pub buckets: Vec<DemographicBucket>,
    pub by_gender: Vec<DemographicMarginal>,
    pub by_age_group: Vec<DemographicMarginal>,
}

/// Groups keyed case-insensitively while keeping the first display spelling.
struct LabelledGroups<K: Ord> {
    groups: BTreeMap<K, (String, WeightedAccumulator)>,
}

impl<K: Ord> Default for LabelledGroups<K> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K: Ord> LabelledGroups<K> {
    fn add(&mut self, key: K, display: impl FnOnce() -> String, record: &VaccinationRecord) {
        self.groups
            .entry(key)
            .or_insert_with(|| (display(), WeightedAccumulator::default()))
            .1
            .add(record);
    }
}

/// Breaks the active subset out by (age group, gender). Absent values fall in
/// the "Unspecified" bucket; pairs without records never appear.
pub fn analyze_demographics(subset: &[&VaccinationRecord]) -> DemographicBreakdown {
    let mut pairs: LabelledGroups<(String, &'static str)> = LabelledGroups::default();
    let mut genders: LabelledGroups<&'static str> = LabelledGroups::default();
    let mut ages: LabelledGroups<String> = LabelledGroups::default();

    for &record in subset {
        let age_display = record.age_group_label();
        let age_key = normalizer::label_key(age_display);
        let gender = record.gender_label();

        pairs.add((age_key.clone(), gender), || age_display.to_string(), record);
        genders.add(gender, || gender.to_string(), record);
        ages.add(age_key, || age_display.to_string(), record);
    }

    let buckets = pairs
        .groups
        .into_iter()
        .filter_map(|((_, gender), (age_group, accumulator))| {
            accumulator.rate().map(|coverage| DemographicBucket {
                age_group,
                gender: gender.to_string(),
                coverage,
                record_count: accumulator.count(),
                population: accumulator.population(),
            })
        })
        .collect();

    DemographicBreakdown {
        buckets,
        by_gender: marginals(genders),
        by_age_group: marginals(ages),
    }
}

fn marginals<K: Ord>(groups: LabelledGroups<K>) -> Vec<DemographicMarginal> {
    groups
        .groups
        .into_values()
        .filter_map(|(label, accumulator)| {
            accumulator.rate().map(|coverage| DemographicMarginal {
                label,
                coverage,
                record_count: accumulator.count(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::domain::Gender;
    use crate::coverage::test_support::record;

    #[test]
    fn pairs_group_by_age_and_gender() {
        let mut a = record("Amritsar", "BCG", 90.0);
        a.age_group = Some("0-1 Years".to_string());
        a.gender = Some(Gender::Female);
        let mut b = record("Amritsar", "DPT1", 70.0);
        b.age_group = Some("0-1 years".to_string());
        b.gender = Some(Gender::Female);
        let mut c = record("Amritsar", "BCG", 50.0);
        c.gender = Some(Gender::Male);
        let records = vec![a, b, c];
        let subset: Vec<&VaccinationRecord> = records.iter().collect();

        let breakdown = analyze_demographics(&subset);
        assert_eq!(breakdown.buckets.len(), 2);
        let girls = &breakdown.buckets[0];
        assert_eq!(girls.age_group, "0-1 Years");
        assert_eq!(girls.gender, "Female");
        assert_eq!(girls.coverage, 80.0);
        assert_eq!(girls.record_count, 2);
        let unspecified = &breakdown.buckets[1];
        assert_eq!(unspecified.age_group, "Unspecified");
        assert_eq!(unspecified.gender, "Male");

        let genders: Vec<&str> = breakdown.by_gender.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(genders, vec!["Female", "Male"]);
        assert_eq!(breakdown.by_age_group.len(), 2);
    }

    #[test]
    fn empty_subset_has_no_buckets() {
        let breakdown = analyze_demographics(&[]);
        assert!(breakdown.buckets.is_empty());
        assert!(breakdown.by_gender.is_empty());
    }
}
