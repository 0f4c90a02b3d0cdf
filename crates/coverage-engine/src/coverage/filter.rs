use super::domain::{Gender, VaccinationRecord};
use super::validation::normalizer;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The active selection across every filter dimension.
///
/// Each dimension stores grouping keys, so `"amritsar"` and `"AMRITSAR "` select
/// the same records. An empty dimension matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSet {
    districts: BTreeSet<String>,
    vaccines: BTreeSet<String>,
    age_groups: BTreeSet<String>,
    genders: BTreeSet<Gender>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_district(mut self, district: &str) -> Self {
        self.districts.insert(normalizer::district_key(district));
        self
    }

    pub fn with_vaccine(mut self, vaccine: &str) -> Self {
        self.vaccines.insert(normalizer::vaccine_key(vaccine));
        self
    }

    pub fn with_age_group(mut self, age_group: &str) -> Self {
        self.age_groups.insert(normalizer::label_key(age_group));
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.genders.insert(gender);
        self
    }

    /// Inclusive on both ends; either bound may be open.
    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn districts(&self) -> impl Iterator<Item = &str> {
        self.districts.iter().map(String::as_str)
    }

    pub fn vaccines(&self) -> impl Iterator<Item = &str> {
        self.vaccines.iter().map(String::as_str)
    }

    pub fn date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (self.from, self.to)
    }

    pub fn is_unfiltered(&self) -> bool {
        self.districts.is_empty()
            && self.vaccines.is_empty()
            && self.age_groups.is_empty()
            && self.genders.is_empty()
            && self.from.is_none()
            && self.to.is_none()
    }

    pub fn matches(&self, record: &VaccinationRecord) -> bool {
        if !self.districts.is_empty() && !self.districts.contains(&record.district_key) {
            return false;
        }
        if !self.vaccines.is_empty() && !self.vaccines.contains(&record.vaccine_key) {
            return false;
        }
        if !self.age_groups.is_empty() {
            let key = record.age_group.as_deref().map(normalizer::label_key);
            if !key.is_some_and(|key| self.age_groups.contains(&key)) {
                return false;
            }
        }
        if !self.genders.is_empty()
            && !record
                .gender
                .is_some_and(|gender| self.genders.contains(&gender))
        {
            return false;
        }
        if self.from.is_some() || self.to.is_some() {
            // A date bound can only be satisfied by a dated record.
            let Some(date) = record.date else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
                return false;
            }
        }
        true
    }

    /// The active subset: the only input every downstream summarizer sees.
    pub fn apply<'a>(&self, records: &'a [VaccinationRecord]) -> Vec<&'a VaccinationRecord> {
        records.iter().filter(|record| self.matches(record)).collect()
    }

    /// Human-readable selection used in no-data messages and report headers.
    pub fn describe(&self) -> String {
        if self.is_unfiltered() {
            return "all records".to_string();
        }

        let mut parts = Vec::new();
        if !self.districts.is_empty() {
            parts.push(format!("district in [{}]", join(self.districts.iter())));
        }
        if !self.vaccines.is_empty() {
            parts.push(format!("vaccine in [{}]", join(self.vaccines.iter())));
        }
        if !self.age_groups.is_empty() {
            parts.push(format!("age group in [{}]", join(self.age_groups.iter())));
        }
        if !self.genders.is_empty() {
            let labels: Vec<&str> = self.genders.iter().map(|gender| gender.label()).collect();
            parts.push(format!("gender in [{}]", labels.join(", ")));
        }
        match (self.from, self.to) {
            (Some(from), Some(to)) => parts.push(format!("date {from} to {to}")),
            (Some(from), None) => parts.push(format!("date from {from}")),
            (None, Some(to)) => parts.push(format!("date until {to}")),
            (None, None) => {}
        }
        parts.join("; ")
    }
}

fn join<'a>(values: impl Iterator<Item = &'a String>) -> String {
    values.map(String::as_str).collect::<Vec<_>>().join(", ")
}
