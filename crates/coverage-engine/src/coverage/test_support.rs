use super::dataset::Dataset;
use super::domain::VaccinationRecord;
use super::validation::{normalizer, LoadReport, ValidatedRecords};
use chrono::NaiveDate;

pub(crate) fn weighted(district: &str, vaccine: &str, coverage: f64, weight: f64) -> VaccinationRecord {
    VaccinationRecord {
        district: normalizer::district_display(district),
        district_key: normalizer::district_key(district),
        village: None,
        vaccine_type: normalizer::collapse(vaccine),
        vaccine_key: normalizer::vaccine_key(vaccine),
        coverage_percentage: coverage,
        date: None,
        age_group: None,
        gender: None,
        child_id: None,
        population_weight: weight,
    }
}

pub(crate) fn record(district: &str, vaccine: &str, coverage: f64) -> VaccinationRecord {
    weighted(district, vaccine, coverage, 1.0)
}

pub(crate) fn dated(district: &str, vaccine: &str, coverage: f64, date: &str) -> VaccinationRecord {
    let mut record = record(district, vaccine, coverage);
    record.date = Some(NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("test date parses"));
    record
}

pub(crate) fn dataset(records: Vec<VaccinationRecord>) -> Dataset {
    let report = LoadReport {
        total_rows: records.len(),
        loaded_rows: records.len(),
        ..LoadReport::default()
    };
    Dataset::new(ValidatedRecords { records, report })
}
