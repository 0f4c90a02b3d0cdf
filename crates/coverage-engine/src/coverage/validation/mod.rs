mod columns;
pub(crate) mod normalizer;

use super::domain::{Gender, VaccinationRecord};
use chrono::{DateTime, NaiveDate};
use columns::{cell, ColumnMap};
use serde::Serialize;
use tracing::{debug, info};

/// Column names plus string cells, as handed over by any ingestion collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required columns: {}", missing.join(", "))]
pub struct MissingColumnError {
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowIssue {
    #[error("district is empty")]
    MissingDistrict,
    #[error("vaccine_type is empty")]
    MissingVaccineType,
    #[error("coverage_percentage is empty")]
    MissingCoverage,
    #[error("coverage_percentage '{value}' is not a number")]
    NonNumericCoverage { value: String },
    #[error("coverage_percentage {value} is outside 0-100")]
    CoverageOutOfRange { value: f64 },
    #[error(
        "population_weight '{value}' must be a positive number no larger than {max}",
        max = MAX_POPULATION_WEIGHT
    )]
    InvalidWeight { value: String },
}

/// A skipped row: 1-based data row number plus the reason.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[error("row {row}: {issue}")]
pub struct RowValidationError {
    pub row: usize,
    pub issue: RowIssue,
}

/// Load diagnostics surfaced next to the canonical record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub rollup_rows: usize,
    pub unparsed_dates: usize,
    pub skipped: Vec<RowValidationError>,
}

impl LoadReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} of {} rows loaded, {} skipped",
            self.loaded_rows,
            self.total_rows,
            self.skipped_count()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidatedRecords {
    pub records: Vec<VaccinationRecord>,
    pub report: LoadReport,
}

/// Largest accepted cohort weight; keeps Σ(coverage × weight) finite for any row count.
pub const MAX_POPULATION_WEIGHT: f64 = 1e12;

/// Scope value marking rows written as district rollups by the raw-table export.
pub(crate) const ROLLUP_SCOPE: &str = "district";

/// Checks the column contract once, then validates and normalizes each row.
pub fn validate(table: &RawTable) -> Result<ValidatedRecords, MissingColumnError> {
    let columns = ColumnMap::resolve(table.columns())?;
    let mut validated = ValidatedRecords {
        records: Vec::with_capacity(table.len()),
        report: LoadReport {
            total_rows: table.len(),
            ..LoadReport::default()
        },
    };

    for (index, row) in table.rows().iter().enumerate() {
        let row_number = index + 1;
        if cell(row, columns.scope).is_some_and(|scope| scope.eq_ignore_ascii_case(ROLLUP_SCOPE)) {
            validated.report.rollup_rows += 1;
            continue;
        }

        match normalize_row(row, &columns, &mut validated.report) {
            Ok(record) => validated.records.push(record),
            Err(issue) => {
                debug!(row = row_number, %issue, "skipping invalid vaccination row");
                validated.report.skipped.push(RowValidationError {
                    row: row_number,
                    issue,
                });
            }
        }
    }

    validated.report.loaded_rows = validated.records.len();
    info!(
        loaded = validated.report.loaded_rows,
        total = validated.report.total_rows,
        skipped = validated.report.skipped_count(),
        unparsed_dates = validated.report.unparsed_dates,
        "validated vaccination records"
    );
    Ok(validated)
}

fn normalize_row(
    row: &[String],
    columns: &ColumnMap,
    report: &mut LoadReport,
) -> Result<VaccinationRecord, RowIssue> {
    let district = cell(row, Some(columns.district)).ok_or(RowIssue::MissingDistrict)?;
    let vaccine = cell(row, Some(columns.vaccine_type)).ok_or(RowIssue::MissingVaccineType)?;
    let coverage = parse_coverage(cell(row, Some(columns.coverage)))?;
    let population_weight = match cell(row, columns.population_weight) {
        Some(raw) => parse_weight(raw)?,
        None => 1.0,
    };

    let date = match cell(row, columns.date) {
        Some(raw) => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                report.unparsed_dates += 1;
            }
            parsed
        }
        None => None,
    };

    Ok(VaccinationRecord {
        district: normalizer::district_display(district),
        district_key: normalizer::district_key(district),
        village: cell(row, columns.village).map(normalizer::district_display),
        vaccine_type: normalizer::collapse(vaccine),
        vaccine_key: normalizer::vaccine_key(vaccine),
        coverage_percentage: coverage,
        date,
        age_group: cell(row, columns.age_group).map(normalizer::collapse),
        gender: cell(row, columns.gender).and_then(Gender::parse),
        child_id: cell(row, columns.child_id).map(str::to_string),
        population_weight,
    })
}

fn parse_coverage(raw: Option<&str>) -> Result<f64, RowIssue> {
    let raw = raw.ok_or(RowIssue::MissingCoverage)?;
    let numeric = raw.strip_suffix('%').unwrap_or(raw).trim();
    let value = numeric
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| RowIssue::NonNumericCoverage {
            value: raw.to_string(),
        })?;

    if !(0.0..=100.0).contains(&value) {
        return Err(RowIssue::CoverageOutOfRange { value });
    }

    Ok(value)
}

fn parse_weight(raw: &str) -> Result<f64, RowIssue> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| *value > 0.0 && *value <= MAX_POPULATION_WEIGHT)
        .ok_or_else(|| RowIssue::InvalidWeight {
            value: raw.to_string(),
        })
}

/// Accepts ISO-8601 dates and RFC 3339 timestamps; anything else is absent.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc().date());
    }

    None
}
