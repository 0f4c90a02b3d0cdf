use super::normalizer::header_key;
use super::MissingColumnError;

pub(crate) const REQUIRED_COLUMNS: [&str; 3] = ["district", "vaccine_type", "coverage_percentage"];

/// Positions of the recognized columns within one input table.
#[derive(Debug, Clone)]
pub(crate) struct ColumnMap {
    pub(crate) district: usize,
    pub(crate) vaccine_type: usize,
    pub(crate) coverage: usize,
    pub(crate) village: Option<usize>,
    pub(crate) child_id: Option<usize>,
    pub(crate) date: Option<usize>,
    pub(crate) age_group: Option<usize>,
    pub(crate) gender: Option<usize>,
    pub(crate) population_weight: Option<usize>,
    pub(crate) scope: Option<usize>,
}

impl ColumnMap {
    /// Resolves every column up front so a missing required column is reported once.
    pub(crate) fn resolve(columns: &[String]) -> Result<Self, MissingColumnError> {
        let keys: Vec<String> = columns.iter().map(|column| header_key(column)).collect();
        let find = |name: &str| keys.iter().position(|key| key == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| name.to_string())
            .collect();

        match (find("district"), find("vaccine_type"), find("coverage_percentage")) {
            (Some(district), Some(vaccine_type), Some(coverage)) if missing.is_empty() => {
                Ok(Self {
                    district,
                    vaccine_type,
                    coverage,
                    village: find("village"),
                    child_id: find("child_id"),
                    date: find("date"),
                    age_group: find("age_group"),
                    gender: find("gender"),
                    population_weight: find("population_weight"),
                    scope: find("scope"),
                })
            }
            _ => Err(MissingColumnError { missing }),
        }
    }
}

/// Returns the trimmed cell, treating short rows and blank cells as absent.
pub(crate) fn cell(row: &[String], index: Option<usize>) -> Option<&str> {
    index
        .and_then(|index| row.get(index))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}
