use super::domain::VaccinationRecord;
use super::validation::{LoadReport, ValidatedRecords};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Content hash of a canonical record set and its load diagnostics.
///
/// Everything a report shows goes into the hash: display spellings, raw
/// fields and the skipped-row summary. Equal ids mean identical reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex digits, enough to tell datasets apart in logs.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }

    fn of(records: &[VaccinationRecord], load: &LoadReport) -> Self {
        let mut hasher = Sha256::new();
        for record in records {
            for field in [
                record.district_key.as_str(),
                record.district.as_str(),
                record.village.as_deref().unwrap_or_default(),
                record.vaccine_key.as_str(),
                record.vaccine_type.as_str(),
                record.age_group.as_deref().unwrap_or_default(),
                record.gender_label(),
                record.child_id.as_deref().unwrap_or_default(),
            ] {
                hasher.update(field.as_bytes());
                hasher.update([0x1f]);
            }
            hasher.update(record.coverage_percentage.to_bits().to_le_bytes());
            hasher.update(record.population_weight.to_bits().to_le_bytes());
            let date = record
                .date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            hasher.update(date.as_bytes());
            hasher.update([0x1e]);
        }

        hasher.update([0x1d]);
        for count in [
            load.total_rows,
            load.loaded_rows,
            load.rollup_rows,
            load.unparsed_dates,
        ] {
            hasher.update((count as u64).to_le_bytes());
        }
        for skipped in &load.skipped {
            hasher.update(skipped.to_string().as_bytes());
            hasher.update([0x1e]);
        }
        Self(format!("{:x}", hasher.finalize()))
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The canonical record set of one session, immutable once built.
#[derive(Debug, Clone)]
pub struct Dataset {
    id: DatasetId,
    records: Vec<VaccinationRecord>,
    load: LoadReport,
}

impl Dataset {
    pub fn new(validated: ValidatedRecords) -> Self {
        let id = DatasetId::of(&validated.records, &validated.report);
        Self {
            id,
            records: validated.records,
            load: validated.report,
        }
    }

    pub fn empty() -> Self {
        Self::new(ValidatedRecords::default())
    }

    pub fn id(&self) -> &DatasetId {
        &self.id
    }

    pub fn records(&self) -> &[VaccinationRecord] {
        &self.records
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<ValidatedRecords> for Dataset {
    fn from(validated: ValidatedRecords) -> Self {
        Self::new(validated)
    }
}
