//! Ingestion collaborators: anything that can hand the validator a [`RawTable`].

mod csv_source;
mod json_rows;

use crate::config::{DataSourceKind, IngestionConfig};
use crate::coverage::{validate, Dataset, RawTable};
use crate::error::AppError;
use tracing::{info, warn};

pub use csv_source::CsvSource;
pub use json_rows::JsonRowsSource;

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("failed to read {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("upload of {actual} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { limit: u64, actual: u64 },
    #[error("{kind} source unavailable: {reason}")]
    SourceUnavailable {
        kind: DataSourceKind,
        reason: String,
    },
}

impl IngestionError {
    /// Operator-facing hint on how to recover.
    pub fn suggestion(&self) -> &'static str {
        match self {
            IngestionError::Io { .. } => {
                "check VACCINATION_DATA_PATH points at a readable file and retry"
            }
            IngestionError::Csv(_) => "re-export the file as comma-separated UTF-8 with a header row",
            IngestionError::UploadTooLarge { .. } => {
                "split the upload or raise MAX_UPLOAD_SIZE"
            }
            IngestionError::SourceUnavailable { .. } => {
                "retry later or fall back to VACCINATION_DATA_SOURCE=csv"
            }
        }
    }
}

pub trait RecordSource: Send + Sync {
    fn fetch(&self) -> Result<RawTable, IngestionError>;

    fn describe(&self) -> String;
}

/// Stands in for a configured source kind that has no bundled connector.
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    kind: DataSourceKind,
}

impl UnavailableSource {
    pub fn new(kind: DataSourceKind) -> Self {
        Self { kind }
    }
}

impl RecordSource for UnavailableSource {
    fn fetch(&self) -> Result<RawTable, IngestionError> {
        Err(IngestionError::SourceUnavailable {
            kind: self.kind,
            reason: "no connector is configured for this source kind".to_string(),
        })
    }

    fn describe(&self) -> String {
        format!("{} source", self.kind)
    }
}

pub fn source_from_config(config: &IngestionConfig) -> Box<dyn RecordSource> {
    match config.source {
        DataSourceKind::Csv => Box::new(
            CsvSource::from_path(&config.data_path).with_max_bytes(config.max_upload_bytes),
        ),
        kind @ (DataSourceKind::Api | DataSourceKind::Database) => {
            Box::new(UnavailableSource::new(kind))
        }
    }
}

/// Fetches, validates and wraps the rows of `source` into a canonical [`Dataset`].
pub fn load_dataset(source: &dyn RecordSource) -> Result<Dataset, AppError> {
    let table = source.fetch().map_err(|err| {
        warn!(source = %source.describe(), error = %err, "ingestion failed");
        err
    })?;
    let validated = validate(&table)?;
    info!(
        source = %source.describe(),
        summary = %validated.report.summary_line(),
        "dataset loaded"
    );
    Ok(Dataset::new(validated))
}
