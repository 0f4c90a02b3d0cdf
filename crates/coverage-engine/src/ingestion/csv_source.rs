use super::{IngestionError, RecordSource};
use crate::coverage::RawTable;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum CsvOrigin {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Comma-separated export with a header row, read from disk or an in-memory upload.
#[derive(Debug, Clone)]
pub struct CsvSource {
    origin: CsvOrigin,
    max_bytes: Option<u64>,
}

impl CsvSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            origin: CsvOrigin::Path(path.as_ref().to_path_buf()),
            max_bytes: None,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            origin: CsvOrigin::Bytes(bytes),
            max_bytes: None,
        }
    }

    pub fn with_max_bytes(mut self, limit: u64) -> Self {
        self.max_bytes = Some(limit);
        self
    }

    fn check_size(&self, actual: u64) -> Result<(), IngestionError> {
        match self.max_bytes {
            Some(limit) if actual > limit => Err(IngestionError::UploadTooLarge { limit, actual }),
            _ => Ok(()),
        }
    }

    pub fn read_table<R: Read>(reader: R) -> Result<RawTable, IngestionError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let columns = reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut table = RawTable::new(columns);

        for record in reader.records() {
            let record = record?;
            table.push_row(record.iter().map(str::to_string).collect());
        }

        Ok(table)
    }
}

impl RecordSource for CsvSource {
    fn fetch(&self) -> Result<RawTable, IngestionError> {
        match &self.origin {
            CsvOrigin::Path(path) => {
                let io_error = |source| IngestionError::Io {
                    origin: path.display().to_string(),
                    source,
                };
                let file = std::fs::File::open(path).map_err(io_error)?;
                let size = file.metadata().map_err(io_error)?.len();
                self.check_size(size)?;
                Self::read_table(file)
            }
            CsvOrigin::Bytes(bytes) => {
                self.check_size(bytes.len() as u64)?;
                Self::read_table(bytes.as_slice())
            }
        }
    }

    fn describe(&self) -> String {
        match &self.origin {
            CsvOrigin::Path(path) => format!("csv file {}", path.display()),
            CsvOrigin::Bytes(bytes) => format!("csv upload ({} bytes)", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_header_and_trimmed_cells() {
        let source = CsvSource::from_bytes(
            b"district , vaccine_type,coverage_percentage\n Amritsar ,BCG, 95 \nMansa,OPV\n".to_vec(),
        );
        let table = source.fetch().expect("csv parses");
        assert_eq!(
            table.columns(),
            &["district", "vaccine_type", "coverage_percentage"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], vec!["Amritsar", "BCG", "95"]);
        assert_eq!(table.rows()[1].len(), 2);
    }

    #[test]
    fn rejects_uploads_over_the_ceiling() {
        let source = CsvSource::from_bytes(b"district\nAmritsar\n".to_vec()).with_max_bytes(4);
        let err = source.fetch().expect_err("too large");
        assert!(matches!(
            err,
            IngestionError::UploadTooLarge {
                limit: 4,
                actual: 18
            }
        ));
    }

    #[test]
    fn missing_file_is_an_io_error_naming_the_path() {
        let source = CsvSource::from_path("does/not/exist.csv");
        let err = source.fetch().expect_err("file missing");
        assert!(matches!(err, IngestionError::Io { .. }));
        assert!(err.to_string().contains("does/not/exist.csv"));
    }
}
