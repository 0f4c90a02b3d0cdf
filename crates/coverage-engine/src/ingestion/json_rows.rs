use super::{IngestionError, RecordSource};
use crate::coverage::RawTable;
use serde_json::{Map, Value};

/// Rows supplied as JSON objects, keyed by column name.
///
/// Columns are the union of keys across rows. A key absent from a row becomes
/// an empty cell, as does `null`. With a ceiling set, the rows are measured
/// as the CSV text they would make (header, cells, separators).
#[derive(Debug, Clone, Default)]
pub struct JsonRowsSource {
    rows: Vec<Map<String, Value>>,
    max_bytes: Option<u64>,
}

impl JsonRowsSource {
    pub fn new(rows: Vec<Map<String, Value>>) -> Self {
        Self {
            rows,
            max_bytes: None,
        }
    }

    pub fn with_max_bytes(mut self, limit: u64) -> Self {
        self.max_bytes = Some(limit);
        self
    }

    fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.iter().any(|existing| existing == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn line_bytes(cells: &[String]) -> u64 {
    let text: usize = cells.iter().map(String::len).sum();
    (text + cells.len().max(1)) as u64
}

impl RecordSource for JsonRowsSource {
    fn fetch(&self) -> Result<RawTable, IngestionError> {
        let columns = self.columns();
        let mut size = line_bytes(&columns);
        let mut table = RawTable::new(columns.clone());
        for row in &self.rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|column| cell_text(row.get(column)))
                .collect();
            size += line_bytes(&cells);
            if let Some(limit) = self.max_bytes.filter(|limit| size > *limit) {
                return Err(IngestionError::UploadTooLarge {
                    limit,
                    actual: size,
                });
            }
            table.push_row(cells);
        }
        Ok(table)
    }

    fn describe(&self) -> String {
        format!("json rows ({})", self.rows.len())
    }
}
