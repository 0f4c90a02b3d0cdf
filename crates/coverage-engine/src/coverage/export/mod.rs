mod charts;
mod digest;
mod document;
mod table;
mod workbook;

pub use charts::{ChartError, ChartPoint, ChartRenderer, SvgChartRenderer};
pub use table::RAW_TABLE_HEADERS;
pub use workbook::SHEET_NAMES;

use super::config::AnalyticsConfig;
use super::report::Report;
use mime::Mime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    RawTable,
    Workbook,
    Document,
    Text,
}

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

impl ExportFormat {
    pub const fn ordered() -> [Self; 4] {
        [Self::RawTable, Self::Workbook, Self::Document, Self::Text]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::RawTable => "raw-table",
            Self::Workbook => "workbook",
            Self::Document => "document",
            Self::Text => "text",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::RawTable => "csv",
            Self::Workbook => "xlsx",
            Self::Document => "html",
            Self::Text => "txt",
        }
    }

    pub fn content_type(self) -> Mime {
        match self {
            Self::RawTable => mime::TEXT_CSV_UTF_8,
            Self::Workbook => XLSX_CONTENT_TYPE
                .parse()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM),
            Self::Document => mime::TEXT_HTML_UTF_8,
            Self::Text => mime::TEXT_PLAIN_UTF_8,
        }
    }

    /// The digest has a fixed size, so only the tabular formats are row-capped.
    const fn is_row_capped(self) -> bool {
        !matches!(self, Self::Text)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown export format '{0}' (expected raw-table, workbook, document or text)")]
pub struct UnknownExportFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnknownExportFormat;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "raw-table" | "raw_table" | "table" | "csv" => Ok(Self::RawTable),
            "workbook" | "xlsx" | "excel" => Ok(Self::Workbook),
            "document" | "html" | "report" => Ok(Self::Document),
            "text" | "txt" | "digest" => Ok(Self::Text),
            _ => Err(UnknownExportFormat(value.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportFailure {
    #[error("report spans {rows} rows, above the export limit of {limit}; narrow the filters and retry")]
    TooLarge { rows: usize, limit: usize },
    #[error("csv serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("workbook serialization failed: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error("buffer write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("document formatting failed")]
    Format(#[from] fmt::Error),
}

/// A single format failed; nothing partial was produced for it.
#[derive(Debug, thiserror::Error)]
#[error("{format} export failed: {cause}")]
pub struct ExportError {
    pub format: ExportFormat,
    #[source]
    pub cause: ExportFailure,
}

/// Data rows the tabular formats would emit for a report.
pub fn exported_rows(report: &Report) -> usize {
    let district_rows: usize = report
        .districts
        .iter()
        .map(|district| 1 + district.vaccines.len())
        .sum();
    district_rows + report.timeline.buckets.len() + report.demographics.buckets.len()
}

/// Projects one `Report` into byte payloads; every number comes from the report.
#[derive(Debug, Clone)]
pub struct ReportExporter<C: ChartRenderer = SvgChartRenderer> {
    renderer: C,
    max_rows: usize,
}

impl ReportExporter<SvgChartRenderer> {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self::with_renderer(SvgChartRenderer::default(), config)
    }
}

impl<C: ChartRenderer> ReportExporter<C> {
    pub fn with_renderer(renderer: C, config: &AnalyticsConfig) -> Self {
        Self {
            renderer,
            max_rows: config.max_export_rows,
        }
    }

    /// Renders the whole payload in memory; an error means no bytes at all.
    pub fn export(&self, report: &Report, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        self.render(report, format)
            .map_err(|cause| ExportError { format, cause })
    }

    fn render(&self, report: &Report, format: ExportFormat) -> Result<Vec<u8>, ExportFailure> {
        if format.is_row_capped() {
            let rows = exported_rows(report);
            if rows > self.max_rows {
                return Err(ExportFailure::TooLarge {
                    rows,
                    limit: self.max_rows,
                });
            }
        }

        let payload = match format {
            ExportFormat::RawTable => table::render(report)?,
            ExportFormat::Workbook => workbook::render(report)?,
            ExportFormat::Document => document::render(report, &self.renderer)?.into_bytes(),
            ExportFormat::Text => digest::render(report)?.into_bytes(),
        };
        Ok(payload)
    }

    /// Exports each format independently so one failure leaves the others usable.
    pub fn export_all(
        &self,
        report: &Report,
        formats: &[ExportFormat],
    ) -> Vec<(ExportFormat, Result<Vec<u8>, ExportError>)> {
        formats
            .iter()
            .map(|&format| {
                let result = self.export(report, format);
                match &result {
                    Ok(bytes) => info!(%format, bytes = bytes.len(), "rendered export"),
                    Err(err) => warn!(%format, error = %err, "export failed"),
                }
                (format, result)
            })
            .collect()
    }
}

pub fn export(
    report: &Report,
    format: ExportFormat,
    config: &AnalyticsConfig,
) -> Result<Vec<u8>, ExportError> {
    ReportExporter::new(config).export(report, format)
}

pub(crate) fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Shared rendering of an optional rate.
pub(crate) fn percent(value: Option<f64>) -> String {
    value
        .map(|rate| format!("{rate:.1}%"))
        .unwrap_or_else(|| "no data".to_string())
}
