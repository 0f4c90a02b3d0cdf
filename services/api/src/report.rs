use chrono::NaiveDate;
use clap::Args;
use coverage_engine::config::{AppConfig, IngestionConfig};
use coverage_engine::coverage::{
    AnalyticsConfig, ExportFormat, FilterSet, Gender, Report, ReportExporter, ReportRequest,
    TimeGranularity,
};
use coverage_engine::error::AppError;
use coverage_engine::ingestion::{load_dataset, source_from_config, CsvSource, RecordSource};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Args, Debug, Default)]
pub(crate) struct ReportArgs {
    /// CSV export to analyze (defaults to VACCINATION_DATA_PATH)
    #[arg(long)]
    pub(crate) data: Option<PathBuf>,
    /// Restrict to a district; repeat for several
    #[arg(long)]
    pub(crate) district: Vec<String>,
    /// Restrict to a vaccine type; repeat for several
    #[arg(long)]
    pub(crate) vaccine: Vec<String>,
    /// Restrict to an age group; repeat for several
    #[arg(long = "age-group")]
    pub(crate) age_group: Vec<String>,
    /// Restrict to a gender (male, female, unknown); repeat for several
    #[arg(long, value_parser = crate::infra::parse_gender)]
    pub(crate) gender: Vec<Gender>,
    /// Earliest record date to include (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) from: Option<NaiveDate>,
    /// Latest record date to include (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) to: Option<NaiveDate>,
    /// Timeline bucket size: day, week or month
    #[arg(long, default_value_t = TimeGranularity::Month)]
    pub(crate) granularity: TimeGranularity,
    /// Emit empty buckets for periods without records
    #[arg(long)]
    pub(crate) fill_gaps: bool,
    /// Output formats, comma separated (defaults to all)
    #[arg(long, value_delimiter = ',')]
    pub(crate) format: Vec<ExportFormat>,
    /// Directory the exports are written to
    #[arg(long, default_value = "reports")]
    pub(crate) out_dir: PathBuf,
}

impl ReportArgs {
    fn request(&self) -> ReportRequest {
        let filters = self
            .district
            .iter()
            .fold(FilterSet::new(), |filters, district| filters.with_district(district));
        let filters = self
            .vaccine
            .iter()
            .fold(filters, |filters, vaccine| filters.with_vaccine(vaccine));
        let filters = self
            .age_group
            .iter()
            .fold(filters, |filters, group| filters.with_age_group(group));
        let filters = self
            .gender
            .iter()
            .fold(filters, |filters, &gender| filters.with_gender(gender))
            .with_date_range(self.from, self.to);

        let request = ReportRequest::new(filters).with_granularity(self.granularity);
        if self.fill_gaps {
            request.with_gap_filling()
        } else {
            request
        }
    }

    fn formats(&self) -> Vec<ExportFormat> {
        if self.format.is_empty() {
            ExportFormat::ordered().to_vec()
        } else {
            self.format.clone()
        }
    }
}

/// What a report run produced on disk.
#[derive(Debug, Default)]
pub(crate) struct ReportOutcome {
    pub(crate) load_summary: String,
    pub(crate) no_data: bool,
    pub(crate) written: Vec<PathBuf>,
    pub(crate) failures: Vec<String>,
    pub(crate) digest: Option<String>,
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let outcome = generate_report(&args, &config.ingestion, &config.analytics)?;

    println!("Coverage report");
    println!("Data: {}", outcome.load_summary);
    if outcome.no_data {
        println!("No data for this selection; exports show the empty state.");
    }
    for path in &outcome.written {
        println!("  wrote {}", path.display());
    }
    for failure in &outcome.failures {
        eprintln!("  skipped: {failure}");
    }
    if let Some(digest) = &outcome.digest {
        println!();
        print!("{digest}");
    }

    Ok(())
}

pub(crate) fn generate_report(
    args: &ReportArgs,
    ingestion: &IngestionConfig,
    analytics: &AnalyticsConfig,
) -> Result<ReportOutcome, AppError> {
    let source: Box<dyn RecordSource> = match &args.data {
        Some(path) => {
            Box::new(CsvSource::from_path(path).with_max_bytes(ingestion.max_upload_bytes))
        }
        None => source_from_config(ingestion),
    };
    let dataset = load_dataset(source.as_ref())?;
    let report = Report::build(&dataset, &args.request(), analytics);

    fs::create_dir_all(&args.out_dir)?;
    let exporter = ReportExporter::new(analytics);
    let mut outcome = ReportOutcome {
        load_summary: dataset.load_report().summary_line(),
        no_data: report.is_no_data(),
        ..ReportOutcome::default()
    };

    for (format, result) in exporter.export_all(&report, &args.formats()) {
        match result {
            Ok(bytes) => {
                let path = args
                    .out_dir
                    .join(format!("coverage-report.{}", format.extension()));
                write_atomically(&path, &bytes)?;
                if format == ExportFormat::Text {
                    outcome.digest = Some(String::from_utf8_lossy(&bytes).into_owned());
                }
                outcome.written.push(path);
            }
            Err(err) => outcome.failures.push(err.to_string()),
        }
    }

    Ok(outcome)
}

/// Readers of `path` see either the previous file or the complete new one.
///
/// Each write stages into its own uniquely named file beside `path`, so
/// concurrent runs never share a staging file. A failed write drops the
/// staged file.
fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(io::Error::from)?;
    Ok(())
}
