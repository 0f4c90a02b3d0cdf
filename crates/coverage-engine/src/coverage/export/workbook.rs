use super::super::recommendations::RecommendationSubject;
use super::super::report::Report;
use super::ExportFailure;
use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, Worksheet, XlsxError};

pub const SHEET_NAMES: [&str; 4] = ["Summary", "Geographic", "Timeline", "Demographics"];

enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Rate(Option<f64>),
    Count(usize),
}

/// Writes rows top to bottom on one sheet.
struct SheetCursor<'a> {
    sheet: &'a mut Worksheet,
    bold: &'a Format,
    row: RowNum,
}

impl<'a> SheetCursor<'a> {
    fn new(sheet: &'a mut Worksheet, bold: &'a Format) -> Self {
        Self { sheet, bold, row: 0 }
    }

    fn advance(&mut self) -> Result<(), XlsxError> {
        self.row = self
            .row
            .checked_add(1)
            .ok_or(XlsxError::RowColumnLimitError)?;
        Ok(())
    }

    fn header(&mut self, titles: &[&str]) -> Result<(), XlsxError> {
        for (col, title) in titles.iter().enumerate() {
            self.sheet
                .write_string_with_format(self.row, column(col)?, *title, self.bold)?;
        }
        self.advance()
    }

    fn row(&mut self, cells: &[Cell<'_>]) -> Result<(), XlsxError> {
        for (col, cell) in cells.iter().enumerate() {
            let col = column(col)?;
            match cell {
                Cell::Text(value) => {
                    self.sheet.write_string(self.row, col, *value)?;
                }
                Cell::Number(value) => {
                    self.sheet.write_number(self.row, col, *value)?;
                }
                Cell::Rate(Some(value)) => {
                    self.sheet.write_number(self.row, col, *value)?;
                }
                Cell::Rate(None) => {
                    self.sheet.write_string(self.row, col, "no data")?;
                }
                Cell::Count(value) => {
                    self.sheet.write_number(self.row, col, *value as f64)?;
                }
            }
        }
        self.advance()
    }

    fn blank(&mut self) -> Result<(), XlsxError> {
        self.advance()
    }
}

fn column(index: usize) -> Result<ColNum, XlsxError> {
    ColNum::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

pub(crate) fn render(report: &Report) -> Result<Vec<u8>, ExportFailure> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    summary_sheet(&mut workbook, &bold, report)?;
    geographic_sheet(&mut workbook, &bold, report)?;
    timeline_sheet(&mut workbook, &bold, report)?;
    demographics_sheet(&mut workbook, &bold, report)?;

    Ok(workbook.save_to_buffer()?)
}

fn summary_sheet(workbook: &mut Workbook, bold: &Format, report: &Report) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet().set_name(SHEET_NAMES[0])?;
    sheet.set_column_width(0, 28)?;
    sheet.set_column_width(2, 80)?;
    let mut cursor = SheetCursor::new(sheet, bold);
    let kpis = &report.kpis;
    let generated = report.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target_met = match kpis.target_met {
        Some(true) => "yes",
        Some(false) => "no",
        None => "no data",
    };

    cursor.header(&["Metric", "Value"])?;
    cursor.row(&[Cell::Text("Generated at"), Cell::Text(&generated)])?;
    cursor.row(&[Cell::Text("Dataset"), Cell::Text(report.dataset_id.as_str())])?;
    cursor.row(&[Cell::Text("Selection"), Cell::Text(&report.selection)])?;
    cursor.row(&[Cell::Text("Load summary"), Cell::Text(&report.load_summary)])?;
    cursor.row(&[Cell::Text("Overall coverage (%)"), Cell::Rate(kpis.overall_coverage)])?;
    cursor.row(&[Cell::Text("Target threshold (%)"), Cell::Number(kpis.target_threshold)])?;
    cursor.row(&[Cell::Text("Target met"), Cell::Text(target_met)])?;
    cursor.row(&[
        Cell::Text("Records meeting target (%)"),
        Cell::Rate(kpis.target_achievement),
    ])?;
    cursor.row(&[Cell::Text("Records"), Cell::Count(kpis.record_count)])?;
    cursor.row(&[Cell::Text("Population"), Cell::Number(kpis.population)])?;
    cursor.row(&[Cell::Text("Districts"), Cell::Count(kpis.district_count)])?;
    cursor.row(&[Cell::Text("Vaccines"), Cell::Count(kpis.vaccine_count)])?;
    for tier in &kpis.tiers {
        let label = format!("{} districts", tier.tier_label);
        cursor.row(&[Cell::Text(&label), Cell::Count(tier.districts)])?;
    }
    cursor.row(&[
        Cell::Text("Children"),
        Cell::Count(report.statistics.children),
    ])?;
    cursor.row(&[
        Cell::Text("Fully vaccinated children"),
        Cell::Count(report.statistics.fully_vaccinated),
    ])?;
    cursor.row(&[
        Cell::Text("Data completeness (%)"),
        Cell::Rate(report.data_quality.completeness),
    ])?;

    cursor.blank()?;
    let alert_title = format!("Districts below {:.0}%", kpis.alert_threshold);
    cursor.header(&[alert_title.as_str(), "Coverage (%)"])?;
    for alert in &kpis.low_coverage_alerts {
        cursor.row(&[Cell::Text(&alert.district), Cell::Number(alert.coverage)])?;
    }

    cursor.blank()?;
    cursor.header(&["Severity", "Subject", "Recommendation", "Metric"])?;
    for recommendation in &report.recommendations {
        let subject = recommendation
            .subject
            .as_ref()
            .map(RecommendationSubject::name)
            .unwrap_or_default();
        cursor.row(&[
            Cell::Text(recommendation.severity_label),
            Cell::Text(subject),
            Cell::Text(&recommendation.text),
            Cell::Number(recommendation.metric),
        ])?;
    }
    Ok(())
}

fn geographic_sheet(
    workbook: &mut Workbook,
    bold: &Format,
    report: &Report,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet().set_name(SHEET_NAMES[1])?;
    sheet.set_column_width(0, 24)?;
    let mut cursor = SheetCursor::new(sheet, bold);
    cursor.header(&[
        "District",
        "Coverage (%)",
        "Tier",
        "Records",
        "Population",
        "Min coverage (%)",
        "Max coverage (%)",
        "Children",
        "Villages",
    ])?;
    for district in &report.districts {
        cursor.row(&[
            Cell::Text(&district.district),
            Cell::Number(district.coverage),
            Cell::Text(district.tier_label),
            Cell::Count(district.record_count),
            Cell::Number(district.population),
            Cell::Number(district.min_coverage),
            Cell::Number(district.max_coverage),
            Cell::Count(district.children),
            Cell::Count(district.villages),
        ])?;
    }

    cursor.blank()?;
    cursor.header(&["District", "Vaccine", "Coverage (%)", "Records", "Population"])?;
    for district in &report.districts {
        for vaccine in &district.vaccines {
            cursor.row(&[
                Cell::Text(&district.district),
                Cell::Text(&vaccine.vaccine_type),
                Cell::Number(vaccine.coverage),
                Cell::Count(vaccine.record_count),
                Cell::Number(vaccine.population),
            ])?;
        }
    }
    Ok(())
}

fn timeline_sheet(workbook: &mut Workbook, bold: &Format, report: &Report) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet().set_name(SHEET_NAMES[2])?;
    sheet.set_column_width(0, 16)?;
    let mut cursor = SheetCursor::new(sheet, bold);
    let timeline = &report.timeline;

    let period_title = format!("Period ({})", timeline.granularity);
    cursor.header(&[period_title.as_str(), "Start", "Coverage (%)", "Records", "Population"])?;
    for bucket in &timeline.buckets {
        let start = bucket.period_start.format("%Y-%m-%d").to_string();
        cursor.row(&[
            Cell::Text(&bucket.label),
            Cell::Text(&start),
            Cell::Rate(bucket.coverage),
            Cell::Count(bucket.record_count),
            Cell::Number(bucket.population),
        ])?;
    }
    cursor.row(&[Cell::Text("Undated records"), Cell::Count(timeline.undated)])?;

    cursor.blank()?;
    cursor.header(&["Trend", "First half (%)", "Second half (%)", "Delta"])?;
    match &timeline.trend {
        Some(trend) => cursor.row(&[
            Cell::Text(trend.direction.label()),
            Cell::Number(trend.first_half),
            Cell::Number(trend.second_half),
            Cell::Number(trend.delta),
        ])?,
        None => cursor.row(&[Cell::Text("Not enough dated periods")])?,
    }

    cursor.blank()?;
    cursor.header(&["Calendar month", "Coverage (%)", "Records"])?;
    for entry in &timeline.seasonal {
        cursor.row(&[
            Cell::Text(entry.month_label),
            Cell::Number(entry.coverage),
            Cell::Count(entry.record_count),
        ])?;
    }
    Ok(())
}

fn demographics_sheet(
    workbook: &mut Workbook,
    bold: &Format,
    report: &Report,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet().set_name(SHEET_NAMES[3])?;
    sheet.set_column_width(0, 18)?;
    let mut cursor = SheetCursor::new(sheet, bold);
    let demographics = &report.demographics;

    cursor.header(&["Age group", "Gender", "Coverage (%)", "Records", "Population"])?;
    for bucket in &demographics.buckets {
        cursor.row(&[
            Cell::Text(&bucket.age_group),
            Cell::Text(&bucket.gender),
            Cell::Number(bucket.coverage),
            Cell::Count(bucket.record_count),
            Cell::Number(bucket.population),
        ])?;
    }

    cursor.blank()?;
    cursor.header(&["Gender", "Coverage (%)", "Records"])?;
    for marginal in &demographics.by_gender {
        cursor.row(&[
            Cell::Text(&marginal.label),
            Cell::Number(marginal.coverage),
            Cell::Count(marginal.record_count),
        ])?;
    }

    cursor.blank()?;
    cursor.header(&["Age group", "Coverage (%)", "Records"])?;
    for marginal in &demographics.by_age_group {
        cursor.row(&[
            Cell::Text(&marginal.label),
            Cell::Number(marginal.coverage),
            Cell::Count(marginal.record_count),
        ])?;
    }
    Ok(())
}
