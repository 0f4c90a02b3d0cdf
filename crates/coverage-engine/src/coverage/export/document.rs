use super::super::report::Report;
use super::charts::{ChartPoint, ChartRenderer};
use super::{escape, percent, ExportFailure};
use std::fmt::Write;

const STYLE: &str = "body{font-family:Helvetica,Arial,sans-serif;margin:2rem;color:#222}\
table{border-collapse:collapse;margin:1rem 0}\
th,td{border:1px solid #ccc;padding:4px 10px;text-align:left}\
th{background:#f2f2f2}\
.critical{color:#c0392b}.warning{color:#b36b00}.informational{color:#1f5fa8}\
.chart{display:block;margin:1rem 0}";

/// Self-contained HTML: KPIs, one chart per summarizer, tables and recommendations.
///
/// Charts are rendered before any markup is assembled, so a renderer failure
/// aborts the document without producing output.
pub(crate) fn render<C: ChartRenderer>(report: &Report, renderer: &C) -> Result<String, ExportFailure> {
    let geographic: Vec<ChartPoint> = report
        .districts
        .iter()
        .map(|district| ChartPoint::new(district.district.as_str(), Some(district.coverage)))
        .collect();
    let timeline: Vec<ChartPoint> = report
        .timeline
        .buckets
        .iter()
        .map(|bucket| ChartPoint::new(bucket.label.as_str(), bucket.coverage))
        .collect();
    let demographic: Vec<ChartPoint> = report
        .demographics
        .buckets
        .iter()
        .map(|bucket| {
            ChartPoint::new(
                format!("{} / {}", bucket.age_group, bucket.gender),
                Some(bucket.coverage),
            )
        })
        .collect();

    let geographic_chart = renderer.bar_chart("Coverage by district", &geographic)?;
    let timeline_title = format!("Coverage by {}", report.timeline.granularity);
    let timeline_chart = renderer.line_chart(&timeline_title, &timeline)?;
    let demographic_chart = renderer.bar_chart("Coverage by age group and gender", &demographic)?;

    let mut html = String::new();
    write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Vaccination Coverage Report</title>\n<style>{STYLE}</style>\n</head>\n<body>\n"
    )?;
    writeln!(html, "<h1>Vaccination Coverage Report</h1>")?;
    writeln!(
        html,
        "<p>Generated {} &middot; Selection: {} &middot; {}</p>",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        escape(&report.selection),
        escape(&report.load_summary)
    )?;

    write_kpis(&mut html, report)?;

    writeln!(html, "<h2>Geographic coverage</h2>")?;
    html.push_str(&geographic_chart);
    write_districts(&mut html, report)?;

    writeln!(html, "<h2>Coverage over time</h2>")?;
    html.push_str(&timeline_chart);
    match &report.timeline.trend {
        Some(trend) => writeln!(
            html,
            "<p>Trend: {} ({:.1}% to {:.1}%, {:+.1} points). Undated records: {}.</p>",
            trend.direction.label(),
            trend.first_half,
            trend.second_half,
            trend.delta,
            report.timeline.undated
        )?,
        None => writeln!(
            html,
            "<p>Trend: not enough dated periods. Undated records: {}.</p>",
            report.timeline.undated
        )?,
    }

    writeln!(html, "<h2>Demographic coverage</h2>")?;
    html.push_str(&demographic_chart);

    write_recommendations(&mut html, report)?;
    write_data_quality(&mut html, report)?;

    writeln!(html, "</body>\n</html>")?;
    Ok(html)
}

fn write_kpis(html: &mut String, report: &Report) -> std::fmt::Result {
    let kpis = &report.kpis;
    writeln!(html, "<h2>Key indicators</h2>\n<table>")?;
    writeln!(
        html,
        "<tr><th>Overall coverage</th><td>{}</td></tr>",
        percent(kpis.overall_coverage)
    )?;
    writeln!(
        html,
        "<tr><th>Target</th><td>{:.1}%</td></tr>",
        kpis.target_threshold
    )?;
    writeln!(
        html,
        "<tr><th>Records meeting target</th><td>{}</td></tr>",
        percent(kpis.target_achievement)
    )?;
    writeln!(html, "<tr><th>Records</th><td>{}</td></tr>", kpis.record_count)?;
    writeln!(html, "<tr><th>Districts</th><td>{}</td></tr>", kpis.district_count)?;
    for tier in &kpis.tiers {
        writeln!(
            html,
            "<tr><th>{} districts</th><td>{}</td></tr>",
            tier.tier_label, tier.districts
        )?;
    }
    writeln!(
        html,
        "<tr><th>Children tracked</th><td>{}</td></tr>",
        report.statistics.children
    )?;
    writeln!(html, "</table>")?;

    if !kpis.low_coverage_alerts.is_empty() {
        writeln!(
            html,
            "<h3>Districts below {:.0}%</h3>\n<ul>",
            kpis.alert_threshold
        )?;
        for alert in &kpis.low_coverage_alerts {
            writeln!(
                html,
                "<li>{}: {:.1}%</li>",
                escape(&alert.district),
                alert.coverage
            )?;
        }
        writeln!(html, "</ul>")?;
    }
    Ok(())
}

fn write_districts(html: &mut String, report: &Report) -> std::fmt::Result {
    if report.districts.is_empty() {
        return writeln!(html, "<p>No data for this selection.</p>");
    }
    writeln!(
        html,
        "<table>\n<tr><th>District</th><th>Coverage</th><th>Tier</th><th>Records</th></tr>"
    )?;
    for district in &report.districts {
        writeln!(
            html,
            "<tr><td>{}</td><td>{:.1}%</td><td>{}</td><td>{}</td></tr>",
            escape(&district.district),
            district.coverage,
            district.tier_label,
            district.record_count
        )?;
    }
    writeln!(html, "</table>")
}

fn write_recommendations(html: &mut String, report: &Report) -> std::fmt::Result {
    writeln!(html, "<h2>Recommendations</h2>")?;
    if report.recommendations.is_empty() {
        return writeln!(html, "<p>No recommendations for this selection.</p>");
    }
    writeln!(html, "<ol>")?;
    for recommendation in &report.recommendations {
        writeln!(
            html,
            "<li class=\"{}\"><strong>{}</strong>: {}</li>",
            recommendation.severity_label.to_ascii_lowercase(),
            recommendation.severity_label,
            escape(&recommendation.text)
        )?;
    }
    writeln!(html, "</ol>")
}

fn write_data_quality(html: &mut String, report: &Report) -> std::fmt::Result {
    let quality = &report.data_quality;
    writeln!(html, "<h2>Data quality</h2>\n<table>")?;
    writeln!(html, "<tr><th>Field</th><th>Missing</th><th>Completeness</th></tr>")?;
    for field in &quality.fields {
        writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{:.1}%</td></tr>",
            field.field, field.missing, field.completeness
        )?;
    }
    writeln!(html, "</table>")?;
    if let (Some(earliest), Some(latest)) = (quality.earliest_date, quality.latest_date) {
        writeln!(html, "<p>Dates from {earliest} to {latest}.</p>")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::config::AnalyticsConfig;
    use crate::coverage::export::SvgChartRenderer;
    use crate::coverage::report::ReportRequest;
    use crate::coverage::test_support::{dataset, record};

    #[test]
    fn document_holds_three_charts_and_escaped_names() {
        let dataset = dataset(vec![
            record("Amritsar", "BCG", 95.0),
            record("Amritsar", "DPT1", 60.0),
            record("Mansa <east>", "BCG", 50.0),
        ]);
        let report = Report::build(&dataset, &ReportRequest::default(), &AnalyticsConfig::default());
        let html = render(&report, &SvgChartRenderer::default()).expect("document renders");
        assert_eq!(html.matches("<svg").count(), 3);
        assert!(html.contains("Mansa &lt;East&gt;"));
        assert!(!html.contains("<east>"));
        assert!(html.ends_with("</html>\n"));
    }
}
