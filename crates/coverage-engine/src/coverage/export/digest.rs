use super::super::domain::CoverageTier;
use super::super::report::Report;
use super::{percent, ExportFailure};
use std::fmt::Write;

const DIGEST_ITEMS: usize = 3;

/// Fixed-template digest: overall rate, top critical districts, top recommendations.
pub(crate) fn render(report: &Report) -> Result<String, ExportFailure> {
    let mut text = String::new();
    writeln!(text, "VACCINATION COVERAGE DIGEST")?;
    writeln!(text, "{}", "=".repeat(50))?;
    writeln!(
        text,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(text, "Selection: {}", report.selection)?;
    writeln!(text, "Data: {}", report.load_summary)?;
    writeln!(text)?;

    writeln!(
        text,
        "Overall coverage: {} (target {:.1}%)",
        percent(report.kpis.overall_coverage),
        report.kpis.target_threshold
    )?;
    writeln!(
        text,
        "Records: {} across {} district(s)",
        report.kpis.record_count, report.kpis.district_count
    )?;
    writeln!(text)?;

    writeln!(text, "CRITICAL DISTRICTS")?;
    writeln!(text, "{}", "-".repeat(20))?;
    let mut critical: Vec<_> = report
        .districts
        .iter()
        .filter(|district| district.tier == CoverageTier::Red)
        .collect();
    critical.sort_by(|a, b| a.coverage.total_cmp(&b.coverage));
    if critical.is_empty() {
        writeln!(text, "None")?;
    }
    for (index, district) in critical.iter().take(DIGEST_ITEMS).enumerate() {
        writeln!(
            text,
            "{}. {}: {:.1}%",
            index + 1,
            district.district,
            district.coverage
        )?;
    }
    writeln!(text)?;

    writeln!(text, "TOP RECOMMENDATIONS")?;
    writeln!(text, "{}", "-".repeat(20))?;
    if report.recommendations.is_empty() {
        writeln!(text, "None")?;
    }
    for (index, recommendation) in report
        .recommendations
        .iter()
        .take(DIGEST_ITEMS)
        .enumerate()
    {
        writeln!(
            text,
            "{}. [{}] {}",
            index + 1,
            recommendation.severity_label,
            recommendation.text
        )?;
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::config::AnalyticsConfig;
    use crate::coverage::report::ReportRequest;
    use crate::coverage::test_support::{dataset, record};

    #[test]
    fn digest_lists_at_most_three_critical_districts() {
        let dataset = dataset(vec![
            record("Mansa", "BCG", 50.0),
            record("Bathinda", "BCG", 40.0),
            record("Faridkot", "BCG", 60.0),
            record("Moga", "BCG", 70.0),
            record("Ludhiana", "BCG", 95.0),
        ]);
        let report = Report::build(&dataset, &ReportRequest::default(), &AnalyticsConfig::default());
        let digest = render(&report).expect("digest renders");

        assert!(digest.contains("Overall coverage: 63.0% (target 90.0%)"));
        assert!(digest.contains("1. Bathinda: 40.0%"));
        assert!(digest.contains("3. Faridkot: 60.0%"));
        assert!(!digest.contains("Moga: 70.0%"));
        assert!(digest.contains("1. [Critical] Bathinda"));
    }

    #[test]
    fn empty_selection_says_no_data() {
        let report = Report::build(
            &dataset(Vec::new()),
            &ReportRequest::default(),
            &AnalyticsConfig::default(),
        );
        let digest = render(&report).expect("digest renders");
        assert!(digest.contains("Overall coverage: no data"));
        assert!(digest.contains("CRITICAL DISTRICTS\n--------------------\nNone"));
    }
}
