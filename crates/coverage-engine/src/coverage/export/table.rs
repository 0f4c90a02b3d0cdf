use super::super::report::Report;
use super::super::validation::ROLLUP_SCOPE;
use super::ExportFailure;

pub const RAW_TABLE_HEADERS: [&str; 7] = [
    "scope",
    "district",
    "vaccine_type",
    "coverage_percentage",
    "population_weight",
    "record_count",
    "tier",
];

const VACCINE_SCOPE: &str = "vaccine";

/// One rollup row per district followed by that district's per-vaccine rows.
///
/// Vaccine rows carry their population as `population_weight`, so the table can
/// be fed back through the validator as pre-aggregated cohorts.
pub(crate) fn render(report: &Report) -> Result<Vec<u8>, ExportFailure> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RAW_TABLE_HEADERS)?;

    for district in &report.districts {
        writer.write_record([
            ROLLUP_SCOPE,
            district.district.as_str(),
            "",
            district.coverage.to_string().as_str(),
            district.population.to_string().as_str(),
            district.record_count.to_string().as_str(),
            district.tier_label,
        ])?;

        for vaccine in &district.vaccines {
            writer.write_record([
                VACCINE_SCOPE,
                district.district.as_str(),
                vaccine.vaccine_type.as_str(),
                vaccine.coverage.to_string().as_str(),
                vaccine.population.to_string().as_str(),
                vaccine.record_count.to_string().as_str(),
                "",
            ])?;
        }
    }

    writer
        .into_inner()
        .map_err(|err| ExportFailure::Io(err.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::config::AnalyticsConfig;
    use crate::coverage::report::ReportRequest;
    use crate::coverage::test_support::{dataset, record};

    #[test]
    fn district_rows_precede_their_vaccine_rows() {
        let dataset = dataset(vec![
            record("Amritsar", "BCG", 95.0),
            record("Amritsar", "DPT1", 60.0),
        ]);
        let report = Report::build(&dataset, &ReportRequest::default(), &AnalyticsConfig::default());
        let bytes = render(&report).expect("table renders");
        let text = String::from_utf8(bytes).expect("utf-8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "scope,district,vaccine_type,coverage_percentage,population_weight,record_count,tier",
                "district,Amritsar,,77.5,2,2,Orange",
                "vaccine,Amritsar,BCG,95,1,1,",
                "vaccine,Amritsar,DPT1,60,1,1,",
            ]
        );
    }
}
