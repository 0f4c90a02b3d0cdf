use super::aggregate::AggregateResult;
use super::config::AnalyticsConfig;
use super::demographics::{DemographicBreakdown, DemographicMarginal};
use super::domain::{CoverageTier, Gender, Severity, UNSPECIFIED_LABEL};
use super::geography::DistrictSummary;
use super::timeline::{trend_signal, SeasonalEntry, TimelineBucket};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum RecommendationSubject {
    District(String),
    Vaccine(String),
    Gender(String),
    Month(String),
    AgeGroup(String),
}

impl RecommendationSubject {
    pub fn name(&self) -> &str {
        match self {
            Self::District(name)
            | Self::Vaccine(name)
            | Self::Gender(name)
            | Self::Month(name)
            | Self::AgeGroup(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub severity: Severity,
    pub severity_label: &'static str,
    pub subject: Option<RecommendationSubject>,
    pub text: String,
    /// The value that triggered the rule: a rate, shortfall, gap or trend delta.
    pub metric: f64,
}

impl Recommendation {
    fn new(
        severity: Severity,
        subject: Option<RecommendationSubject>,
        text: String,
        metric: f64,
    ) -> Self {
        Self {
            severity,
            severity_label: severity.label(),
            subject,
            text,
            metric,
        }
    }
}

/// Applies the fixed rule table and returns items most severe first.
///
/// Returns an empty sequence when the aggregate carries no data.
pub fn recommend(
    aggregate: &AggregateResult,
    districts: &[DistrictSummary],
    timeline: &[TimelineBucket],
    seasonal: &[SeasonalEntry],
    demographics: &DemographicBreakdown,
    config: &AnalyticsConfig,
) -> Vec<Recommendation> {
    let Some(overall) = aggregate.overall_coverage else {
        return Vec::new();
    };

    let mut recommendations = Vec::new();

    let mut red: Vec<&DistrictSummary> = districts
        .iter()
        .filter(|district| district.tier == CoverageTier::Red)
        .collect();
    red.sort_by(|a, b| {
        a.coverage
            .partial_cmp(&b.coverage)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.district.cmp(&b.district))
    });
    for district in red {
        recommendations.push(Recommendation::new(
            Severity::Critical,
            Some(RecommendationSubject::District(district.district.clone())),
            format!(
                "{} is in the Red tier at {:.1}% coverage; schedule catch-up immunization sessions",
                district.district, district.coverage
            ),
            district.coverage,
        ));
    }

    if overall < config.target_threshold {
        let shortfall = config.target_threshold - overall;
        recommendations.push(Recommendation::new(
            Severity::Warning,
            None,
            format!(
                "Overall coverage {:.1}% is {:.1} points below the {:.0}% target",
                overall, shortfall, config.target_threshold
            ),
            shortfall,
        ));
    }

    let mut lagging: Vec<(f64, &str)> = aggregate
        .by_vaccine
        .iter()
        .map(|vaccine| (overall - vaccine.coverage, vaccine.vaccine_type.as_str()))
        .filter(|(gap, _)| *gap > config.vaccine_gap_points)
        .collect();
    lagging.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(b.1))
    });
    for (gap, vaccine) in lagging {
        recommendations.push(Recommendation::new(
            Severity::Warning,
            Some(RecommendationSubject::Vaccine(vaccine.to_string())),
            format!(
                "{} coverage trails the overall rate by {:.1} points; review supply and outreach",
                vaccine, gap
            ),
            gap,
        ));
    }

    if let Some(trend) = trend_signal(timeline, config.trend_tolerance) {
        if trend.delta < -config.trend_tolerance {
            recommendations.push(Recommendation::new(
                Severity::Informational,
                None,
                format!(
                    "Coverage fell {:.1} points between the first and second half of the period",
                    -trend.delta
                ),
                trend.delta,
            ));
        }
    }

    recommendations.extend(gender_gap(&demographics.by_gender, config));
    recommendations.extend(seasonal_dips(seasonal, config));
    recommendations.extend(lagging_age_groups(&demographics.by_age_group, config));

    // Stable sort keeps rule order within one severity.
    recommendations.sort_by_key(|recommendation| recommendation.severity);
    recommendations
}

fn by_coverage(a: &&DemographicMarginal, b: &&DemographicMarginal) -> Ordering {
    a.coverage
        .partial_cmp(&b.coverage)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.label.cmp(&b.label))
}

/// Widest gap between recorded genders; absent and unrecognized values are not a gender.
fn gender_gap(by_gender: &[DemographicMarginal], config: &AnalyticsConfig) -> Option<Recommendation> {
    let mut recorded: Vec<&DemographicMarginal> = by_gender
        .iter()
        .filter(|marginal| {
            marginal.label != UNSPECIFIED_LABEL && marginal.label != Gender::Unknown.label()
        })
        .collect();
    recorded.sort_by(by_coverage);
    let (lowest, highest) = (recorded.first()?, recorded.last()?);

    let gap = highest.coverage - lowest.coverage;
    (gap > config.gender_gap_points).then(|| {
        Recommendation::new(
            Severity::Informational,
            Some(RecommendationSubject::Gender(lowest.label.clone())),
            format!(
                "{} coverage trails {} by {:.1} points; plan targeted outreach",
                lowest.label, highest.label, gap
            ),
            gap,
        )
    })
}

/// Calendar months more than `seasonal_dip_points` below the mean monthly rate.
fn seasonal_dips(seasonal: &[SeasonalEntry], config: &AnalyticsConfig) -> Vec<Recommendation> {
    if seasonal.len() < 2 {
        return Vec::new();
    }
    let mean = seasonal.iter().map(|entry| entry.coverage).sum::<f64>() / seasonal.len() as f64;

    seasonal
        .iter()
        .filter(|entry| entry.coverage < mean - config.seasonal_dip_points)
        .map(|entry| {
            let dip = entry.coverage - mean;
            Recommendation::new(
                Severity::Informational,
                Some(RecommendationSubject::Month(entry.month_label.to_string())),
                format!(
                    "{} runs {:.1} points below the average month; plan intensive campaigns then",
                    entry.month_label, -dip
                ),
                dip,
            )
        })
        .collect()
}

fn lagging_age_groups(
    by_age_group: &[DemographicMarginal],
    config: &AnalyticsConfig,
) -> Vec<Recommendation> {
    let mut lagging: Vec<&DemographicMarginal> = by_age_group
        .iter()
        .filter(|marginal| marginal.label != UNSPECIFIED_LABEL)
        .filter(|marginal| marginal.coverage < config.age_group_floor)
        .collect();
    lagging.sort_by(by_coverage);

    lagging
        .into_iter()
        .map(|marginal| {
            Recommendation::new(
                Severity::Informational,
                Some(RecommendationSubject::AgeGroup(marginal.label.clone())),
                format!(
                    "Age group {} is at {:.1}% coverage; design age-specific outreach",
                    marginal.label, marginal.coverage
                ),
                marginal.coverage,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::aggregate::aggregate;
    use crate::coverage::demographics::analyze_demographics;
    use crate::coverage::domain::VaccinationRecord;
    use crate::coverage::filter::FilterSet;
    use crate::coverage::geography::summarize_districts;
    use crate::coverage::test_support::{dated, record};
    use crate::coverage::timeline::{analyze_timeline, TimelineOptions};

    fn run(records: &[VaccinationRecord]) -> Vec<Recommendation> {
        let config = AnalyticsConfig::default();
        let filters = FilterSet::new();
        let result = aggregate(records, &filters, &config);
        let subset = filters.apply(records);
        let districts = summarize_districts(&subset, &config.tiers);
        let timeline = analyze_timeline(&subset, TimelineOptions::default(), config.trend_tolerance);
        let demographics = analyze_demographics(&subset);
        recommend(
            &result,
            &districts,
            &timeline.buckets,
            &timeline.seasonal,
            &demographics,
            &config,
        )
    }

    fn profiled(
        coverage: f64,
        date: &str,
        age_group: &str,
        gender: Option<Gender>,
    ) -> VaccinationRecord {
        let mut record = dated("Ludhiana", "BCG", coverage, date);
        record.age_group = Some(age_group.to_string());
        record.gender = gender;
        record
    }

    fn informational(recommendations: &[Recommendation]) -> Vec<&RecommendationSubject> {
        recommendations
            .iter()
            .filter(|r| r.severity == Severity::Informational)
            .filter_map(|r| r.subject.as_ref())
            .collect()
    }

    #[test]
    fn amritsar_example_warns_about_shortfall_and_dpt1() {
        let recommendations = run(&[
            record("Amritsar", "BCG", 95.0),
            record("Amritsar", "DPT1", 60.0),
        ]);
        assert_eq!(recommendations.len(), 2);
        assert!(recommendations
            .iter()
            .all(|r| r.severity == Severity::Warning));
        assert_eq!(recommendations[0].metric, 12.5);
        assert_eq!(
            recommendations[1].subject,
            Some(RecommendationSubject::Vaccine("DPT1".to_string()))
        );
        assert_eq!(recommendations[1].metric, 17.5);
    }

    #[test]
    fn red_districts_come_first_lowest_rate_first() {
        let recommendations = run(&[
            record("Mansa", "BCG", 70.0),
            record("Bathinda", "BCG", 50.0),
            record("Ludhiana", "BCG", 99.0),
        ]);
        assert_eq!(recommendations[0].severity, Severity::Critical);
        assert_eq!(
            recommendations[0].subject,
            Some(RecommendationSubject::District("Bathinda".to_string()))
        );
        assert_eq!(
            recommendations[1].subject,
            Some(RecommendationSubject::District("Mansa".to_string()))
        );
        assert_eq!(recommendations[2].severity, Severity::Warning);
    }

    #[test]
    fn falling_trend_adds_informational_item_last() {
        let recommendations = run(&[
            dated("Ludhiana", "BCG", 99.0, "2024-01-10"),
            dated("Ludhiana", "BCG", 91.0, "2024-06-10"),
        ]);
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].severity, Severity::Informational);
        assert_eq!(recommendations[0].metric, -8.0);
    }

    #[test]
    fn no_data_yields_no_recommendations() {
        let config = AnalyticsConfig::default();
        let records = vec![record("Amritsar", "BCG", 20.0)];
        let filters = FilterSet::new().with_district("Bathinda");
        let result = aggregate(&records, &filters, &config);
        let demographics = DemographicBreakdown::default();
        assert!(recommend(&result, &[], &[], &[], &demographics, &config).is_empty());
    }

    #[test]
    fn identical_inputs_produce_identical_sequences() {
        let records = vec![
            record("Mansa", "BCG", 60.0),
            record("Bathinda", "OPV", 40.0),
            record("Ludhiana", "DPT1", 95.0),
        ];
        assert_eq!(run(&records), run(&records));
    }

    #[test]
    fn gender_gap_above_ten_points_is_flagged_for_the_lower_gender() {
        let recommendations = run(&[
            profiled(98.0, "2024-01-10", "0-1", Some(Gender::Male)),
            profiled(96.0, "2024-01-12", "0-1", Some(Gender::Male)),
            profiled(85.0, "2024-01-15", "0-1", Some(Gender::Female)),
            profiled(30.0, "2024-01-16", "0-1", Some(Gender::Unknown)),
        ]);
        let gap = recommendations
            .iter()
            .find(|r| matches!(r.subject, Some(RecommendationSubject::Gender(_))))
            .expect("gender gap reported");
        assert_eq!(gap.severity, Severity::Informational);
        assert_eq!(gap.subject.as_ref().map(RecommendationSubject::name), Some("Female"));
        assert_eq!(gap.metric, 12.0);
        assert!(gap.text.contains("trails Male by 12.0 points"));
    }

    #[test]
    fn gender_gap_at_ten_points_is_not_flagged() {
        let recommendations = run(&[
            profiled(95.0, "2024-01-10", "0-1", Some(Gender::Male)),
            profiled(85.0, "2024-01-15", "0-1", Some(Gender::Female)),
        ]);
        assert!(informational(&recommendations).is_empty());
    }

    #[test]
    fn months_well_below_the_monthly_mean_are_flagged() {
        let recommendations = run(&[
            profiled(96.0, "2024-01-10", "0-1", None),
            profiled(95.0, "2024-02-10", "0-1", None),
            profiled(94.0, "2024-03-10", "0-1", None),
            profiled(83.0, "2024-04-10", "0-1", None),
        ]);
        assert_eq!(
            informational(&recommendations),
            vec![&RecommendationSubject::Month("April".to_string())]
        );
        let april = recommendations
            .iter()
            .find(|r| matches!(r.subject, Some(RecommendationSubject::Month(_))))
            .expect("april flagged");
        assert_eq!(april.metric, -9.0);
    }

    #[test]
    fn age_groups_below_eighty_are_flagged_lowest_first() {
        let recommendations = run(&[
            profiled(79.0, "2024-01-10", "1-2", None),
            profiled(79.0, "2024-01-11", "1-2", None),
            profiled(70.0, "2024-01-12", "2-5", None),
            profiled(70.0, "2024-01-13", "2-5", None),
            profiled(80.0, "2024-01-14", "0-1", None),
            profiled(80.0, "2024-01-15", "0-1", None),
        ]);
        assert_eq!(
            informational(&recommendations),
            vec![
                &RecommendationSubject::AgeGroup("2-5".to_string()),
                &RecommendationSubject::AgeGroup("1-2".to_string()),
            ]
        );
        assert!(recommendations
            .windows(2)
            .all(|pair| pair[0].severity <= pair[1].severity));
    }

    #[test]
    fn unspecified_demographics_raise_nothing() {
        let recommendations = run(&[
            record("Ludhiana", "BCG", 60.0),
            record("Ludhiana", "OPV", 62.0),
        ]);
        assert!(informational(&recommendations).is_empty());
    }

    #[test]
    fn extended_rules_are_deterministic() {
        let records = vec![
            profiled(98.0, "2024-01-10", "0-1", Some(Gender::Male)),
            profiled(70.0, "2024-02-10", "2-5", Some(Gender::Female)),
            profiled(97.0, "2024-03-10", "1-2", Some(Gender::Male)),
        ];
        let first = run(&records);
        assert_eq!(first, run(&records));
        assert!(informational(&first).len() >= 3);
    }
}
