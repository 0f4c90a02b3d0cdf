mod statistics;
mod summary;

pub use statistics::{CoverageStatistics, DataQualityReport, FieldCompleteness};
pub use summary::{KpiSummary, LowCoverageAlert, TierCount};

use super::aggregate::{summarize_subset, AggregateResult, NoDataError};
use super::config::AnalyticsConfig;
use super::dataset::{Dataset, DatasetId};
use super::demographics::{analyze_demographics, DemographicBreakdown};
use super::domain::TimeGranularity;
use super::filter::FilterSet;
use super::geography::{summarize_districts, DistrictSummary};
use super::recommendations::{recommend, Recommendation};
use super::timeline::{analyze_timeline, TimelineAnalysis, TimelineOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the caller asks a report to cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub granularity: TimeGranularity,
    #[serde(default)]
    pub fill_gaps: bool,
}

impl ReportRequest {
    pub fn new(filters: FilterSet) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    pub fn with_granularity(mut self, granularity: TimeGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_gap_filling(mut self) -> Self {
        self.fill_gaps = true;
        self
    }
}

/// The immutable output bundle every export format is projected from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub dataset_id: DatasetId,
    pub filters: FilterSet,
    pub selection: String,
    pub granularity: TimeGranularity,
    pub load_summary: String,
    pub kpis: KpiSummary,
    pub aggregate: AggregateResult,
    pub statistics: CoverageStatistics,
    pub data_quality: DataQualityReport,
    pub districts: Vec<DistrictSummary>,
    pub timeline: TimelineAnalysis,
    pub demographics: DemographicBreakdown,
    pub recommendations: Vec<Recommendation>,
}

impl Report {
    pub fn build(dataset: &Dataset, request: &ReportRequest, config: &AnalyticsConfig) -> Self {
        Self::build_at(dataset, request, config, Utc::now())
    }

    /// Builds with a caller-supplied timestamp so two builds can be compared.
    pub fn build_at(
        dataset: &Dataset,
        request: &ReportRequest,
        config: &AnalyticsConfig,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let subset = request.filters.apply(dataset.records());
        let aggregate = summarize_subset(&subset, config);
        let districts = summarize_districts(&subset, &config.tiers);
        let timeline = analyze_timeline(
            &subset,
            TimelineOptions {
                granularity: request.granularity,
                fill_gaps: request.fill_gaps,
            },
            config.trend_tolerance,
        );
        let demographics = analyze_demographics(&subset);
        let statistics = CoverageStatistics::compute(&subset, &districts, config);
        let data_quality = DataQualityReport::compute(&subset);
        let kpis = KpiSummary::from_parts(&aggregate, &districts, config);
        let recommendations = recommend(
            &aggregate,
            &districts,
            &timeline.buckets,
            &timeline.seasonal,
            &demographics,
            config,
        );

        debug!(
            dataset = dataset.id().short(),
            active = subset.len(),
            districts = districts.len(),
            recommendations = recommendations.len(),
            "built coverage report"
        );

        Self {
            generated_at,
            dataset_id: dataset.id().clone(),
            filters: request.filters.clone(),
            selection: request.filters.describe(),
            granularity: request.granularity,
            load_summary: dataset.load_report().summary_line(),
            kpis,
            aggregate,
            statistics,
            data_quality,
            districts,
            timeline,
            demographics,
            recommendations,
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.aggregate.is_no_data()
    }

    /// Surfaces the explicit "no data for this selection" state.
    pub fn ensure_data(&self) -> Result<&Self, NoDataError> {
        self.aggregate.require_data(&self.filters).map(|_| self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::domain::CoverageTier;
    use crate::coverage::test_support::{dataset, record};

    #[test]
    fn every_summarizer_sees_the_same_active_subset() {
        let dataset = dataset(vec![
            record("Amritsar", "BCG", 95.0),
            record("Amritsar", "DPT1", 60.0),
            record("Ludhiana", "BCG", 40.0),
        ]);
        let request = ReportRequest::new(FilterSet::new().with_district("Amritsar"));
        let report = Report::build(&dataset, &request, &AnalyticsConfig::default());

        assert_eq!(report.aggregate.record_count, 2);
        assert_eq!(report.districts.len(), 1);
        assert_eq!(report.districts[0].tier, CoverageTier::Orange);
        assert_eq!(report.demographics.buckets[0].record_count, 2);
        assert_eq!(report.data_quality.record_count, 2);
        assert_eq!(report.kpis.tier_count(CoverageTier::Orange), 1);
        assert_eq!(report.selection, "district in [amritsar]");
    }

    #[test]
    fn empty_selection_is_an_explicit_state() {
        let dataset = dataset(vec![record("Amritsar", "BCG", 95.0)]);
        let request = ReportRequest::new(FilterSet::new().with_vaccine("Rotavirus"));
        let report = Report::build(&dataset, &request, &AnalyticsConfig::default());
        assert!(report.is_no_data());
        assert!(report.recommendations.is_empty());
        assert!(report.districts.is_empty());
        assert_eq!(report.kpis.target_met, None);
        assert!(report.ensure_data().is_err());
    }

    #[test]
    fn builds_at_one_timestamp_are_equal() {
        let dataset = dataset(vec![record("Mansa", "BCG", 70.0)]);
        let request = ReportRequest::default();
        let config = AnalyticsConfig::default();
        let at = Utc::now();
        assert_eq!(
            Report::build_at(&dataset, &request, &config, at),
            Report::build_at(&dataset, &request, &config, at)
        );
    }
}
