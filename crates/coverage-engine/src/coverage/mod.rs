//! Immunization coverage analytics: validation, aggregation, the per-dimension
//! summarizers, rule-based recommendations and report export.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod demographics;
pub mod domain;
pub mod export;
pub mod filter;
pub mod geography;
pub mod recommendations;
pub mod report;
pub mod session;
pub mod timeline;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::{aggregate, AggregateResult, NoDataError, VaccineCoverage};
pub use cache::{AggregateCache, CacheKey, CacheStats};
pub use config::{AnalyticsConfig, TierBoundaries};
pub use dataset::{Dataset, DatasetId};
pub use demographics::{DemographicBreakdown, DemographicBucket, DemographicMarginal};
pub use domain::{CoverageTier, Gender, Severity, TimeGranularity, VaccinationRecord};
pub use export::{export, ExportError, ExportFailure, ExportFormat, ReportExporter};
pub use filter::FilterSet;
pub use geography::DistrictSummary;
pub use recommendations::{Recommendation, RecommendationSubject};
pub use report::{Report, ReportRequest};
pub use session::{AnalysisSession, RequestTicket};
pub use timeline::{TimelineAnalysis, TimelineBucket, TrendDirection, TrendSignal};
pub use validation::{
    validate, LoadReport, MissingColumnError, RawTable, RowIssue, RowValidationError,
    ValidatedRecords,
};
