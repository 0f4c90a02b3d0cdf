use super::cache::{AggregateCache, CacheKey, CacheStats};
use super::config::AnalyticsConfig;
use super::dataset::Dataset;
use super::report::{Report, ReportRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Marks one in-flight request; a newer ticket supersedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

/// One analysis session: the current canonical record set plus its cache.
///
/// Replacing the dataset swaps an `Arc`, so work that already took a snapshot
/// finishes against the records it started with.
pub struct AnalysisSession {
    dataset: RwLock<Arc<Dataset>>,
    cache: AggregateCache,
    generation: AtomicU64,
    config: AnalyticsConfig,
}

impl AnalysisSession {
    pub fn new(dataset: Dataset, config: AnalyticsConfig) -> Self {
        Self {
            dataset: RwLock::new(Arc::new(dataset)),
            cache: AggregateCache::new(config.cache_capacity),
            generation: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<Dataset> {
        let guard = self
            .dataset
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Installs a new canonical record set and drops every cached report.
    pub fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let next = Arc::new(dataset);
        let previous = {
            let mut guard = self
                .dataset
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *guard, Arc::clone(&next))
        };
        self.cache.clear();
        info!(
            previous = previous.id().short(),
            current = next.id().short(),
            records = next.len(),
            "replaced canonical record set"
        );
        next
    }

    /// Builds (or reuses) the report for `request` against the current snapshot.
    pub fn analyze(&self, request: &ReportRequest) -> Arc<Report> {
        let dataset = self.snapshot();
        let key = CacheKey {
            dataset: dataset.id().clone(),
            request: request.clone(),
        };
        self.cache
            .get_or_insert_with(key, || Report::build(&dataset, request, &self.config))
    }

    pub fn begin_request(&self) -> RequestTicket {
        RequestTicket(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.generation.load(Ordering::Acquire) == ticket.0
    }

    /// Hands back the result only if no newer request began meanwhile.
    pub fn complete<T>(&self, ticket: RequestTicket, result: T) -> Option<T> {
        self.is_current(ticket).then_some(result)
    }

    /// Stamps a request, analyzes, and discards the result if superseded.
    pub fn analyze_latest(&self, request: &ReportRequest) -> Option<Arc<Report>> {
        let ticket = self.begin_request();
        let report = self.analyze(request);
        self.complete(ticket, report)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::filter::FilterSet;
    use crate::coverage::test_support::{dataset, record};

    #[test]
    fn replace_invalidates_cache_and_keeps_old_snapshot_intact() {
        let session = AnalysisSession::new(
            dataset(vec![record("Amritsar", "BCG", 95.0)]),
            AnalyticsConfig::default(),
        );
        let request = ReportRequest::default();
        let before = session.analyze(&request);
        let snapshot = session.snapshot();
        assert_eq!(session.cache_stats().entries, 1);

        session.replace(dataset(vec![record("Amritsar", "BCG", 55.0)]));
        assert_eq!(session.cache_stats().entries, 0);

        let after = session.analyze(&request);
        assert_eq!(before.aggregate.overall_coverage, Some(95.0));
        assert_eq!(after.aggregate.overall_coverage, Some(55.0));
        assert_eq!(snapshot.records()[0].coverage_percentage, 95.0);
    }

    #[test]
    fn superseded_requests_are_discarded() {
        let session = AnalysisSession::new(
            dataset(vec![record("Amritsar", "BCG", 95.0)]),
            AnalyticsConfig::default(),
        );
        let stale = session.begin_request();
        let fresh = session.begin_request();
        assert_eq!(session.complete(stale, "old"), None);
        assert_eq!(session.complete(fresh, "new"), Some("new"));

        let request = ReportRequest::new(FilterSet::new().with_vaccine("BCG"));
        assert!(session.analyze_latest(&request).is_some());
    }
}
