use super::dataset::DatasetId;
use super::report::{Report, ReportRequest};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: DatasetId,
    pub request: ReportRequest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Arc<Report>>,
    order: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
}

/// Reports keyed by (dataset identity, request), evicting the oldest entry
/// once capacity is reached.
pub struct AggregateCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl AggregateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    // Mutations never panic midway, so a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Report>> {
        let mut state = self.lock();
        match state.entries.get(key).cloned() {
            Some(report) => {
                state.hits += 1;
                debug!(dataset = key.dataset.short(), "aggregate cache hit");
                Some(report)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, key: CacheKey, report: Arc<Report>) {
        let mut state = self.lock();
        if state.entries.insert(key.clone(), report).is_some() {
            return;
        }
        state.order.push_back(key);
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
    }

    pub fn get_or_insert_with(&self, key: CacheKey, build: impl FnOnce() -> Report) -> Arc<Report> {
        if let Some(report) = self.get(&key) {
            return report;
        }
        // Built outside the lock; two racing misses build the same value.
        let report = Arc::new(build());
        self.insert(key, Arc::clone(&report));
        report
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::config::AnalyticsConfig;
    use crate::coverage::filter::FilterSet;
    use crate::coverage::test_support::{dataset, record};

    #[test]
    fn repeated_requests_hit_and_oldest_entry_is_evicted() {
        let dataset = dataset(vec![record("Amritsar", "BCG", 95.0)]);
        let config = AnalyticsConfig::default();
        let cache = AggregateCache::new(2);
        let key = |district: &str| CacheKey {
            dataset: dataset.id().clone(),
            request: ReportRequest::new(FilterSet::new().with_district(district)),
        };
        let build = |key: &CacheKey| Report::build(&dataset, &key.request, &config);

        let first = cache.get_or_insert_with(key("Amritsar"), || build(&key("Amritsar")));
        let again = cache.get_or_insert_with(key("Amritsar"), || build(&key("Amritsar")));
        assert!(Arc::ptr_eq(&first, &again));

        cache.get_or_insert_with(key("Ludhiana"), || build(&key("Ludhiana")));
        cache.get_or_insert_with(key("Mansa"), || build(&key("Mansa")));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("Amritsar")).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
