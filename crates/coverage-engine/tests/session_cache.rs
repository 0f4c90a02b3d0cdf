use coverage_engine::coverage::{
    AnalysisSession, AnalyticsConfig, FilterSet, ReportRequest, TimeGranularity,
};
use coverage_engine::ingestion::{load_dataset, CsvSource};
use std::sync::Arc;
use std::thread;

fn session_from(csv: &str) -> AnalysisSession {
    let dataset =
        load_dataset(&CsvSource::from_bytes(csv.as_bytes().to_vec())).expect("csv loads");
    AnalysisSession::new(dataset, AnalyticsConfig::default())
}

const FIRST: &str = "district,vaccine_type,coverage_percentage\nAmritsar,BCG,95\nMansa,BCG,55\n";
const SECOND: &str = "district,vaccine_type,coverage_percentage\nAmritsar,BCG,80\n";

#[test]
fn cache_keys_on_filters_and_granularity() {
    let session = session_from(FIRST);
    let all = ReportRequest::default();
    let weekly = ReportRequest::default().with_granularity(TimeGranularity::Week);
    let amritsar = ReportRequest::new(FilterSet::new().with_district("Amritsar"));

    let first = session.analyze(&all);
    let again = session.analyze(&all);
    assert!(Arc::ptr_eq(&first, &again));

    session.analyze(&weekly);
    session.analyze(&amritsar);
    let stats = session.cache_stats();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 3);
}

#[test]
fn identical_record_sets_share_an_identity() {
    let first = session_from(FIRST);
    let second = session_from(FIRST);
    let different = session_from(SECOND);
    assert_eq!(first.snapshot().id(), second.snapshot().id());
    assert_ne!(first.snapshot().id(), different.snapshot().id());
}

#[test]
fn concurrent_readers_see_one_consistent_record_set() {
    let session = Arc::new(session_from(FIRST));
    let request = ReportRequest::default();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            let request = request.clone();
            thread::spawn(move || {
                let report = session.analyze(&request);
                (
                    report.dataset_id.clone(),
                    report.aggregate.overall_coverage,
                )
            })
        })
        .collect();

    let replacement =
        load_dataset(&CsvSource::from_bytes(SECOND.as_bytes().to_vec())).expect("csv loads");
    session.replace(replacement);

    for reader in readers {
        let (dataset_id, overall) = reader.join().expect("reader finishes");
        match overall {
            Some(rate) if rate == 75.0 => assert_ne!(dataset_id, *session.snapshot().id()),
            Some(rate) if rate == 80.0 => assert_eq!(dataset_id, *session.snapshot().id()),
            other => panic!("unexpected overall rate {other:?}"),
        }
    }

    assert_eq!(
        session.analyze(&request).aggregate.overall_coverage,
        Some(80.0)
    );
}

#[test]
fn only_the_latest_request_is_delivered() {
    let session = session_from(FIRST);
    let stale = session.begin_request();
    let stale_report = session.analyze(&ReportRequest::default());
    let fresh = session.begin_request();

    assert!(session.complete(stale, stale_report).is_none());
    assert!(session.is_current(fresh));
    assert!(session
        .analyze_latest(&ReportRequest::default())
        .is_some());
    assert!(!session.is_current(fresh));
}
