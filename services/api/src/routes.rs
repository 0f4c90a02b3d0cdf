use crate::infra::{deserialize_optional_date, AppState};
use axum::extract::{DefaultBodyLimit, Path};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use chrono::NaiveDate;
use coverage_engine::coverage::{
    AnalysisSession, CacheStats, Dataset, ExportFormat, FilterSet, Gender, Report, ReportExporter,
    ReportRequest, TimeGranularity,
};
use coverage_engine::error::AppError;
use coverage_engine::ingestion::{load_dataset, CsvSource, JsonRowsSource, RecordSource};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FilterRequest {
    #[serde(default)]
    pub(crate) districts: Vec<String>,
    #[serde(default)]
    pub(crate) vaccines: Vec<String>,
    #[serde(default)]
    pub(crate) age_groups: Vec<String>,
    #[serde(default)]
    pub(crate) genders: Vec<Gender>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) to: Option<NaiveDate>,
}

impl From<FilterRequest> for FilterSet {
    fn from(request: FilterRequest) -> Self {
        let FilterRequest {
            districts,
            vaccines,
            age_groups,
            genders,
            from,
            to,
        } = request;

        let filters = districts
            .iter()
            .fold(FilterSet::new(), |filters, district| filters.with_district(district));
        let filters = vaccines
            .iter()
            .fold(filters, |filters, vaccine| filters.with_vaccine(vaccine));
        let filters = age_groups
            .iter()
            .fold(filters, |filters, group| filters.with_age_group(group));
        genders
            .into_iter()
            .fold(filters, FilterSet::with_gender)
            .with_date_range(from, to)
    }
}

/// Body shared by the report and export endpoints.
///
/// `csv` or `rows` analyze an uploaded record set once; without either the
/// session's canonical records are used and the result is cached.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CoverageRequest {
    #[serde(default)]
    pub(crate) filters: FilterRequest,
    #[serde(default)]
    pub(crate) granularity: TimeGranularity,
    #[serde(default)]
    pub(crate) fill_gaps: bool,
    #[serde(default)]
    pub(crate) csv: Option<String>,
    #[serde(default)]
    pub(crate) rows: Option<Vec<Map<String, Value>>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CoverageReportResponse {
    pub(crate) no_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    pub(crate) report: Report,
}

#[derive(Debug, Serialize)]
pub(crate) struct DatasetResponse {
    pub(crate) dataset_id: String,
    pub(crate) records: usize,
    pub(crate) load_summary: String,
    pub(crate) cache_hits: u64,
    pub(crate) cache_misses: u64,
    pub(crate) cached_reports: usize,
}

impl DatasetResponse {
    fn new(dataset: &Dataset, stats: CacheStats) -> Self {
        Self {
            dataset_id: dataset.id().to_string(),
            records: dataset.len(),
            load_summary: dataset.load_report().summary_line(),
            cache_hits: stats.hits,
            cache_misses: stats.misses,
            cached_reports: stats.entries,
        }
    }
}

/// A replacement record set, either CSV text or JSON row objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum DatasetUpload {
    Csv { csv: String },
    Rows { rows: Vec<Map<String, Value>> },
}

impl DatasetUpload {
    fn into_source(self, max_upload_bytes: u64) -> Box<dyn RecordSource> {
        match self {
            DatasetUpload::Csv { csv } => Box::new(
                CsvSource::from_bytes(csv.into_bytes()).with_max_bytes(max_upload_bytes),
            ),
            DatasetUpload::Rows { rows } => {
                Box::new(JsonRowsSource::new(rows).with_max_bytes(max_upload_bytes))
            }
        }
    }
}

/// Room for the JSON envelope and string escaping around an upload.
const BODY_ENVELOPE_BYTES: u64 = 64 * 1024;

/// Request body ceiling for a given upload ceiling. Escaping can at most
/// double the CSV text; the precise check happens in the record source.
fn body_limit(max_upload_bytes: u64) -> usize {
    let limit = max_upload_bytes
        .saturating_mul(2)
        .saturating_add(BODY_ENVELOPE_BYTES);
    usize::try_from(limit).unwrap_or(usize::MAX)
}

pub(crate) fn router(max_upload_bytes: u64) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/coverage/report",
            axum::routing::post(coverage_report_endpoint),
        )
        .route(
            "/api/v1/coverage/export/:format",
            axum::routing::post(coverage_export_endpoint),
        )
        .route(
            "/api/v1/coverage/dataset",
            axum::routing::get(dataset_endpoint).put(replace_dataset_endpoint),
        )
        .layer(DefaultBodyLimit::max(body_limit(max_upload_bytes)))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn upload_source(
    csv: Option<String>,
    rows: Option<Vec<Map<String, Value>>>,
    max_upload_bytes: u64,
) -> Option<Box<dyn RecordSource>> {
    let upload = match (csv, rows) {
        (Some(csv), _) => DatasetUpload::Csv { csv },
        (None, Some(rows)) => DatasetUpload::Rows { rows },
        (None, None) => return None,
    };
    Some(upload.into_source(max_upload_bytes))
}

fn build_report(
    session: &AnalysisSession,
    request: CoverageRequest,
    max_upload_bytes: u64,
) -> Result<Arc<Report>, AppError> {
    let CoverageRequest {
        filters,
        granularity,
        fill_gaps,
        csv,
        rows,
    } = request;
    let report_request = ReportRequest {
        filters: filters.into(),
        granularity,
        fill_gaps,
    };

    match upload_source(csv, rows, max_upload_bytes) {
        Some(source) => {
            let dataset = load_dataset(source.as_ref())?;
            Ok(Arc::new(Report::build(
                &dataset,
                &report_request,
                session.config(),
            )))
        }
        None => Ok(session.analyze(&report_request)),
    }
}

async fn build_report_blocking(
    state: &AppState,
    request: CoverageRequest,
) -> Result<Arc<Report>, AppError> {
    let session = Arc::clone(&state.session);
    let max_upload_bytes = state.max_upload_bytes;
    tokio::task::spawn_blocking(move || build_report(&session, request, max_upload_bytes))
        .await
        .map_err(axum::Error::new)?
}

pub(crate) async fn coverage_report_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CoverageRequest>,
) -> Result<Json<CoverageReportResponse>, AppError> {
    let report = build_report_blocking(&state, payload).await?;
    let no_data = report.is_no_data();
    let message = report.ensure_data().err().map(|err| err.to_string());

    Ok(Json(CoverageReportResponse {
        no_data,
        message,
        report: Report::clone(&report),
    }))
}

pub(crate) async fn coverage_export_endpoint(
    Extension(state): Extension<AppState>,
    Path(format): Path<String>,
    Json(payload): Json<CoverageRequest>,
) -> Result<Response, AppError> {
    let format: ExportFormat = format.parse()?;
    let report = build_report_blocking(&state, payload).await?;
    let config = state.session.config().clone();
    let bytes = tokio::task::spawn_blocking(move || {
        ReportExporter::new(&config).export(&report, format)
    })
    .await
    .map_err(axum::Error::new)??;

    let disposition = format!(
        "attachment; filename=\"coverage-report.{}\"",
        format.extension()
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub(crate) async fn dataset_endpoint(Extension(state): Extension<AppState>) -> Json<DatasetResponse> {
    let dataset = state.session.snapshot();
    Json(DatasetResponse::new(&dataset, state.session.cache_stats()))
}

pub(crate) async fn replace_dataset_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<DatasetUpload>,
) -> Result<Json<DatasetResponse>, AppError> {
    let source = payload.into_source(state.max_upload_bytes);
    let dataset = tokio::task::spawn_blocking(move || load_dataset(source.as_ref()))
        .await
        .map_err(axum::Error::new)??;

    let current = state.session.replace(dataset);
    info!(records = current.len(), "dataset replaced over HTTP");
    Ok(Json(DatasetResponse::new(
        &current,
        state.session.cache_stats(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use coverage_engine::coverage::{validate, AnalyticsConfig, RawTable};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    const SAMPLE_CSV: &str = "district,vaccine_type,coverage_percentage,date\n\
Amritsar,BCG,95,2024-01-15\n\
Amritsar,DPT1,60,2024-02-10\n\
Mansa,BCG,50,2024-02-11\n";

    fn sample_state() -> AppState {
        let mut table = RawTable::new(vec![
            "district".to_string(),
            "vaccine_type".to_string(),
            "coverage_percentage".to_string(),
        ]);
        table.push_row(vec!["Amritsar".into(), "BCG".into(), "95".into()]);
        table.push_row(vec!["Amritsar".into(), "DPT1".into(), "60".into()]);
        let dataset = Dataset::new(validate(&table).expect("sample validates"));

        AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            session: Arc::new(AnalysisSession::new(dataset, AnalyticsConfig::default())),
            max_upload_bytes: 1024,
        }
    }

    fn app(state: AppState) -> axum::Router {
        router(state.max_upload_bytes).layer(Extension(state))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn filter_request_converts_to_filter_set() {
        let request = FilterRequest {
            districts: vec!["  amritsar ".to_string()],
            vaccines: vec!["bcg".to_string()],
            genders: vec![Gender::Female],
            ..FilterRequest::default()
        };
        let filters = FilterSet::from(request);
        assert_eq!(
            filters,
            FilterSet::new()
                .with_district("Amritsar")
                .with_vaccine("BCG")
                .with_gender(Gender::Female)
        );
    }

    #[tokio::test]
    async fn report_endpoint_uses_session_records_and_caches() {
        let state = sample_state();
        let session = Arc::clone(&state.session);
        let Json(body) = coverage_report_endpoint(
            Extension(state.clone()),
            Json(CoverageRequest::default()),
        )
        .await
        .expect("report builds");

        assert!(!body.no_data);
        assert_eq!(body.report.aggregate.overall_coverage, Some(77.5));

        coverage_report_endpoint(Extension(state), Json(CoverageRequest::default()))
            .await
            .expect("report builds");
        assert_eq!(session.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn report_endpoint_flags_empty_selections() {
        let request = CoverageRequest {
            filters: FilterRequest {
                districts: vec!["Ludhiana".to_string()],
                ..FilterRequest::default()
            },
            ..CoverageRequest::default()
        };
        let Json(body) = coverage_report_endpoint(Extension(sample_state()), Json(request))
            .await
            .expect("no-data is not an error");

        assert!(body.no_data);
        assert!(body.report.recommendations.is_empty());
        assert!(body
            .message
            .expect("message present")
            .contains("district in [ludhiana]"));
    }

    #[tokio::test]
    async fn uploaded_csv_is_analyzed_over_http() {
        let response = app(sample_state())
            .oneshot(post_json(
                "/api/v1/coverage/report",
                json!({ "csv": SAMPLE_CSV, "filters": { "districts": ["Mansa"] } }),
            ))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["no_data"], json!(false));
        assert_eq!(body["report"]["aggregate"]["overall_coverage"], json!(50.0));
    }

    #[tokio::test]
    async fn missing_columns_map_to_unprocessable_entity() {
        let response = app(sample_state())
            .oneshot(post_json(
                "/api/v1/coverage/report",
                json!({ "csv": "district,coverage_percentage\nAmritsar,90\n" }),
            ))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .expect("error text")
            .contains("vaccine_type"));
        assert!(body["suggestion"].is_string());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let mut state = sample_state();
        state.max_upload_bytes = 16;
        let response = app(state)
            .oneshot(post_json(
                "/api/v1/coverage/report",
                json!({ "csv": SAMPLE_CSV }),
            ))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn uploads_above_the_default_body_limit_are_accepted() {
        let row = "Amritsar,BCG,95,2024-01-15\n";
        let csv = format!(
            "district,vaccine_type,coverage_percentage,date\n{}",
            row.repeat(120_000)
        );
        assert!(csv.len() > 3 * 1024 * 1024);

        let mut state = sample_state();
        state.max_upload_bytes = 200 * 1024 * 1024;
        let response = app(state)
            .oneshot(post_json("/api/v1/coverage/report", json!({ "csv": csv })))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["report"]["aggregate"]["record_count"], json!(120_000));
    }

    #[tokio::test]
    async fn body_limit_follows_the_upload_ceiling() {
        assert!(body_limit(200 * 1024 * 1024) > 400 * 1024 * 1024);
        assert_eq!(body_limit(u64::MAX), usize::MAX);

        let response = app(sample_state())
            .oneshot(post_json(
                "/api/v1/coverage/report",
                json!({ "csv": "x".repeat(200 * 1024) }),
            ))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn oversized_row_upload_is_rejected() {
        let row = json!({ "district": "Amritsar", "vaccine_type": "BCG", "coverage_percentage": 95 });
        let request = Request::builder()
            .method("PUT")
            .uri("/api/v1/coverage/dataset")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "rows": vec![row; 200] }).to_string()))
            .expect("request builds");

        let state = sample_state();
        let session = Arc::clone(&state.session);
        let response = app(state).oneshot(request).await.expect("router responds");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(session.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn export_endpoint_sets_content_type() {
        let response = app(sample_state())
            .oneshot(post_json("/api/v1/coverage/export/raw-table", json!({})))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let text = String::from_utf8(bytes.to_vec()).expect("utf-8 csv");
        assert!(text.contains("district,Amritsar,,77.5,2,2,Orange"));
    }

    #[tokio::test]
    async fn export_over_the_row_cap_is_payload_too_large() {
        let mut state = sample_state();
        let config = AnalyticsConfig {
            max_export_rows: 1,
            ..AnalyticsConfig::default()
        };
        let dataset = Dataset::clone(&state.session.snapshot());
        state.session = Arc::new(AnalysisSession::new(dataset, config));

        let response = app(state)
            .oneshot(post_json("/api/v1/coverage/export/raw-table", json!({})))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert!(body["suggestion"]
            .as_str()
            .expect("suggestion text")
            .contains("narrow the filters"));
    }

    #[tokio::test]
    async fn unknown_export_format_is_not_found() {
        let response = app(sample_state())
            .oneshot(post_json("/api/v1/coverage/export/pdf", json!({})))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn replacing_the_dataset_clears_cached_reports() {
        let state = sample_state();
        let session = Arc::clone(&state.session);
        session.analyze(&ReportRequest::default());
        assert_eq!(session.cache_stats().entries, 1);

        let Json(body) = replace_dataset_endpoint(
            Extension(state),
            Json(DatasetUpload::Csv {
                csv: SAMPLE_CSV.to_string(),
            }),
        )
        .await
        .expect("dataset replaced");

        assert_eq!(body.records, 3);
        assert_eq!(body.cached_reports, 0);
        assert_eq!(body.load_summary, "3 of 3 rows loaded, 0 skipped");
    }
}
