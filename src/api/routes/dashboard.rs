use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::calculate::{
    count_by_group, filter_vendors, mean_by_group, overall_means, trend_over_period, Density,
    VendorSelection,
};
use crate::duration::{format_duration, format_duration_value, seconds_to_days};
use crate::ingest::{load_table, PeriodRange};
use crate::models::{
    AggregateRow, CountRow, GroupKey, OrderingSource, SlaRecord, SlaTable, StageMean,
};
use crate::storage::Dataset;

const DEFAULT_RECORD_LIMIT: usize = 50;
const MAX_RECORD_LIMIT: usize = 1000;

// ── Query parameters ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Comma-separated vendor names; absent or `ALL` keeps every vendor.
    pub vendors: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordsParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub vendors: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub vendors: Option<String>,
    /// Include periods that have no records as empty points
    pub dense: Option<bool>,
}

fn selection(vendors: Option<&str>) -> VendorSelection {
    vendors.map(VendorSelection::parse).unwrap_or_default()
}

/// Load the current dataset restricted to a period range and vendor selection.
async fn load_filtered(
    state: &AppState,
    from: &Option<String>,
    to: &Option<String>,
    vendors: Option<&str>,
) -> Result<(Arc<Dataset>, SlaTable), ApiError> {
    let dataset = state.current().await?;
    let range = PeriodRange::new(from.clone(), to.clone());
    let table = load_table(&dataset.table, &state.config.columns, &range)?;
    let table = filter_vendors(&table, &selection(vendors));
    Ok((dataset, table))
}

// ── Views ────────────────────────────────────────────────────────

/// A stage mean in every unit the dashboard shows.
#[derive(Debug, Serialize)]
pub struct StageView {
    pub stage: String,
    pub mean_seconds: Option<f64>,
    pub mean_days: Option<f64>,
    pub text: String,
    pub count: usize,
}

impl From<&StageMean> for StageView {
    fn from(m: &StageMean) -> Self {
        Self {
            stage: m.stage.clone(),
            mean_seconds: m.mean_seconds,
            mean_days: seconds_to_days(m.mean_seconds),
            text: format_duration(m.mean_seconds),
            count: m.count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupView {
    pub key: String,
    pub records: usize,
    pub stages: Vec<StageView>,
}

impl From<&AggregateRow> for GroupView {
    fn from(row: &AggregateRow) -> Self {
        Self {
            key: row.key.clone(),
            records: row.records,
            stages: row.stages.iter().map(StageView::from).collect(),
        }
    }
}

fn group_views(rows: &[AggregateRow]) -> Vec<GroupView> {
    rows.iter().map(GroupView::from).collect()
}

// ── Health ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DatasetInfo {
    pub fingerprint: String,
    pub format: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

impl From<&Dataset> for DatasetInfo {
    fn from(d: &Dataset) -> Self {
        Self {
            fingerprint: d.fingerprint.to_string(),
            format: d.format.to_string(),
            rows: d.table.len(),
            columns: d.table.headers.clone(),
            loaded_at: d.loaded_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uploads_enabled: bool,
    pub dataset: Option<DatasetInfo>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let dataset = state.dataset.read().await.clone();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uploads_enabled: state.config.auth.uploads_enabled(),
        dataset: dataset.as_deref().map(DatasetInfo::from),
    })
}

// ── Periods ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PeriodsResponse {
    pub ordering: OrderingSource,
    pub periods: Vec<String>,
}

pub async fn periods(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<PeriodsResponse>, ApiError> {
    let (_, table) = load_filtered(&state, &params.from, &params.to, None).await?;
    Ok(Json(PeriodsResponse {
        ordering: table.periods.source(),
        periods: table.periods.periods().to_vec(),
    }))
}

// ── Summary ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub fingerprint: String,
    pub records: usize,
    pub first_period: Option<String>,
    pub last_period: Option<String>,
    pub stages: Vec<StageView>,
}

pub async fn summary(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let (dataset, table) =
        load_filtered(&state, &params.from, &params.to, params.vendors.as_deref()).await?;
    let means = overall_means(&table, &table.stages);

    Ok(Json(SummaryResponse {
        fingerprint: dataset.fingerprint.to_string(),
        records: table.len(),
        first_period: table.periods.first().map(str::to_string),
        last_period: table.periods.last().map(str::to_string),
        stages: means.iter().map(StageView::from).collect(),
    }))
}

// ── Records ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DurationView {
    pub seconds: Option<u64>,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct RecordView {
    pub period: Option<String>,
    pub vendor: Option<String>,
    pub transaction_type: Option<String>,
    pub durations: BTreeMap<String, DurationView>,
}

impl From<&SlaRecord> for RecordView {
    fn from(r: &SlaRecord) -> Self {
        Self {
            period: r.period.clone(),
            vendor: r.vendor.clone(),
            transaction_type: r.transaction_type.clone(),
            durations: r
                .durations
                .iter()
                .map(|(stage, seconds)| {
                    (
                        stage.clone(),
                        DurationView {
                            seconds: *seconds,
                            text: format_duration_value(*seconds),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub total: usize,
    pub records: Vec<RecordView>,
}

pub async fn records(
    State(state): State<AppState>,
    Query(params): Query<RecordsParams>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECORD_LIMIT)
        .clamp(1, MAX_RECORD_LIMIT);
    let (_, table) =
        load_filtered(&state, &params.from, &params.to, params.vendors.as_deref()).await?;

    Ok(Json(RecordsResponse {
        total: table.len(),
        records: table.records.iter().take(limit).map(RecordView::from).collect(),
    }))
}

// ── Grouped means ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub group_by: GroupKey,
    pub groups: Vec<GroupView>,
}

pub async fn transactions(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<GroupsResponse>, ApiError> {
    let (_, table) =
        load_filtered(&state, &params.from, &params.to, params.vendors.as_deref()).await?;
    let rows = mean_by_group(&table, GroupKey::TransactionType, &table.stages);
    Ok(Json(GroupsResponse {
        group_by: GroupKey::TransactionType,
        groups: group_views(&rows),
    }))
}

#[derive(Debug, Serialize)]
pub struct VendorsResponse {
    /// Every vendor in the selected period range, for the filter picker
    pub available: Vec<String>,
    pub groups: Vec<GroupView>,
}

pub async fn vendors(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<VendorsResponse>, ApiError> {
    let (_, unfiltered) = load_filtered(&state, &params.from, &params.to, None).await?;
    let table = filter_vendors(&unfiltered, &selection(params.vendors.as_deref()));
    let rows = mean_by_group(&table, GroupKey::Vendor, &table.stages);

    Ok(Json(VendorsResponse {
        available: unfiltered.vendors(),
        groups: group_views(&rows),
    }))
}

// ── Trend ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub ordering: OrderingSource,
    pub dense: bool,
    pub points: Vec<GroupView>,
}

pub async fn trend(
    State(state): State<AppState>,
    Query(params): Query<TrendParams>,
) -> Result<Json<TrendResponse>, ApiError> {
    let (_, table) =
        load_filtered(&state, &params.from, &params.to, params.vendors.as_deref()).await?;
    let dense = params.dense.unwrap_or(false);
    let density = if dense { Density::Dense } else { Density::Sparse };
    let rows = trend_over_period(&table, &table.periods, &table.stages, density);

    Ok(Json(TrendResponse {
        ordering: table.periods.source(),
        dense,
        points: group_views(&rows),
    }))
}

// ── Counts ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CountsResponse {
    pub group_by: GroupKey,
    pub rows: Vec<CountRow>,
    pub total: usize,
}

pub async fn counts(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<CountsResponse>, ApiError> {
    let (_, table) =
        load_filtered(&state, &params.from, &params.to, params.vendors.as_deref()).await?;
    let counts = count_by_group(&table, GroupKey::Period);
    Ok(Json(CountsResponse {
        group_by: GroupKey::Period,
        total: counts.total(),
        rows: counts.rows().to_vec(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_router;
    use crate::api::routes::test_support::{
        get_json, post_upload, setup_test_state, PASSWORD, SAMPLE_CSV,
    };
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn loaded_app(dir: &std::path::Path) -> axum::Router {
        let app = build_router(setup_test_state(dir));
        let (status, _) = post_upload(app.clone(), "/api/upload", Some(PASSWORD), SAMPLE_CSV).await;
        assert_eq!(status, StatusCode::OK);
        app
    }

    #[tokio::test]
    async fn test_health_without_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) = get_json(app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["uploads_enabled"], true);
        assert!(json["dataset"].is_null());
    }

    #[tokio::test]
    async fn test_read_endpoints_need_a_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        for uri in ["/api/summary", "/api/periods", "/api/trend", "/api/counts"] {
            let (status, json) = get_json(app.clone(), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(json["error"]["code"], "NOT_FOUND");
        }
    }

    #[tokio::test]
    async fn test_periods_are_chronological() {
        let tmp = tempfile::tempdir().unwrap();
        let app = loaded_app(tmp.path()).await;

        let (status, json) = get_json(app, "/api/periods").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ordering"], "chronological");
        assert_eq!(
            json["periods"],
            json!(["Januari 2024", "Februari 2024", "April 2024"])
        );
    }

    #[tokio::test]
    async fn test_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let app = loaded_app(tmp.path()).await;

        let (status, json) = get_json(app.clone(), "/api/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["records"], 4);
        assert_eq!(json["first_period"], "Januari 2024");
        assert_eq!(json["last_period"], "April 2024");

        let keuangan = &json["stages"][0];
        assert_eq!(keuangan["stage"], "SLA KEUANGAN");
        assert_eq!(keuangan["mean_seconds"], 60000.0);
        assert_eq!(keuangan["count"], 3);
        assert_eq!(keuangan["text"], "16 jam 40 menit 0 detik");

        let vendor = &json["stages"][1];
        assert_eq!(vendor["mean_seconds"], 64800.0);
        assert_eq!(vendor["mean_days"], 0.75);
        assert_eq!(vendor["count"], 2);

        let (_, health) = get_json(app, "/api/health").await;
        assert_eq!(health["dataset"]["fingerprint"], json["fingerprint"]);
        assert_eq!(health["dataset"]["rows"], 4);
    }

    #[tokio::test]
    async fn test_summary_with_period_range() {
        let tmp = tempfile::tempdir().unwrap();
        let app = loaded_app(tmp.path()).await;

        let (status, json) = get_json(app, "/api/summary?from=Februari%202024").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["records"], 2);
        assert_eq!(json["first_period"], "Februari 2024");
        assert_eq!(json["stages"][0]["mean_seconds"], 43200.0);
    }

    #[tokio::test]
    async fn test_bad_period_range() {
        let tmp = tempfile::tempdir().unwrap();
        let app = loaded_app(tmp.path()).await;

        let (status, json) = get_json(app.clone(), "/api/summary?from=Mei%202030").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");

        let (status, _) = get_json(
            app,
            "/api/summary?from=April%202024&to=Januari%202024",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_records_limit_and_formatting() {
        let tmp = tempfile::tempdir().unwrap();
        let app = loaded_app(tmp.path()).await;

        let (status, json) = get_json(app, "/api/records?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 4);
        assert_eq!(json["records"].as_array().unwrap().len(), 2);

        let second = &json["records"][1];
        assert_eq!(second["vendor"], "PT A");
        assert_eq!(second["durations"]["SLA KEUANGAN"]["seconds"], 93600);
        assert_eq!(
            second["durations"]["SLA KEUANGAN"]["text"],
            "1 hari 2 jam 0 menit 0 detik"
        );
        assert!(second["durations"]["SLA VENDOR"]["seconds"].is_null());
        assert_eq!(second["durations"]["SLA VENDOR"]["text"], "-");
    }

    #[tokio::test]
    async fn test_transactions() {
        let tmp = tempfile::tempdir().unwrap();
        let app = loaded_app(tmp.path()).await;

        let (status, json) = get_json(app, "/api/transactions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["group_by"], "transaction_type");

        let groups = json["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["key"], "Barang");
        assert_eq!(groups[0]["stages"][0]["mean_seconds"], 93600.0);
        assert!(groups[0]["stages"][1]["mean_seconds"].is_null());
        assert_eq!(groups[0]["stages"][1]["text"], "-");
        assert_eq!(groups[1]["key"], "Jasa");
        assert_eq!(groups[1]["records"], 3);
        assert_eq!(groups[1]["stages"][0]["mean_seconds"], 43200.0);
    }

    #[tokio::test]
    async fn test_vendors_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let app = loaded_app(tmp.path()).await;

        let (_, all) = get_json(app.clone(), "/api/vendors").await;
        assert_eq!(all["available"], json!(["PT A", "PT B"]));
        assert_eq!(all["groups"].as_array().unwrap().len(), 2);
        assert_eq!(all["groups"][0]["stages"][0]["mean_seconds"], 68400.0);
        assert_eq!(
            all["groups"][0]["stages"][0]["text"],
            "19 jam 0 menit 0 detik"
        );

        let (_, one) = get_json(app.clone(), "/api/vendors?vendors=PT%20B").await;
        assert_eq!(one["available"], json!(["PT A", "PT B"]));
        let groups = one["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["key"], "PT B");

        let (_, explicit_all) = get_json(app, "/api/vendors?vendors=ALL").await;
        assert_eq!(explicit_all["groups"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_trend_sparse_and_dense() {
        let tmp = tempfile::tempdir().unwrap();
        let app = loaded_app(tmp.path()).await;

        let (status, sparse) = get_json(app.clone(), "/api/trend?vendors=PT%20A").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sparse["dense"], false);
        let points = sparse["points"].as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["key"], "Januari 2024");
        assert_eq!(points[0]["stages"][0]["mean_seconds"], 68400.0);

        let (_, dense) = get_json(app, "/api/trend?vendors=PT%20A&dense=true").await;
        let keys: Vec<&str> = dense["points"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["Januari 2024", "Februari 2024", "April 2024"]);
        assert_eq!(dense["points"][1]["records"], 0);
        assert!(dense["points"][1]["stages"][0]["mean_seconds"].is_null());
    }

    #[tokio::test]
    async fn test_counts_total_row() {
        let tmp = tempfile::tempdir().unwrap();
        let app = loaded_app(tmp.path()).await;

        let (status, json) = get_json(app, "/api/counts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 4);
        assert_eq!(
            json["rows"],
            json!([
                {"key": "Januari 2024", "count": 2, "is_total": false},
                {"key": "Februari 2024", "count": 1, "is_total": false},
                {"key": "April 2024", "count": 1, "is_total": false},
                {"key": "TOTAL", "count": 4, "is_total": true}
            ])
        );
    }

    #[test]
    fn test_stage_view_units() {
        let view = StageView::from(&StageMean {
            stage: "KEUANGAN".to_string(),
            mean_seconds: Some(129_600.0),
            count: 2,
        });
        assert_eq!(view.mean_days, Some(1.5));
        assert_eq!(view.text, "1 hari 12 jam 0 menit 0 detik");

        let empty = StageView::from(&StageMean {
            stage: "KEUANGAN".to_string(),
            mean_seconds: None,
            count: 0,
        });
        assert_eq!(empty.mean_days, None);
        assert_eq!(empty.text, "-");
    }
}
