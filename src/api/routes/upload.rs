use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::config::AuthConfig;
use crate::ingest::{load_table, PeriodRange};
use crate::models::OrderingSource;
use crate::storage::{Dataset, TableFormat};

/// Header carrying the admin password.
pub const PASSWORD_HEADER: &str = "x-admin-password";

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// `csv`, `parquet` or `json`; falls back to the content type, then CSV
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub fingerprint: String,
    pub format: String,
    pub rows: usize,
    pub records: usize,
    pub stages: Vec<String>,
    pub ordering: OrderingSource,
    pub periods: Vec<String>,
}

fn authorize(auth: &AuthConfig, headers: &HeaderMap) -> Result<(), ApiError> {
    if !auth.uploads_enabled() {
        return Err(ApiError::Forbidden(
            "Uploads are disabled: no admin password is configured".to_string(),
        ));
    }
    let supplied = headers
        .get(PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !auth.check(supplied) {
        warn!("Rejected upload with a wrong admin password");
        return Err(ApiError::Unauthorized("Wrong admin password".to_string()));
    }
    Ok(())
}

fn format_from_content_type(headers: &HeaderMap) -> Option<TableFormat> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim();
    match mime {
        "text/csv" => Some(TableFormat::Csv),
        "application/json" => Some(TableFormat::Json),
        "application/vnd.apache.parquet" | "application/x-parquet" => Some(TableFormat::Parquet),
        _ => None,
    }
}

/// Replace the served dataset. The upload must parse and carry a period
/// column before anything is cached.
pub async fn upload(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    authorize(&state.config.auth, &headers)?;

    let format = match params.format.as_deref() {
        Some(name) => TableFormat::from_name(name)?,
        None => format_from_content_type(&headers).unwrap_or(TableFormat::Csv),
    };
    if body.is_empty() {
        return Err(ApiError::BadRequest("Upload body is empty".to_string()));
    }

    let dataset = Dataset::from_bytes(&body, format)?;
    let table = load_table(&dataset.table, &state.config.columns, &PeriodRange::all())?;
    state.storage.write_upload(&body, &dataset)?;
    let dataset = state.replace(dataset).await;

    info!(
        "Upload {} accepted: {} rows, {} stages, {} periods",
        dataset.fingerprint,
        dataset.table.len(),
        table.stages.len(),
        table.periods.len()
    );

    Ok(Json(UploadResponse {
        fingerprint: dataset.fingerprint.to_string(),
        format: format.to_string(),
        rows: dataset.table.len(),
        records: table.len(),
        stages: table.stages.clone(),
        ordering: table.periods.source(),
        periods: table.periods.periods().to_vec(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_router;
    use crate::api::routes::test_support::{
        get_json, post_upload, setup_test_state, PASSWORD, SAMPLE_CSV,
    };
    use crate::config::AppConfig;
    use axum::http::{HeaderValue, StatusCode};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_upload_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path());
        let app = build_router(state.clone());

        let (status, json) = post_upload(app, "/api/upload", Some(PASSWORD), SAMPLE_CSV).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["format"], "csv");
        assert_eq!(json["rows"], 4);
        assert_eq!(json["records"], 4);
        assert_eq!(json["stages"][0], "SLA KEUANGAN");
        assert_eq!(json["periods"][0], "Januari 2024");

        assert!(tmp.path().join("last_data.csv").exists());
        assert!(state.current().await.is_ok());
    }

    #[tokio::test]
    async fn test_upload_json_format_param() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));
        let body = r#"{"columns": ["Bulan", "SLA KEUANGAN"], "rows": [["2024-02", "3 hari"], ["2024-01", 1.5]]}"#;

        let (status, json) =
            post_upload(app.clone(), "/api/upload?format=json", Some(PASSWORD), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["format"], "json");
        assert_eq!(json["periods"][0], "2024-01");

        let (_, summary) = get_json(app, "/api/summary").await;
        // (3 days + 1.5 days) / 2
        assert_eq!(summary["stages"][0]["mean_days"], 2.25);
    }

    #[tokio::test]
    async fn test_upload_wrong_password() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) =
            post_upload(app.clone(), "/api/upload", Some("salah"), SAMPLE_CSV).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "UNAUTHORIZED");

        let (status, _) = post_upload(app, "/api/upload", None, SAMPLE_CSV).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!tmp.path().join("last_data.csv").exists());
    }

    #[tokio::test]
    async fn test_upload_disabled_without_password() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::new(AppConfig {
            data_dir: tmp.path().to_path_buf(),
            ..Default::default()
        });
        let app = build_router(state);

        let (status, json) = post_upload(app, "/api/upload", Some(""), SAMPLE_CSV).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_upload_missing_period_column_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path());
        let app = build_router(state.clone());

        let (status, _) = post_upload(app.clone(), "/api/upload", Some(PASSWORD), SAMPLE_CSV).await;
        assert_eq!(status, StatusCode::OK);
        let before = state.current().await.unwrap().fingerprint.clone();

        let (status, json) = post_upload(
            app,
            "/api/upload",
            Some(PASSWORD),
            "Vendor,SLA KEUANGAN\nPT A,14:02\n",
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "SCHEMA_ERROR");

        // The previous upload keeps being served and cached.
        assert_eq!(state.current().await.unwrap().fingerprint, before);
        let cached = state.storage.load_cached().unwrap().unwrap();
        assert_eq!(cached.fingerprint, before);
    }

    #[tokio::test]
    async fn test_upload_bad_format_and_empty_body() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, _) =
            post_upload(app.clone(), "/api/upload?format=xlsx", Some(PASSWORD), SAMPLE_CSV).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_upload(app, "/api/upload", Some(PASSWORD), "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_format_from_content_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(format_from_content_type(&headers), None);

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert_eq!(format_from_content_type(&headers), Some(TableFormat::Json));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        assert_eq!(format_from_content_type(&headers), Some(TableFormat::Csv));
    }
}
