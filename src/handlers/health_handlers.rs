//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the session database and the model lock

use crate::services::drive_service::DriveService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::HashMap, time::Duration};

const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// `GET /healthz`
///
/// Very small liveness probe. Always returns 200 OK and never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs `SELECT 1` against the session database.
/// 2. Acquires the model lock within a short timeout and reports the record count.
///
/// HTTP 200 when both checks pass, HTTP 503 otherwise.
pub async fn readyz(State(service): State<DriveService>) -> impl IntoResponse {
    let sqlite_check = match service.sessions().ping().await {
        Ok(1) => (true, None::<String>),
        Ok(v) => (false, Some(format!("unexpected result: {}", v))),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let model_check = match tokio::time::timeout(LOCK_TIMEOUT, service.record_count()).await {
        Ok(count) => (true, Some(format!("{} record(s)", count))),
        Err(_) => (false, Some("model lock not acquired in time".to_string())),
    };

    let overall_ok = sqlite_check.0 && model_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "sqlite",
        CheckStatus {
            ok: sqlite_check.0,
            detail: sqlite_check.1,
        },
    );
    checks.insert(
        "model",
        CheckStatus {
            ok: model_check.0,
            detail: model_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    detail: Option<String>,
}
