// HTTP route handlers for the Crucible API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use crucible_common::codec;
use crucible_common::types::TestCase;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::metrics;
use crate::submission::{self, SubmitRequest};
use crate::AppState;

/// Test cases as either the raw serialized text or a JSON array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TestCasesPayload {
    Raw(String),
    Cases(Vec<TestCase>),
}

impl TestCasesPayload {
    fn into_raw(self) -> String {
        match self {
            TestCasesPayload::Raw(raw) => raw,
            TestCasesPayload::Cases(cases) => codec::encode(&cases),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub language: String,
    pub test_cases: TestCasesPayload,
}

#[derive(Debug, Serialize)]
pub struct LanguageInfo {
    pub name: String,
    pub aliases: Vec<String>,
    pub version: Option<String>,
    pub compiled: bool,
    pub implemented: bool,
}

/// POST /execute - Run code against ad-hoc test cases, nothing is stored
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let raw = payload.test_cases.into_raw();
    let report = state
        .executor
        .execute(&payload.code, &payload.language, &raw)
        .await;

    metrics::observe_execution(state.executor.registry(), &payload.language, &report);

    (StatusCode::OK, Json(report))
}

/// POST /submissions - Judge a submission for a stored challenge
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitRequest>,
) -> Response {
    match submission::submit_solution(&state.executor, state.store.as_ref(), payload).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /users/:user_id/stats
pub async fn user_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Response {
    match state.store.user_stats(&user_id).await {
        Ok(stats) => {
            info!(user_id = %user_id, total_score = stats.total_score, "User stats retrieved");
            (StatusCode::OK, Json(stats)).into_response()
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to fetch user stats");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": format!("Failed to query user stats: {}", e)
                })),
            )
                .into_response()
        }
    }
}

/// GET /languages
pub async fn list_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let languages: Vec<LanguageInfo> = state
        .executor
        .registry()
        .specs()
        .iter()
        .map(|spec| LanguageInfo {
            name: spec.name.clone(),
            aliases: spec.aliases.clone(),
            version: spec.version.clone(),
            compiled: spec.is_compiled(),
            implemented: spec.implemented,
        })
        .collect();

    Json(languages)
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
