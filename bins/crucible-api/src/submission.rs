/// Submission boundary
///
/// **Flow:**
/// 1. Load the challenge and check the language is allowed for it
/// 2. Run the engine against the challenge's test cases
/// 3. Persist the solution and one result record per test case, awarding
///    points in the same atomic step on a first successful solve
///
/// The engine never touches storage; everything persistent happens here.

use crate::metrics;
use crate::store::{StoreError, SubmissionStore};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use crucible_common::types::{ResultRecord, Solution, SubmissionOutcome};
use crucible_engine::Executor;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub user_id: String,
    pub challenge_id: u64,
    pub language: String,
    pub code: String,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Challenge {0} not found")]
    ChallengeNotFound(u64),

    #[error("Language {language} is not allowed for challenge {challenge_id}")]
    LanguageNotAllowed { language: String, challenge_id: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SubmissionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubmissionError::ChallengeNotFound(_) => StatusCode::NOT_FOUND,
            SubmissionError::LanguageNotAllowed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SubmissionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Submission failed");
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Judge a submission and record it
#[instrument(
    skip(executor, store, request),
    fields(user_id = %request.user_id, challenge_id = request.challenge_id, language = %request.language)
)]
pub async fn submit_solution(
    executor: &Executor,
    store: &dyn SubmissionStore,
    request: SubmitRequest,
) -> Result<SubmissionOutcome, SubmissionError> {
    let challenge = store
        .challenge(request.challenge_id)
        .await?
        .ok_or(SubmissionError::ChallengeNotFound(request.challenge_id))?;

    // Aliases are checked under their canonical name
    let language = executor
        .registry()
        .get(&request.language)
        .map_or(request.language.as_str(), |spec| spec.name.as_str());

    if !challenge.accepts_language(language) {
        return Err(SubmissionError::LanguageNotAllowed {
            language: request.language,
            challenge_id: challenge.id,
        });
    }

    let report = executor
        .execute(&request.code, &request.language, &challenge.test_cases)
        .await;
    metrics::observe_execution(executor.registry(), &request.language, &report);

    let mut solution = Solution {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        challenge_id: challenge.id,
        language: request.language,
        code: request.code,
        submitted_at: Utc::now(),
        is_successful: report.is_successful,
        execution_time_ms: report.execution_time_ms,
        error_message: report.error_message.clone(),
        points_earned: 0,
    };

    let records: Vec<ResultRecord> = report
        .test_results
        .iter()
        .map(|result| ResultRecord::from_test_result(&solution, result))
        .collect();

    let first_solve = store
        .record_submission(&solution, &records, challenge.points)
        .await?;

    if first_solve {
        solution.points_earned = challenge.points;
        metrics::FIRST_SOLVES_TOTAL.inc();
        info!(points = challenge.points, "First solve awarded");
    }

    info!(
        solution_id = %solution.id,
        success = solution.is_successful,
        points_earned = solution.points_earned,
        "Submission recorded"
    );

    Ok(SubmissionOutcome {
        solution,
        report,
        first_solve,
    })
}
