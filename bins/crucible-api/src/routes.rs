use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execute", post(handlers::execute))
        .route("/submissions", post(handlers::submit))
        .route("/users/:user_id/stats", get(handlers::user_stats))
        .route("/languages", get(handlers::list_languages))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use crucible_common::config::ExecutionConfig;
    use crucible_common::types::Challenge;
    use crucible_engine::{Executor, LanguageRegistry, LanguageSpec};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app() -> (Router, TempDir) {
        let root = tempfile::tempdir().unwrap();
        let registry = LanguageRegistry::from_specs(vec![
            LanguageSpec::interpreted("shell", "sh", &["{source}"], "sh"),
            LanguageSpec::unimplemented("csharp", "cs"),
        ])
        .unwrap();
        let executor = Executor::new(registry, ExecutionConfig::default().with_scratch_root(root.path()));
        let store = MemoryStore::new(vec![Challenge {
            id: 7,
            title: "Palindrome Check".to_string(),
            test_cases: r#"[{"Input":"racecar","ExpectedOutput":"True"},{"Input":"hello","ExpectedOutput":"False"}]"#
                .to_string(),
            points: 20,
            allowed_languages: Vec::new(),
        }]);

        let state = Arc::new(AppState {
            executor,
            store: Arc::new(store),
        });

        (routes().with_state(state), root)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    const PALINDROME: &str = "read s\ncase \"$s\" in racecar|level) echo true ;; *) echo false ;; esac\n";

    #[tokio::test]
    async fn test_execute_with_array_payload() {
        let (app, _root) = app();
        let body = json!({
            "code": "read a\nread b\necho $((a + b))\n",
            "language": "shell",
            "test_cases": [{"Input": "2\n3", "ExpectedOutput": "5"}]
        });

        let (status, report) = send(&app, "POST", "/execute", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["is_successful"], json!(true));
        assert_eq!(report["test_results"][0]["actual_output"], json!("5"));
    }

    #[tokio::test]
    async fn test_execute_with_raw_payload() {
        let (app, _root) = app();
        let body = json!({ "code": "", "language": "csharp", "test_cases": "[]" });

        let (status, report) = send(&app, "POST", "/execute", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["is_successful"], json!(false));
        assert_eq!(report["error_message"], json!("No test cases provided"));
    }

    #[tokio::test]
    async fn test_unknown_languages_do_not_add_metric_series() {
        let (app, _root) = app();

        for language in ["made-up-lang-a", "made-up-lang-b"] {
            let body = json!({
                "code": "echo 1",
                "language": language,
                "test_cases": [{"Input": "", "ExpectedOutput": "1"}]
            });
            let (status, report) = send(&app, "POST", "/execute", Some(body)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(report["is_successful"], json!(false));
        }

        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);

        assert!(!text.contains("made-up-lang"));
        assert!(text.contains("language=\"unsupported\""));
    }

    #[tokio::test]
    async fn test_submission_flow_and_stats() {
        let (app, _root) = app();
        let body = json!({
            "user_id": "alice",
            "challenge_id": 7,
            "language": "shell",
            "code": PALINDROME
        });

        let (status, outcome) = send(&app, "POST", "/submissions", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(outcome["first_solve"], json!(true), "outcome: {}", outcome);
        assert_eq!(outcome["solution"]["points_earned"], json!(20));

        let (_, again) = send(&app, "POST", "/submissions", Some(body)).await;
        assert_eq!(again["first_solve"], json!(false));

        let (status, stats) = send(&app, "GET", "/users/alice/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats, json!({ "total_score": 20, "solved_challenges": 1 }));
    }

    #[tokio::test]
    async fn test_submission_unknown_challenge() {
        let (app, _root) = app();
        let body = json!({ "user_id": "alice", "challenge_id": 99, "language": "shell", "code": "" });

        let (status, error) = send(&app, "POST", "/submissions", Some(body)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"], json!("Challenge 99 not found"));
    }

    #[tokio::test]
    async fn test_languages_and_status() {
        let (app, _root) = app();

        let (status, languages) = send(&app, "GET", "/languages", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(languages[0]["name"], json!("shell"));
        assert_eq!(languages[1]["implemented"], json!(false));

        let request = Request::builder().uri("/status").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
