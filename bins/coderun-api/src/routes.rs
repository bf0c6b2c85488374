// Route table for the coderun API

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/execute", post(handlers::execute_code))
        .route("/languages", get(handlers::list_languages))
        .route("/languages/:name", get(handlers::get_language))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use coderun_common::config::PipelineConfig;
    use coderun_engine::artifact::FsArtifactStore;
    use coderun_engine::runner::LocalProcessRunner;
    use coderun_engine::{ExecutionPipeline, LanguageRegistry};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const TEST_LANGUAGES: &str = r#"{"languages":[
        {"name":"shell","display_name":"Shell","version":"posix","source_extension":"sh",
         "execute":{"command":"sh","args":["{source}"]}},
        {"name":"shc","display_name":"Checked Shell","version":"posix","source_extension":"sh",
         "output_extension":"bin",
         "compile":{"command":"sh","args":["-c","sh -n \"$0\" && cp \"$0\" \"$1\"","{source}","{output}"]},
         "execute":{"command":"sh","args":["{output}"]}}
    ]}"#;

    fn test_app() -> (TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let registry = LanguageRegistry::from_json(TEST_LANGUAGES, dir.path()).unwrap();
        let pipeline = ExecutionPipeline::new(
            Arc::new(registry),
            Arc::new(FsArtifactStore::new(dir.path())),
            Arc::new(LocalProcessRunner::new()),
            &PipelineConfig::default().with_work_dir(dir.path()),
        );
        let app = app(Arc::new(AppState { pipeline }));
        (dir, app)
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_execute_success() {
        let (_dir, app) = test_app();
        let (status, body) = post_json(
            app,
            "/execute",
            serde_json::json!({"language": "shell", "code": "read x\necho \"got $x\"", "input": "5"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "got 5\n");
        assert_eq!(body["error"], "");
        assert_eq!(body["language"], "shell");
        assert_eq!(body["info"]["display_name"], "Shell");
    }

    #[tokio::test]
    async fn test_execute_program_error_is_ok() {
        let (_dir, app) = test_app();
        let (status, body) = post_json(
            app,
            "/execute",
            serde_json::json!({"language": "shell", "code": "echo bad >&2; exit 1"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "bad\n");
    }

    #[tokio::test]
    async fn test_execute_rejects_empty_code() {
        let (_dir, app) = test_app();
        let (status, body) = post_json(
            app,
            "/execute",
            serde_json::json!({"language": "shell"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Code must not be empty");
        assert_eq!(body["language"], "shell");
    }

    #[tokio::test]
    async fn test_execute_rejects_unknown_language() {
        let (_dir, app) = test_app();
        let (status, body) = post_json(
            app,
            "/execute",
            serde_json::json!({"language": "cobol", "code": "DISPLAY 'HI'."}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported language: cobol");
    }

    #[tokio::test]
    async fn test_execute_compile_failure() {
        let (_dir, app) = test_app();
        let (status, body) = post_json(
            app,
            "/execute",
            serde_json::json!({"language": "shc", "code": "echo ("}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["output"], "");
        assert_ne!(body["error"], "");
        assert_eq!(body["info"]["compiled"], true);
    }

    #[tokio::test]
    async fn test_list_languages() {
        let (_dir, app) = test_app();
        let (status, body) = get_body(app, "/languages").await;

        assert_eq!(status, StatusCode::OK);
        let languages: Value = serde_json::from_str(&body).unwrap();
        let names: Vec<&str> = languages
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["shc", "shell"]);
    }

    #[tokio::test]
    async fn test_get_language() {
        let (_dir, app) = test_app();
        let (status, body) = get_body(app.clone(), "/languages/shell").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"display_name\":\"Shell\""));

        let (status, _) = get_body(app, "/languages/cobol").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let (_dir, app) = test_app();
        let (status, body) = get_body(app.clone(), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");

        let _ = post_json(
            app.clone(),
            "/execute",
            serde_json::json!({"language": "shell", "code": "echo hi"}),
        )
        .await;

        let (status, body) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("coderun_jobs_total"));
    }
}
