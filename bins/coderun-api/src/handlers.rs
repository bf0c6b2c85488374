// HTTP route handlers for the coderun API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use coderun_common::types::{JobRequest, LanguageInfo};
use coderun_engine::{FailureKind, PipelineError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::metrics;
use crate::AppState;

/// Missing fields become empty strings so the pipeline reports them
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub language: String,
}

/// POST /execute - Run code and return its output
pub async fn execute_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitRequest>,
) -> Response {
    let job = JobRequest {
        language: payload.language,
        code: payload.code,
        input: payload.input,
    };

    let start = Instant::now();
    let result = state.pipeline.execute(&job).await;
    let elapsed = start.elapsed();

    // Unknown names are collapsed to keep label cardinality bounded
    let language_label = if state.pipeline.registry().supports(&job.language) {
        job.language.trim().to_ascii_lowercase()
    } else {
        "unsupported".to_string()
    };

    match result {
        Ok(response) => {
            let outcome = if response.is_clean() { "ok" } else { "program_error" };
            metrics::observe_job(&language_label, outcome, elapsed);
            info!(
                language = %response.language,
                elapsed_ms = elapsed.as_millis() as u64,
                outcome = outcome,
                "Job finished"
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            metrics::observe_job(&language_label, outcome_label(&e), elapsed);
            let status = match e.kind() {
                FailureKind::Client => StatusCode::BAD_REQUEST,
                FailureKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
            };

            match e.response() {
                Some(response) => {
                    warn!(language = %response.language, "Job failed to compile");
                    (status, Json(response.clone())).into_response()
                }
                None => {
                    if status == StatusCode::INTERNAL_SERVER_ERROR {
                        error!(language = %job.language, error = %e, "Job failed");
                    } else {
                        info!(language = %job.language, error = %e, "Job rejected");
                    }
                    (
                        status,
                        Json(ErrorResponse {
                            error: e.to_string(),
                            language: job.language,
                        }),
                    )
                        .into_response()
                }
            }
        }
    }
}

fn outcome_label(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::EmptyCode | PipelineError::UnsupportedLanguage(_) => "rejected",
        PipelineError::Compilation(_) => "compile_error",
        PipelineError::Artifact(_) => "internal_error",
    }
}

/// GET /languages - Metadata for every supported language
pub async fn list_languages(State(state): State<Arc<AppState>>) -> Json<Vec<LanguageInfo>> {
    let registry = state.pipeline.registry();
    let languages: Vec<LanguageInfo> = registry
        .languages()
        .iter()
        .filter_map(|name| registry.info(name))
        .collect();
    Json(languages)
}

/// GET /languages/{name} - Metadata for one language
pub async fn get_language(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match state.pipeline.registry().info(&name) {
        Some(info) => (StatusCode::OK, Json(info)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("Unsupported language: {}", name)
            })),
        )
            .into_response(),
    }
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn export_metrics() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
