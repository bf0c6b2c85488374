//! Pipeline-level failures.
//!
//! Only malformed requests, compile failures and artifact creation failures
//! end up here. Everything that happens while the user's program runs is
//! reported inside a successful `ExecutionResponse`.

use coderun_common::types::ExecutionResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Code must not be empty")]
    EmptyCode,
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("Compilation failed for {}", .0.language)]
    Compilation(Box<ExecutionResponse>),
    #[error("Failed to materialize job artifact: {0}")]
    Artifact(#[source] std::io::Error),
}

/// Who is to blame for a pipeline-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Malformed request, rejected before any work
    Client,
    /// The service ran the job and observed a failure
    Server,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::EmptyCode | PipelineError::UnsupportedLanguage(_) => FailureKind::Client,
            PipelineError::Compilation(_) | PipelineError::Artifact(_) => FailureKind::Server,
        }
    }

    /// The response payload carried by a compile failure
    pub fn response(&self) -> Option<&ExecutionResponse> {
        match self {
            PipelineError::Compilation(response) => Some(response.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderun_common::types::LanguageInfo;

    #[test]
    fn test_request_errors_are_client_failures() {
        assert_eq!(PipelineError::EmptyCode.kind(), FailureKind::Client);
        assert_eq!(
            PipelineError::UnsupportedLanguage("cobol".into()).kind(),
            FailureKind::Client
        );
        assert!(PipelineError::EmptyCode.response().is_none());
    }

    #[test]
    fn test_compilation_carries_response() {
        let err = PipelineError::Compilation(Box::new(ExecutionResponse {
            output: String::new(),
            error: "main.c:1: error".to_string(),
            language: "c".to_string(),
            info: LanguageInfo {
                name: "c".to_string(),
                display_name: "C".to_string(),
                version: "17".to_string(),
                compiled: true,
                source_extension: "c".to_string(),
                description: String::new(),
            },
        }));

        assert_eq!(err.kind(), FailureKind::Server);
        assert_eq!(err.to_string(), "Compilation failed for c");
        assert_eq!(err.response().unwrap().error, "main.c:1: error");
    }

    #[test]
    fn test_artifact_error_message() {
        let err = PipelineError::Artifact(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only file system",
        ));
        assert_eq!(err.kind(), FailureKind::Server);
        assert!(err.to_string().contains("read-only file system"));
    }
}
