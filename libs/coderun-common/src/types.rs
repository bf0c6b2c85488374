use serde::{Deserialize, Serialize};

/// A single code-execution request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub input: Option<String>,
}

impl JobRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
            input: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/// Descriptive metadata attached to every response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub compiled: bool,
    pub source_extension: String,
    pub description: String,
}

/// Uniform response shape for a finished job.
///
/// An empty `error` means the program ran cleanly. A non-empty `error` on a
/// successful pipeline run is the program's own stderr, a timeout notice, or
/// a signal notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub output: String,
    pub error: String,
    pub language: String,
    pub info: LanguageInfo,
}

impl ExecutionResponse {
    pub fn is_clean(&self) -> bool {
        self.error.is_empty()
    }
}
