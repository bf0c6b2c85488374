// Pipeline configuration, read from the environment at startup

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_EXECUTE_TIMEOUT_SECS: u64 = 10;

pub const ENV_COMPILE_TIMEOUT: &str = "CODERUN_COMPILE_TIMEOUT_SECS";
pub const ENV_EXECUTE_TIMEOUT: &str = "CODERUN_EXECUTE_TIMEOUT_SECS";
pub const ENV_WORK_DIR: &str = "CODERUN_WORK_DIR";
pub const ENV_LANGUAGES_FILE: &str = "CODERUN_LANGUAGES_FILE";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Deadline for the compile phase
    pub compile_timeout: Duration,
    /// Deadline for the execute phase
    pub execute_timeout: Duration,
    /// Directory holding job artifacts
    pub work_dir: PathBuf,
    /// Optional override for the built-in language table
    pub languages_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compile_timeout: Duration::from_secs(DEFAULT_COMPILE_TIMEOUT_SECS),
            execute_timeout: Duration::from_secs(DEFAULT_EXECUTE_TIMEOUT_SECS),
            work_dir: std::env::temp_dir().join("coderun"),
            languages_file: None,
        }
    }
}

impl PipelineConfig {
    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            compile_timeout: secs_or(
                ENV_COMPILE_TIMEOUT,
                lookup(ENV_COMPILE_TIMEOUT),
                defaults.compile_timeout,
            ),
            execute_timeout: secs_or(
                ENV_EXECUTE_TIMEOUT,
                lookup(ENV_EXECUTE_TIMEOUT),
                defaults.execute_timeout,
            ),
            work_dir: lookup(ENV_WORK_DIR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            languages_file: lookup(ENV_LANGUAGES_FILE)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    pub fn with_execute_timeout(mut self, timeout: Duration) -> Self {
        self.execute_timeout = timeout;
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }
}

fn secs_or(key: &str, value: Option<String>, fallback: Duration) -> Duration {
    let Some(raw) = value else {
        return fallback;
    };

    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            warn!(
                key = key,
                value = %raw,
                fallback_secs = fallback.as_secs(),
                "Invalid timeout value, using default"
            );
            fallback
        }
    }
}
