/// Execution Pipeline - High-Level Orchestration
///
/// **Responsibility:**
/// Drive one job from request to response:
/// 1. Validate language and code
/// 2. Materialize the source through the ArtifactStore (artifact.rs)
/// 3. Resolve commands from the LanguageRegistry (registry.rs)
/// 4. Compile (optional) and execute through the ProcessRunner (runner.rs)
/// 5. Remove the artifacts on every path that created them
/// 6. Attach language metadata
///
/// Request errors and compile failures are returned as `PipelineError`.
/// Everything the user's program does at run time (non-zero exit, crash,
/// timeout, missing binary) is reported inside an `Ok(ExecutionResponse)`.

use crate::artifact::{ArtifactStore, FsArtifactStore};
use crate::error::PipelineError;
use crate::registry::{CommandSpec, Invocation, LanguageConfig, LanguageRegistry};
use crate::runner::{LocalProcessRunner, ProcessOutcome, ProcessRunner};
use anyhow::{Context, Result};
use coderun_common::config::PipelineConfig;
use coderun_common::types::{ExecutionResponse, JobRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of the compile and execute phases, before metadata is attached
enum PhaseResult {
    Completed { output: String, error: String },
    CompileFailed { error: String },
}

pub struct ExecutionPipeline {
    registry: Arc<LanguageRegistry>,
    store: Arc<dyn ArtifactStore>,
    runner: Arc<dyn ProcessRunner>,
    compile_timeout: Duration,
    execute_timeout: Duration,
}

impl ExecutionPipeline {
    pub fn new(
        registry: Arc<LanguageRegistry>,
        store: Arc<dyn ArtifactStore>,
        runner: Arc<dyn ProcessRunner>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            registry,
            store,
            runner,
            compile_timeout: config.compile_timeout,
            execute_timeout: config.execute_timeout,
        }
    }

    /// Production wiring: filesystem artifacts, local processes
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let registry = match &config.languages_file {
            Some(path) => LanguageRegistry::load(path, &config.work_dir)?,
            None => LanguageRegistry::builtin(&config.work_dir)?,
        };

        std::fs::create_dir_all(&config.work_dir).with_context(|| {
            format!("Failed to create work directory {}", config.work_dir.display())
        })?;

        info!(
            languages = ?registry.languages(),
            work_dir = %config.work_dir.display(),
            compile_timeout_secs = config.compile_timeout.as_secs_f64(),
            execute_timeout_secs = config.execute_timeout.as_secs_f64(),
            "Execution pipeline ready"
        );

        Ok(Self::new(
            Arc::new(registry),
            Arc::new(FsArtifactStore::new(&config.work_dir)),
            Arc::new(LocalProcessRunner::new().with_current_dir(&config.work_dir)),
            config,
        ))
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    /// Run a job through every phase
    #[tracing::instrument(skip(self, job), fields(language = %job.language, source_size = job.code.len()))]
    pub async fn execute(&self, job: &JobRequest) -> Result<ExecutionResponse, PipelineError> {
        let start = Instant::now();
        let language = self.validate(job)?;

        let job_id = self
            .store
            .create(&language.name, &language.source_extension, &job.code)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to create job artifact");
                PipelineError::Artifact(e)
            })?;

        info!(job_id = %job_id, "Job materialized");

        let spec = self.registry.resolve(&job_id, &language.name);
        let result = match &spec {
            Some(spec) => Ok(self.run_phases(&job_id, spec, job.input.as_deref()).await),
            None => Err(PipelineError::UnsupportedLanguage(language.name.clone())),
        };

        // Cleanup runs on every path past materialization
        self.store
            .remove(
                &job_id,
                &language.source_extension,
                spec.as_ref().and_then(|s| s.output_extension.as_deref()),
            )
            .await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let info = language.info();

        match result? {
            PhaseResult::Completed { output, error } => {
                info!(
                    job_id = %job_id,
                    elapsed_ms = elapsed_ms,
                    output_bytes = output.len(),
                    has_error = !error.is_empty(),
                    "Job completed"
                );
                Ok(ExecutionResponse {
                    output,
                    error,
                    language: language.name.clone(),
                    info,
                })
            }
            PhaseResult::CompileFailed { error } => {
                warn!(
                    job_id = %job_id,
                    elapsed_ms = elapsed_ms,
                    error_preview = error.lines().next().unwrap_or(""),
                    "Compilation failed"
                );
                Err(PipelineError::Compilation(Box::new(ExecutionResponse {
                    output: String::new(),
                    error,
                    language: language.name.clone(),
                    info,
                })))
            }
        }
    }

    fn validate(&self, job: &JobRequest) -> Result<&LanguageConfig, PipelineError> {
        if job.code.trim().is_empty() {
            return Err(PipelineError::EmptyCode);
        }

        self.registry
            .get(&job.language)
            .ok_or_else(|| PipelineError::UnsupportedLanguage(job.language.clone()))
    }

    async fn run_phases(&self, job_id: &Uuid, spec: &CommandSpec, input: Option<&str>) -> PhaseResult {
        if let Some(compile) = &spec.compile {
            if let Err(error) = self.compile(job_id, compile).await {
                return PhaseResult::CompileFailed { error };
            }
        }

        let (output, error) = self.run_program(job_id, spec.execute.as_ref(), input).await;
        PhaseResult::Completed { output, error }
    }

    async fn compile(&self, job_id: &Uuid, compile: &Invocation) -> Result<(), String> {
        debug!(job_id = %job_id, command = %compile.command, "Compiling");

        let outcome = self
            .runner
            .run(&compile.command, &compile.args, None, self.compile_timeout)
            .await;

        if outcome.success() {
            debug!(job_id = %job_id, elapsed_ms = outcome.elapsed_ms, "Compilation succeeded");
            return Ok(());
        }

        Err(compile_error_text(&compile.command, &outcome, self.compile_timeout))
    }

    async fn run_program(
        &self,
        job_id: &Uuid,
        execute: Option<&Invocation>,
        input: Option<&str>,
    ) -> (String, String) {
        let Some(execute) = execute else {
            warn!(job_id = %job_id, "No execute command configured");
            return (String::new(), "Runtime error: executable not found".to_string());
        };

        debug!(job_id = %job_id, command = %execute.command, "Executing");

        let outcome = self
            .runner
            .run(&execute.command, &execute.args, input, self.execute_timeout)
            .await;

        if let Some(spawn_error) = &outcome.spawn_error {
            return (
                String::new(),
                format!(
                    "Runtime error: failed to start '{}': {}",
                    execute.command, spawn_error
                ),
            );
        }

        let mut error = outcome.stderr.clone();
        if outcome.timed_out {
            append_notice(&mut error, &timeout_notice("Execution", self.execute_timeout));
        } else if let Some(signal) = outcome.signal_name() {
            append_notice(&mut error, &format!("[Process terminated by {}]", signal));
        }

        (outcome.stdout, error)
    }
}

/// Compiler diagnostics, preferring stderr over stdout over a generic message
fn compile_error_text(command: &str, outcome: &ProcessOutcome, timeout: Duration) -> String {
    if let Some(spawn_error) = &outcome.spawn_error {
        return format!(
            "Compilation error: failed to start compiler '{}': {}",
            command, spawn_error
        );
    }

    let mut text = if !outcome.stderr.trim().is_empty() {
        outcome.stderr.clone()
    } else if !outcome.stdout.trim().is_empty() {
        outcome.stdout.clone()
    } else {
        String::new()
    };

    if outcome.timed_out {
        append_notice(&mut text, &timeout_notice("Compilation", timeout));
    } else if let Some(signal) = outcome.signal_name() {
        append_notice(&mut text, &format!("[Compiler terminated by {}]", signal));
    }

    if text.is_empty() {
        text = match outcome.exit_code {
            Some(code) => format!("Compilation failed with exit code {}", code),
            None => "Compilation failed".to_string(),
        };
    }

    text
}

fn timeout_notice(phase: &str, timeout: Duration) -> String {
    format!("[{} timed out after {:.1}s]", phase, timeout.as_secs_f64())
}

/// Append a notice on its own line, keeping any existing text
fn append_notice(text: &mut String, notice: &str) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(notice);
}
