// CLI commands for running code through the pipeline
use anyhow::{bail, Context, Result};
use coderun_common::config::PipelineConfig;
use coderun_common::types::{ExecutionResponse, JobRequest};
use coderun_engine::{ExecutionPipeline, FailureKind, LanguageRegistry};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exit code when the request itself was rejected
const EXIT_REJECTED: i32 = 2;
/// Exit code when compilation or artifact creation failed
const EXIT_PIPELINE_FAILURE: i32 = 3;
/// Exit code when the program ran but reported errors
const EXIT_PROGRAM_ERROR: i32 = 1;

pub struct RunOptions {
    pub language: String,
    pub file: Option<PathBuf>,
    pub code: Option<String>,
    pub input: Option<String>,
    pub input_file: Option<PathBuf>,
    pub compile_timeout: Option<u64>,
    pub execute_timeout: Option<u64>,
    pub work_dir: Option<PathBuf>,
    pub languages_file: Option<PathBuf>,
    pub json: bool,
}

impl RunOptions {
    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::from_env();
        if let Some(secs) = self.compile_timeout.filter(|s| *s > 0) {
            config = config.with_compile_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.execute_timeout.filter(|s| *s > 0) {
            config = config.with_execute_timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = &self.work_dir {
            config = config.with_work_dir(dir);
        }
        if let Some(path) = &self.languages_file {
            config.languages_file = Some(path.clone());
        }
        config
    }

    fn job(&self) -> Result<JobRequest> {
        let code = match (&self.file, &self.code) {
            (Some(path), _) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read source file {}", path.display()))?,
            (None, Some(code)) => code.clone(),
            (None, None) => bail!("Either --file or --code is required"),
        };

        let input = match (&self.input, &self.input_file) {
            (Some(input), _) => Some(input.clone()),
            (None, Some(path)) => Some(
                fs::read_to_string(path)
                    .with_context(|| format!("Failed to read input file {}", path.display()))?,
            ),
            (None, None) => None,
        };

        Ok(JobRequest {
            language: self.language.clone(),
            code,
            input,
        })
    }
}

/// Run a program and print its output; returns the process exit code
pub async fn run(options: RunOptions) -> Result<i32> {
    let job = options.job()?;
    let pipeline = ExecutionPipeline::from_config(&options.config())?;

    match pipeline.execute(&job).await {
        Ok(response) => {
            print_response(&response, options.json)?;
            Ok(if response.is_clean() { 0 } else { EXIT_PROGRAM_ERROR })
        }
        Err(e) => {
            if let Some(response) = e.response() {
                print_response(response, options.json)?;
            } else {
                eprintln!("error: {}", e);
            }
            Ok(match e.kind() {
                FailureKind::Client => EXIT_REJECTED,
                FailureKind::Server => EXIT_PIPELINE_FAILURE,
            })
        }
    }
}

fn print_response(response: &ExecutionResponse, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(response).context("Failed to serialize response")?;
        println!("{}", text);
    } else {
        print!("{}", response.output);
        if !response.error.is_empty() {
            eprint!("{}", response.error);
            if !response.error.ends_with('\n') {
                eprintln!();
            }
        }
    }
    Ok(())
}

fn load_registry(languages_file: Option<&Path>) -> Result<LanguageRegistry> {
    let work_dir = PipelineConfig::from_env().work_dir;
    match languages_file {
        Some(path) => LanguageRegistry::load(path, work_dir),
        None => LanguageRegistry::builtin(work_dir),
    }
}

/// List all supported languages
pub fn list_languages(languages_file: Option<&Path>) -> Result<()> {
    let registry = load_registry(languages_file)?;

    println!("{:<12} {:<12} {:<10} {}", "NAME", "DISPLAY", "COMPILED", "VERSION");
    for name in registry.languages() {
        if let Some(info) = registry.info(&name) {
            println!(
                "{:<12} {:<12} {:<10} {}",
                info.name,
                info.display_name,
                if info.compiled { "yes" } else { "no" },
                info.version
            );
        }
    }
    println!("\nTotal: {} language(s)", registry.languages().len());

    Ok(())
}

/// Print metadata for one language as JSON
pub fn show_info(languages_file: Option<&Path>, language: &str) -> Result<()> {
    let registry = load_registry(languages_file)?;
    let info = registry
        .info(language)
        .ok_or_else(|| anyhow::anyhow!("Language '{}' is not supported", language))?;

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
