// Language registry for the execution pipeline
use anyhow::{bail, Context, Result};
use coderun_common::types::LanguageInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::artifact::artifact_path;

/// Built-in language table, shipped with the workspace
const BUILTIN_LANGUAGES: &str = include_str!("../../../config/languages.json");

/// A command line with `{source}`, `{output}`, `{dir}` and `{id}` placeholders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    pub display_name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub source_extension: String,
    #[serde(default)]
    pub output_extension: Option<String>,
    #[serde(default)]
    pub compile: Option<CommandTemplate>,
    #[serde(default)]
    pub execute: Option<CommandTemplate>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// A fully resolved command for one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

/// Resolved compile/execute invocation for a single job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub compile: Option<Invocation>,
    pub execute: Option<Invocation>,
    pub output_extension: Option<String>,
}

impl LanguageConfig {
    pub fn info(&self) -> LanguageInfo {
        LanguageInfo {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            version: self.version.clone(),
            compiled: self.compile.is_some(),
            source_extension: self.source_extension.clone(),
            description: self.description.clone(),
        }
    }

    fn command_spec(&self, work_dir: &Path, job_id: &Uuid) -> CommandSpec {
        let source = artifact_path(work_dir, job_id, &self.source_extension);
        let output = artifact_path(
            work_dir,
            job_id,
            self.output_extension.as_deref().unwrap_or("out"),
        );
        let vars = Placeholders {
            source: source.to_string_lossy().into_owned(),
            output: output.to_string_lossy().into_owned(),
            dir: work_dir.to_string_lossy().into_owned(),
            id: job_id.to_string(),
        };

        CommandSpec {
            compile: self.compile.as_ref().map(|t| vars.apply(t)),
            execute: self.execute.as_ref().map(|t| vars.apply(t)),
            output_extension: self.output_extension.clone(),
        }
    }

    fn normalize(mut self) -> Result<Self> {
        self.name = normalize_name(&self.name);
        if self.name.is_empty() {
            bail!("Language entry with empty name");
        }
        self.source_extension = trim_extension(&self.source_extension);
        if self.source_extension.is_empty() {
            bail!("Language '{}' has no source extension", self.name);
        }
        self.output_extension = self
            .output_extension
            .as_deref()
            .map(trim_extension)
            .filter(|ext| !ext.is_empty());
        if self.compile.is_some() && self.output_extension.is_none() {
            self.output_extension = Some("out".to_string());
        }
        Ok(self)
    }
}

struct Placeholders {
    source: String,
    output: String,
    dir: String,
    id: String,
}

impl Placeholders {
    fn substitute(&self, template: &str) -> String {
        template
            .replace("{source}", &self.source)
            .replace("{output}", &self.output)
            .replace("{dir}", &self.dir)
            .replace("{id}", &self.id)
    }

    fn apply(&self, template: &CommandTemplate) -> Invocation {
        Invocation {
            command: self.substitute(&template.command),
            args: template.args.iter().map(|a| self.substitute(a)).collect(),
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn trim_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_string()
}

/// Immutable language lookup table, built once at startup
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    configs: HashMap<String, LanguageConfig>,
    work_dir: PathBuf,
}

impl LanguageRegistry {
    /// Load the table shipped in config/languages.json
    pub fn builtin(work_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::from_json(BUILTIN_LANGUAGES, work_dir).context("Invalid built-in language table")
    }

    /// Load language configurations from a languages.json file
    pub fn load(config_path: &Path, work_dir: impl Into<PathBuf>) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content, work_dir)
            .with_context(|| format!("Failed to load {}", config_path.display()))
    }

    pub fn from_json(content: &str, work_dir: impl Into<PathBuf>) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse languages.json")?;

        if languages_json.languages.is_empty() {
            bail!("No languages configured");
        }

        let mut configs = HashMap::new();
        for lang in languages_json.languages {
            let lang = lang.normalize()?;
            if configs.contains_key(&lang.name) {
                bail!("Language '{}' is configured more than once", lang.name);
            }
            configs.insert(lang.name.clone(), lang);
        }

        Ok(Self {
            configs,
            work_dir: work_dir.into(),
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn supports(&self, language: &str) -> bool {
        self.configs.contains_key(&normalize_name(language))
    }

    pub fn get(&self, language: &str) -> Option<&LanguageConfig> {
        self.configs.get(&normalize_name(language))
    }

    /// Metadata for a supported language
    pub fn info(&self, language: &str) -> Option<LanguageInfo> {
        self.get(language).map(LanguageConfig::info)
    }

    pub fn source_extension(&self, language: &str) -> Option<&str> {
        self.get(language).map(|c| c.source_extension.as_str())
    }

    /// Resolve the compile/execute commands for a materialized job
    pub fn resolve(&self, job_id: &Uuid, language: &str) -> Option<CommandSpec> {
        self.get(language)
            .map(|config| config.command_spec(&self.work_dir, job_id))
    }

    /// List all supported languages, sorted by name
    pub fn languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }
}
