//! Configuration loader and validator for the session ingestion pipeline.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub tools: Tools,
    pub storage: Storage,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    /// Holds the SQLite database unless `DATABASE_URL` is set.
    pub data_dir: String,
    /// Scratch directory for per-job workspaces.
    pub scratch_dir: String,
    #[serde(default = "default_completion_capacity")]
    pub completion_capacity: usize,
}

/// An external program plus the arguments placed before the pipeline's own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

/// Transcoding tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tools {
    pub fragmenter: ToolCommand,
    pub packager: ToolCommand,
    pub prober: ToolCommand,
    #[serde(default = "default_fragment_duration_ms")]
    pub fragment_duration_ms: u64,
}

/// Remote storage service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Storage {
    pub base_url: String,
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,
}

fn default_completion_capacity() -> usize {
    50
}

fn default_fragment_duration_ms() -> u64 {
    4000
}

fn default_max_document_bytes() -> u64 {
    20_000_000
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            fragmenter: ToolCommand::new("mp4fragment"),
            packager: ToolCommand::new("mp4dash"),
            prober: ToolCommand::new("ffprobe"),
            fragment_duration_ms: default_fragment_duration_ms(),
        }
    }
}

impl Config {
    /// Ensure required directories exist (data and scratch).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        for dir in [&self.app.data_dir, &self.app.scratch_dir] {
            if !dir.trim().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    pub fn scratch_dir(&self) -> PathBuf {
        PathBuf::from(&self.app.scratch_dir)
    }

    /// Database URL, `DATABASE_URL` first, then `{data_dir}/sessions.db`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/sessions.db", self.app.data_dir))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.scratch_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.scratch_dir must be non-empty"));
    }
    if cfg.app.completion_capacity == 0 {
        return Err(ConfigError::Invalid("app.completion_capacity must be > 0"));
    }

    if cfg.tools.fragmenter.program.trim().is_empty() {
        return Err(ConfigError::Invalid("tools.fragmenter.program must be non-empty"));
    }
    if cfg.tools.packager.program.trim().is_empty() {
        return Err(ConfigError::Invalid("tools.packager.program must be non-empty"));
    }
    if cfg.tools.prober.program.trim().is_empty() {
        return Err(ConfigError::Invalid("tools.prober.program must be non-empty"));
    }
    if cfg.tools.fragment_duration_ms == 0 {
        return Err(ConfigError::Invalid("tools.fragment_duration_ms must be > 0"));
    }

    if reqwest::Url::parse(&cfg.storage.base_url).is_err() {
        return Err(ConfigError::Invalid("storage.base_url must be an absolute URL"));
    }
    if cfg.storage.max_document_bytes == 0 {
        return Err(ConfigError::Invalid("storage.max_document_bytes must be > 0"));
    }

    Ok(())
}

/// Returns the example YAML shipped with the binary.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  scratch_dir: "/tmp/session-ingest"
  completion_capacity: 50

tools:
  fragmenter:
    program: "mp4fragment"
  packager:
    program: "mp4dash"
  prober:
    program: "ffprobe"
  fragment_duration_ms: 4000

storage:
  base_url: "http://localhost:8080/"
  max_document_bytes: 20000000
"#
}
