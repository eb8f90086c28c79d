use krieg_core::belief::{ExpansionPolicy, UpdaterConfig};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_MAX_PLIES: usize = 200;
const DEFAULT_MAX_ATTEMPTS: usize = 64;
const DEFAULT_SEARCH_DEPTH: u32 = 2;
const DEFAULT_LAMBDA: f64 = 0.004;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root arena configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchConfig {
    pub run_id: String,
    pub games: GamesConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub opponent: OpponentConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.games.validate()?;
        self.agent.validate()?;
        self.opponent.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        self.logging.validate()?;
        Ok(())
    }

    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            beliefs_dir: self
                .outputs
                .beliefs_dir
                .as_deref()
                .map(|dir| resolve_template(&self.run_id, dir)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GamesConfig {
    pub count: usize,
    pub seed: Option<u64>,
    #[serde(default = "default_max_plies")]
    pub max_plies: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_turn: usize,
}

impl GamesConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(invalid("games.count", "number of games must be greater than zero"));
        }
        if self.max_plies == 0 {
            return Err(invalid("games.max_plies", "max_plies must be at least 1"));
        }
        if self.max_attempts_per_turn == 0 {
            return Err(invalid(
                "games.max_attempts_per_turn",
                "max_attempts_per_turn must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_max_plies() -> usize {
    DEFAULT_MAX_PLIES
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecommenderKind {
    #[default]
    Material,
    Uci,
}

/// The belief-tracking side (always White).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub recommender: RecommenderKind,
    #[serde(default = "default_search_depth")]
    pub depth: u32,
    /// Overrides `KRIEG_MAX_HYPOTHESES` when set.
    #[serde(default)]
    pub max_hypotheses: Option<usize>,
    /// Overrides `KRIEG_EXPANSION` when set.
    #[serde(default)]
    pub expansion: Option<String>,
    /// Persisted prior to start every game from.
    #[serde(default)]
    pub prior: Option<PathBuf>,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            recommender: RecommenderKind::default(),
            depth: DEFAULT_SEARCH_DEPTH,
            max_hypotheses: None,
            expansion: None,
            prior: None,
            params: serde_yaml::Value::Mapping(Default::default()),
        }
    }
}

impl AgentConfig {
    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.depth == 0 {
            return Err(invalid("agent.depth", "search depth must be at least 1"));
        }
        if self.max_hypotheses == Some(0) {
            return Err(invalid("agent.max_hypotheses", "max_hypotheses must be at least 1"));
        }
        if let Some(expansion) = &self.expansion {
            expansion
                .parse::<ExpansionPolicy>()
                .map_err(|err| invalid("agent.expansion", &err.to_string()))?;
        }
        if self.params.is_null() {
            self.params = serde_yaml::Value::Mapping(Default::default());
        }
        Ok(())
    }

    /// Environment defaults with the explicit YAML values layered on top.
    pub fn updater_config(&self) -> UpdaterConfig {
        let mut config = UpdaterConfig::from_env();
        if let Some(max) = self.max_hypotheses {
            config.max_hypotheses = max;
        }
        if let Some(policy) = self
            .expansion
            .as_deref()
            .and_then(|text| text.parse::<ExpansionPolicy>().ok())
        {
            config.expansion = policy;
        }
        config
    }
}

fn default_search_depth() -> u32 {
    DEFAULT_SEARCH_DEPTH
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpponentKind {
    #[default]
    Quantal,
    Random,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OpponentConfig {
    #[serde(default)]
    pub kind: OpponentKind,
    #[serde(default = "default_lambda")]
    pub lambda: f64,
}

impl Default for OpponentConfig {
    fn default() -> Self {
        Self {
            kind: OpponentKind::default(),
            lambda: DEFAULT_LAMBDA,
        }
    }
}

impl OpponentConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.lambda.is_finite() {
            return Err(invalid("opponent.lambda", "lambda must be a finite number"));
        }
        Ok(())
    }
}

fn default_lambda() -> f64 {
    DEFAULT_LAMBDA
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
    /// When set, each game's final beliefs are saved here as a prior file.
    #[serde(default)]
    pub beliefs_dir: Option<String>,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        let mut fields = vec![
            ("outputs.jsonl", self.jsonl.as_str()),
            ("outputs.summary_md", self.summary_md.as_str()),
        ];
        if let Some(dir) = &self.beliefs_dir {
            fields.push(("outputs.beliefs_dir", dir.as_str()));
        }
        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(invalid(label, "path must not be empty"));
            }
            if resolve_template(run_id, value).components().count() == 0 {
                return Err(invalid(label, "resolved path is invalid"));
            }
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    /// Level for the belief updater and agent targets; defaults to `tracing_level`.
    #[serde(default)]
    pub belief_level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
            belief_level: None,
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(text) = &self.belief_level {
            if parse_level(text).is_none() {
                return Err(invalid("logging.belief_level", "unknown tracing level"));
            }
        }
        Ok(())
    }

    pub fn level(&self) -> Option<Level> {
        parse_level(&self.tracing_level)
    }

    pub fn belief_level(&self) -> Option<Level> {
        self.belief_level.as_deref().and_then(parse_level)
    }
}

fn parse_level(text: &str) -> Option<Level> {
    match text.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(invalid("run_id", "run_id must not be empty"));
    }
    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(invalid(
            "run_id",
            "run_id may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }
    Ok(())
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub beliefs_dir: Option<PathBuf>,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
