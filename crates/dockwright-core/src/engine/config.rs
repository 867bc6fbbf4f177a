use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_SURFACE_GAP: f64 = 2.0;
pub const DEFAULT_RECOUNT_INTERVAL: usize = 3;
pub const DEFAULT_REPLICAS: usize = 10;
pub const DEFAULT_REPOSITORY_URL: &str = "https://files.rcsb.org/download";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// An external program plus the arguments that precede the per-call arguments.
///
/// Interpreted tools are expressed as e.g. `python3` with the script as a leading
/// argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn display_name(&self) -> String {
        self.program.display().to_string()
    }

    pub(crate) fn command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.leading_args);
        command
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// Number of consumed output lines between score-table recounts.
    pub recount_interval: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            recount_interval: DEFAULT_RECOUNT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DockingConfig {
    pub engine: ExternalCommand,
    pub protocol_template: PathBuf,
    pub options_template: PathBuf,
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    /// Target minimum separation between receptor and binder, in Angstroms.
    pub gap: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            gap: DEFAULT_SURFACE_GAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleaningConfig {
    pub command: ExternalCommand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionConfig {
    pub command: ExternalCommand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryConfig {
    pub base_url: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REPOSITORY_URL.to_string(),
        }
    }
}

#[derive(Default)]
pub struct DockingConfigBuilder {
    engine: Option<ExternalCommand>,
    protocol_template: Option<PathBuf>,
    options_template: Option<PathBuf>,
    recount_interval: Option<usize>,
}

impl DockingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(mut self, engine: ExternalCommand) -> Self {
        self.engine = Some(engine);
        self
    }
    pub fn protocol_template(mut self, path: PathBuf) -> Self {
        self.protocol_template = Some(path);
        self
    }
    pub fn options_template(mut self, path: PathBuf) -> Self {
        self.options_template = Some(path);
        self
    }
    pub fn recount_interval(mut self, lines: usize) -> Self {
        self.recount_interval = Some(lines);
        self
    }

    pub fn build(self) -> Result<DockingConfig, ConfigError> {
        let recount_interval = self.recount_interval.unwrap_or(DEFAULT_RECOUNT_INTERVAL);
        if recount_interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "recount_interval",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(DockingConfig {
            engine: self.engine.ok_or(ConfigError::MissingParameter("engine"))?,
            protocol_template: self
                .protocol_template
                .ok_or(ConfigError::MissingParameter("protocol_template"))?,
            options_template: self
                .options_template
                .ok_or(ConfigError::MissingParameter("options_template"))?,
            tracking: TrackingConfig { recount_interval },
        })
    }
}
