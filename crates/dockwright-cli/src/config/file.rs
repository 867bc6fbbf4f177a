use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileWorkspaceConfig {
    pub root: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileDockingConfig {
    pub engine: Option<String>,
    pub engine_args: Option<Vec<String>>,
    pub protocol_template: Option<PathBuf>,
    pub options_template: Option<PathBuf>,
    pub replicas: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileTrackingConfig {
    pub recount_interval: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMergeConfig {
    pub gap: Option<f64>,
}

/// An external tool: the program plus arguments placed before the per-call ones.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCommandConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRepositoryConfig {
    pub base_url: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub workspace: Option<FileWorkspaceConfig>,
    pub docking: Option<FileDockingConfig>,
    pub tracking: Option<FileTrackingConfig>,
    pub merge: Option<FileMergeConfig>,
    pub cleaning: Option<FileCommandConfig>,
    pub prediction: Option<FileCommandConfig>,
    pub repository: Option<FileRepositoryConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parses TOML `content`; `origin` only labels errors.
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| CliError::FileParsing {
            path: origin.to_path_buf(),
            source: e.into(),
        })
    }
}
