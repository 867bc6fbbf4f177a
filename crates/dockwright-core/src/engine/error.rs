use std::path::PathBuf;
use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::pdb::PdbError;
use crate::core::models::project::ProjectError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{what} not found at {}{}", .path.display(), .hint.map(|h| format!(". {h}")).unwrap_or_default())]
    NotFound {
        what: &'static str,
        path: PathBuf,
        hint: Option<&'static str>,
    },

    #[error("Failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("External program '{program}' failed: {reason}")]
    Process { program: String, reason: String },

    #[error("Degenerate geometry: {0}")]
    Geometry(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid structure file: {0}")]
    Structure(#[from] PdbError),

    #[error("Remote repository request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        EngineError::NotFound {
            what,
            path: path.into(),
            hint: None,
        }
    }

    pub(crate) fn process(program: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Process {
            program: program.into(),
            reason: reason.into(),
        }
    }
}
