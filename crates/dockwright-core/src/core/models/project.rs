use super::structure::StructureRole;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const COMPLEX_INPUT_FILE: &str = "complex_input.pdb";
pub const PROTOCOL_FILE: &str = "docking_full.xml";
pub const OPTIONS_FILE: &str = "docking.options.txt";
pub const SCORE_TABLE_FILE: &str = "docking.fasc";
pub const DOCKING_LOG_FILE: &str = "docking_full.log";
/// Suffix the docking engine appends to every output structure of a run.
pub const OUTPUT_SUFFIX: &str = "_full";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Invalid project identifier '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },
    #[error("Invalid structure role '{role}': {reason}")]
    InvalidRole { role: String, reason: &'static str },
    #[error("Failed to create project directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Maps project identifiers onto isolated directories under a workspace root.
///
/// Directories are created on first reference and never removed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn validate_id(project: &str) -> Result<(), ProjectError> {
        match path_component_problem(project) {
            Some(reason) => Err(ProjectError::InvalidId {
                id: project.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Role names become file and directory names, so they obey the same rules as ids.
    pub fn validate_role(role: &StructureRole) -> Result<(), ProjectError> {
        match path_component_problem(role.as_str()) {
            Some(reason) => Err(ProjectError::InvalidRole {
                role: role.as_str().to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    fn role_path(
        &self,
        project: &str,
        role: &StructureRole,
        name: String,
    ) -> Result<PathBuf, ProjectError> {
        Self::validate_role(role)?;
        Ok(self.project_dir(project)?.join(name))
    }

    /// Returns the project directory, creating it if needed.
    pub fn project_dir(&self, project: &str) -> Result<PathBuf, ProjectError> {
        Self::validate_id(project)?;
        let dir = self.root.join(project);
        ensure_dir(&dir)?;
        Ok(dir)
    }

    pub fn role_dir(&self, project: &str, role: &StructureRole) -> Result<PathBuf, ProjectError> {
        let dir = self.role_path(project, role, role.as_str().to_string())?;
        ensure_dir(&dir)?;
        Ok(dir)
    }

    pub fn prediction_dir(
        &self,
        project: &str,
        role: &StructureRole,
    ) -> Result<PathBuf, ProjectError> {
        let dir = self.role_path(project, role, format!("{}_prediction", role.as_str()))?;
        ensure_dir(&dir)?;
        Ok(dir)
    }

    pub fn cleaned_structure(
        &self,
        project: &str,
        role: &StructureRole,
    ) -> Result<PathBuf, ProjectError> {
        self.role_path(project, role, format!("{}_clean.pdb", role.as_str()))
    }

    pub fn complex_input(&self, project: &str) -> Result<PathBuf, ProjectError> {
        Ok(self.project_dir(project)?.join(COMPLEX_INPUT_FILE))
    }

    pub fn protocol_file(&self, project: &str) -> Result<PathBuf, ProjectError> {
        Ok(self.project_dir(project)?.join(PROTOCOL_FILE))
    }

    pub fn options_file(&self, project: &str) -> Result<PathBuf, ProjectError> {
        Ok(self.project_dir(project)?.join(OPTIONS_FILE))
    }

    pub fn score_table(&self, project: &str) -> Result<PathBuf, ProjectError> {
        Ok(self.project_dir(project)?.join(SCORE_TABLE_FILE))
    }

    pub fn docking_log(&self, project: &str) -> Result<PathBuf, ProjectError> {
        Ok(self.project_dir(project)?.join(DOCKING_LOG_FILE))
    }

    /// Glob pattern matching the structures a docking run writes for this project.
    pub fn structure_glob(&self, project: &str) -> Result<String, ProjectError> {
        Ok(structure_glob_in(&self.project_dir(project)?))
    }
}

fn path_component_problem(name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name refers to a relative directory")
    } else if name.contains(['/', '\\']) {
        Some("name contains a path separator")
    } else {
        None
    }
}

/// Glob pattern for docking output structures in `dir`.
pub fn structure_glob_in(dir: &Path) -> String {
    let stem = COMPLEX_INPUT_FILE.trim_end_matches(".pdb");
    dir.join(format!("{stem}{OUTPUT_SUFFIX}_*.pdb"))
        .to_string_lossy()
        .into_owned()
}

fn ensure_dir(dir: &Path) -> Result<(), ProjectError> {
    fs::create_dir_all(dir).map_err(|source| ProjectError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}
