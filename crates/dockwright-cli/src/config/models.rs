use dockwright::core::models::project::ProjectLayout;
use dockwright::engine::config as core_config;
use std::path::PathBuf;

/// Fully resolved settings for one CLI invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub workspace_root: PathBuf,
    pub replicas: usize,
    pub docking: core_config::DockingConfig,
    pub merge: core_config::MergeConfig,
    pub cleaning: core_config::CleaningConfig,
    pub prediction: core_config::PredictionConfig,
    pub repository: core_config::RepositoryConfig,
}

impl AppConfig {
    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.workspace_root)
    }
}
