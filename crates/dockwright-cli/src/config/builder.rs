use super::defaults::{DefaultsConfig, TEMPLATES_DIR};
use super::file::{FileCommandConfig, FileConfig};
use super::models::AppConfig;
use crate::error::{CliError, Result};
use crate::utils::parser;
use directories::ProjectDirs;
use dockwright::engine::config as core_config;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Inputs that decide the configuration, gathered from the command line and environment.
#[derive(Debug, Default, Clone)]
pub struct ConfigSources<'a> {
    pub config_file: Option<&'a Path>,
    pub set_values: &'a [String],
    pub workdir_env: Option<PathBuf>,
}

/// Resolves the configuration.
///
/// Precedence, highest first: `--set`, the config file, the environment (workspace root
/// only), built-in defaults. Relative paths in the file are resolved against its directory.
pub fn build_config(sources: &ConfigSources<'_>) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = match sources.config_file {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let base_dir = sources
        .config_file
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut file_config = apply_set_values(file_config, sources.set_values)?;

    let workspace_root = match file_config.workspace.take().and_then(|w| w.root) {
        Some(root) => resolve_relative(&base_dir, root),
        None => match &sources.workdir_env {
            Some(root) => root.clone(),
            None => default_workspace_root()?,
        },
    };

    let docking_file = file_config.docking.take().unwrap_or_default();
    let templates = workspace_root.join(TEMPLATES_DIR);
    let protocol_template = docking_file
        .protocol_template
        .map(|p| resolve_relative(&base_dir, p))
        .unwrap_or_else(|| templates.join(&defaults.protocol_template));
    let options_template = docking_file
        .options_template
        .map(|p| resolve_relative(&base_dir, p))
        .unwrap_or_else(|| templates.join(&defaults.options_template));

    let replicas = docking_file.replicas.unwrap_or(defaults.replicas);
    if replicas == 0 {
        return Err(CliError::Config(
            "`docking.replicas` must be at least 1".to_string(),
        ));
    }

    let engine = core_config::ExternalCommand::new(
        docking_file
            .engine
            .unwrap_or_else(|| defaults.docking_engine.clone()),
    )
    .with_args(docking_file.engine_args.unwrap_or_default());

    let recount_interval = file_config
        .tracking
        .take()
        .and_then(|t| t.recount_interval)
        .unwrap_or(defaults.recount_interval);

    let docking = core_config::DockingConfigBuilder::new()
        .engine(engine)
        .protocol_template(protocol_template)
        .options_template(options_template)
        .recount_interval(recount_interval)
        .build()?;

    let gap = file_config
        .merge
        .take()
        .and_then(|m| m.gap)
        .unwrap_or(defaults.gap);
    if !gap.is_finite() || gap < 0.0 {
        return Err(CliError::Config(format!(
            "`merge.gap` must be a non-negative distance, got {gap}"
        )));
    }

    let cleaning = core_config::CleaningConfig {
        command: external_command(
            file_config.cleaning.take(),
            &defaults.cleaning_program,
            &defaults.cleaning_args,
        ),
    };
    let prediction = core_config::PredictionConfig {
        command: external_command(
            file_config.prediction.take(),
            &defaults.prediction_program,
            &[],
        ),
    };
    let repository = core_config::RepositoryConfig {
        base_url: file_config
            .repository
            .take()
            .and_then(|r| r.base_url)
            .unwrap_or(defaults.repository_url),
    };

    Ok(AppConfig {
        workspace_root,
        replicas,
        docking,
        merge: core_config::MergeConfig { gap },
        cleaning,
        prediction,
        repository,
    })
}

fn external_command(
    file_val: Option<FileCommandConfig>,
    default_program: &str,
    default_args: &[String],
) -> core_config::ExternalCommand {
    let file_val = file_val.unwrap_or_default();
    match file_val.program {
        Some(program) => {
            core_config::ExternalCommand::new(program).with_args(file_val.args.unwrap_or_default())
        }
        None => core_config::ExternalCommand::new(default_program).with_args(
            file_val
                .args
                .unwrap_or_else(|| default_args.to_vec()),
        ),
    }
}

fn resolve_relative(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn default_workspace_root() -> Result<PathBuf> {
    ProjectDirs::from("edu", "caltech", "dockwright")
        .map(|dirs| dirs.data_dir().join("projects"))
        .ok_or_else(|| {
            CliError::Config("Could not determine default workspace directory path.".to_string())
        })
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {kind} value for {key}: {value}")))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value) =
            parser::parse_key_value(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;

        match key {
            "workspace.root" => {
                config.workspace.get_or_insert_with(Default::default).root =
                    Some(PathBuf::from(value));
            }
            "docking.engine" => {
                config.docking.get_or_insert_with(Default::default).engine =
                    Some(value.to_string());
            }
            "docking.protocol-template" => {
                config
                    .docking
                    .get_or_insert_with(Default::default)
                    .protocol_template = Some(PathBuf::from(value));
            }
            "docking.options-template" => {
                config
                    .docking
                    .get_or_insert_with(Default::default)
                    .options_template = Some(PathBuf::from(value));
            }
            "docking.replicas" => {
                config.docking.get_or_insert_with(Default::default).replicas =
                    Some(parse_value(key, value, "integer")?);
            }
            "tracking.recount-interval" => {
                config
                    .tracking
                    .get_or_insert_with(Default::default)
                    .recount_interval = Some(parse_value(key, value, "integer")?);
            }
            "merge.gap" => {
                config.merge.get_or_insert_with(Default::default).gap =
                    Some(parse_value(key, value, "float")?);
            }
            "cleaning.program" => {
                config.cleaning.get_or_insert_with(Default::default).program =
                    Some(value.to_string());
            }
            "prediction.program" => {
                config.prediction.get_or_insert_with(Default::default).program =
                    Some(value.to_string());
            }
            "repository.base-url" => {
                config
                    .repository
                    .get_or_insert_with(Default::default)
                    .base_url = Some(value.to_string());
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
