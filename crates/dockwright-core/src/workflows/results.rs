use crate::core::models::project::ProjectLayout;
use crate::engine::error::EngineError;
use crate::engine::scores::{ScoreRecord, ScoreTableParser, improves_on, select_best};
use crate::engine::tracker::{ScoreLine, parse_score_line};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResults {
    pub all: Vec<ScoreRecord>,
    pub best: ScoreRecord,
}

/// Reads a finished project's score table.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if the project has no score table yet.
#[instrument(skip_all, name = "project_results", fields(project = %project))]
pub fn project_results(layout: &ProjectLayout, project: &str) -> Result<ProjectResults, EngineError> {
    let table = layout.score_table(project)?;
    let glob = layout.structure_glob(project)?;
    let all = ScoreTableParser::parse_all(&table, &glob)?;
    let best = select_best(&all)
        .cloned()
        .ok_or_else(|| EngineError::Internal("score table yielded no records".to_string()))?;
    debug!(records = all.len(), best = %best.desc, "Results loaded.");
    Ok(ProjectResults { all, best })
}

/// Lowest-scoring structure named in a run log, with its file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedBest {
    pub score: f64,
    pub desc: String,
    pub pdb_path: PathBuf,
}

/// Finds the best model recorded in `log_path` and resolves `<desc>.pdb` in `search_dirs`,
/// checked in order.
pub fn best_from_log(log_path: &Path, search_dirs: &[PathBuf]) -> Result<LoggedBest, EngineError> {
    if !log_path.is_file() {
        return Err(EngineError::not_found("Run log", log_path));
    }
    let content = std::fs::read_to_string(log_path)?;

    let best = content
        .lines()
        .filter_map(parse_score_line)
        .fold(None::<ScoreLine>, |best, line| match best {
            Some(current) if !improves_on(line.score, current.score) => Some(current),
            _ => Some(line),
        })
        .ok_or_else(|| EngineError::Parse {
            path: log_path.to_path_buf(),
            reason: "no score lines".to_string(),
        })?;

    let file_name = format!("{}.pdb", best.desc);
    let pdb_path = search_dirs
        .iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            let first = search_dirs
                .first()
                .map(|dir| dir.join(&file_name))
                .unwrap_or_else(|| PathBuf::from(&file_name));
            EngineError::not_found("Best structure", first)
        })?;

    Ok(LoggedBest {
        score: best.score,
        desc: best.desc,
        pdb_path,
    })
}
