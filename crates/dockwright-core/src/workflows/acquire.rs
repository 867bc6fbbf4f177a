use crate::core::models::structure::{StructureFile, StructureRole};
use crate::engine::config::{ConfigError, PredictionConfig, RepositoryConfig};
use crate::engine::error::EngineError;
use crate::engine::job::ProcessExit;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info, instrument};

pub const PREDICTION_LOG_FILE: &str = "prediction.log";

/// Normalizes an accession code: trimmed and lower-cased.
pub fn normalize_accession(code: &str) -> String {
    code.trim().to_lowercase()
}

pub fn download_url(base_url: &str, accession: &str) -> String {
    format!(
        "{}/{}.pdb",
        base_url.trim_end_matches('/'),
        normalize_accession(accession)
    )
}

/// Picks the prediction's best model: the first ranked file in name order, else the
/// first structure file.
pub fn pick_predicted_model(mut candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.sort();
    let ranked = candidates.iter().find(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase().contains("rank"))
            .unwrap_or(false)
    });
    ranked.cloned().or_else(|| candidates.into_iter().next())
}

/// Writes `>name` followed by the trimmed sequence to `<dir>/<name>.fasta`.
pub async fn write_fasta(sequence: &str, dir: &Path, name: &str) -> Result<PathBuf, EngineError> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{name}.fasta"));
    fs::write(&path, format!(">{name}\n{}\n", sequence.trim())).await?;
    Ok(path)
}

/// Obtains input structures from a remote repository, local files, or structure prediction.
///
/// Every external call is attempted once; retrying is up to the caller.
pub struct StructureAcquirer {
    client: reqwest::Client,
    repository: RepositoryConfig,
    prediction: Option<PredictionConfig>,
}

impl StructureAcquirer {
    pub fn new(repository: RepositoryConfig, prediction: Option<PredictionConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            repository,
            prediction,
        }
    }

    /// Downloads `<accession>.pdb` from the repository into `dir`.
    #[instrument(skip_all, name = "fetch_structure", fields(accession = %accession))]
    pub async fn fetch(&self, accession: &str, dir: &Path) -> Result<PathBuf, EngineError> {
        let code = normalize_accession(accession);
        let url = download_url(&self.repository.base_url, &code);
        info!(url = %url, "Downloading structure.");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let content = response.bytes().await?;

        fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{code}.pdb"));
        fs::write(&path, &content).await?;
        debug!(path = %path.display(), bytes = content.len(), "Structure saved.");
        Ok(path)
    }

    /// Copies an existing structure file into `dir`, keeping its file name.
    pub async fn copy_local(&self, source: &Path, dir: &Path) -> Result<PathBuf, EngineError> {
        if !source.is_file() {
            return Err(EngineError::not_found("Structure file", source));
        }
        let name = source
            .file_name()
            .ok_or_else(|| EngineError::not_found("Structure file name", source))?;
        fs::create_dir_all(dir).await?;
        let dest = dir.join(name);
        fs::copy(source, &dest).await?;
        info!(dest = %dest.display(), "Structure copied.");
        Ok(dest)
    }

    /// Runs the structure-prediction engine on `sequence` and returns its best model.
    ///
    /// The engine is called as `<command> <fasta> <dir>`; its combined output is captured
    /// in `<dir>/prediction.log`.
    #[instrument(skip_all, name = "predict_structure", fields(role = %role))]
    pub async fn predict(
        &self,
        sequence: &str,
        role: &StructureRole,
        dir: &Path,
    ) -> Result<StructureFile, EngineError> {
        let prediction = self
            .prediction
            .as_ref()
            .ok_or(ConfigError::MissingParameter(
                "prediction.command",
            ))?;
        let fasta = write_fasta(sequence, dir, role.as_str()).await?;
        let program = prediction.command.display_name();
        let log_path = dir.join(PREDICTION_LOG_FILE);
        let mut log = BufWriter::new(fs::File::create(&log_path).await?);
        log.write_all(
            format!(
                "=== Structure Prediction ===\nInput FASTA: {}\nOutput Dir: {}\nCommand: {}\n{}\n\n",
                fasta.display(),
                dir.display(),
                program,
                "=".repeat(40)
            )
            .as_bytes(),
        )
        .await?;

        info!(fasta = %fasta.display(), "Running structure prediction.");
        let mut child = prediction
            .command
            .command()
            .arg(&fasta)
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::process(&program, format!("failed to spawn: {e}")))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(EngineError::Internal(
                "prediction output was not captured".to_string(),
            ));
        };
        let mut lines = LinesStream::new(BufReader::new(stdout).lines())
            .merge(LinesStream::new(BufReader::new(stderr).lines()));
        while let Some(line) = lines.next().await {
            let line = line?;
            debug!(target: "prediction", "{line}");
            log.write_all(line.as_bytes()).await?;
            log.write_all(b"\n").await?;
            log.flush().await?;
        }

        let exit = ProcessExit::from(child.wait().await?);
        if !exit.success() {
            log.write_all(format!("\n\nERROR: prediction {exit}\n").as_bytes())
                .await?;
            log.flush().await?;
            return Err(EngineError::process(
                &program,
                format!("{exit}; see {}", log_path.display()),
            ));
        }
        log.write_all(b"\n\n=== Prediction Completed Successfully ===\n")
            .await?;
        log.flush().await?;

        let mut candidates = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "pdb") {
                candidates.push(path);
            }
        }
        let model = pick_predicted_model(candidates)
            .ok_or_else(|| EngineError::not_found("Predicted structure", dir))?;
        info!(model = %model.display(), "Prediction complete.");
        Ok(StructureFile::new(role.clone(), model))
    }
}
