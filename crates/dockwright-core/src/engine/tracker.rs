//! Turns a docking engine's unstructured output into a monotonic progress stream.
//!
//! Three signals estimate how many structures are finished, none of them reliable alone:
//!
//! - **Score-table rows.** Every few lines the score table is re-read and its data rows
//!   counted ([`count_score_rows`]). Partial writes make the table unreadable now and then;
//!   such reads count as zero.
//! - **Job-distributor lines.** The engine's job distributor mentions the job it is on
//!   ([`distributor_index`]).
//! - **Streamed score lines.** Each score row echoed to the output is one finished
//!   structure ([`parse_score_line`]).
//!
//! [`ProgressCounter`] combines them by taking the maximum and only reports changes.

use super::config::TrackingConfig;
use super::error::EngineError;
use super::job::{JobState, ProcessExit};
use super::progress::{EventSink, ProgressEvent, percent};
use super::scores::{
    DESCRIPTION_COLUMN, SCORE_PREFIX, ScoreTableParser, TOTAL_SCORE_COLUMN, select_best,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, instrument, warn};

const DISTRIBUTOR_MARKER: &str = "JobDistributor";

static DISTRIBUTOR_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [r"(?i)starting\s+(\d+)", r"(?i)(\d+)\s+of", r"(?i)job\s+(\d+)"]
        .map(|p| Regex::new(p).expect("distributor pattern is valid"))
});

fn is_score_data_line(line: &str) -> bool {
    line.starts_with(SCORE_PREFIX)
        && !line.contains(TOTAL_SCORE_COLUMN)
        && !line.contains(DESCRIPTION_COLUMN)
}

/// Counts completed rows in score-table text.
pub fn count_score_rows_in(content: &str) -> usize {
    content
        .lines()
        .filter(|l| is_score_data_line(l) && l.split_whitespace().count() >= 2)
        .count()
}

/// Re-reads the score table and counts its data rows; unreadable tables count as zero.
pub async fn count_score_rows(path: &Path) -> usize {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => count_score_rows_in(&content),
        Err(_) => 0,
    }
}

/// Extracts the job number from a job-distributor log line.
pub fn distributor_index(line: &str) -> Option<usize> {
    if !line.contains(DISTRIBUTOR_MARKER) {
        return None;
    }
    DISTRIBUTOR_PATTERNS
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A score row as echoed to the engine's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreLine {
    pub score: f64,
    pub desc: String,
}

pub fn parse_score_line(line: &str) -> Option<ScoreLine> {
    if !is_score_data_line(line) {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    let score = parts[1].parse().ok()?;
    let desc = if parts.len() > 2 {
        parts[parts.len() - 1].to_string()
    } else {
        "unknown".to_string()
    };
    Some(ScoreLine { score, desc })
}

/// Maximum-of-signals completion count that reports each new value once.
#[derive(Debug, Clone)]
pub struct ProgressCounter {
    total: usize,
    completed: usize,
    streamed_scores: usize,
    last_emitted: Option<usize>,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            streamed_scores: 0,
            last_emitted: None,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// The initial zero-progress event.
    pub fn start(&mut self) -> ProgressEvent {
        self.last_emitted = Some(self.completed);
        self.event()
    }

    pub fn observe_table_rows(&mut self, rows: usize) -> Option<ProgressEvent> {
        self.raise(rows)
    }

    pub fn observe_distributor(&mut self, index: usize) -> Option<ProgressEvent> {
        self.raise(index)
    }

    pub fn observe_score_line(&mut self) -> Option<ProgressEvent> {
        self.streamed_scores += 1;
        self.raise(self.streamed_scores)
    }

    fn raise(&mut self, candidate: usize) -> Option<ProgressEvent> {
        self.completed = self.completed.max(candidate);
        if self.last_emitted == Some(self.completed) {
            return None;
        }
        self.last_emitted = Some(self.completed);
        Some(self.event())
    }

    fn event(&self) -> ProgressEvent {
        ProgressEvent::Progress {
            current: self.completed,
            total: self.total,
            percent: percent(self.completed, self.total),
        }
    }
}

/// Outcome of consuming one job's output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub lines: usize,
    pub scores: usize,
    pub completed: usize,
    pub cancelled: bool,
}

/// Drives one job's output consumption and final result interpretation.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    recount_interval: usize,
    log_path: PathBuf,
    score_table: PathBuf,
    structure_glob: String,
}

impl ProgressTracker {
    pub fn new(
        total: usize,
        tracking: &TrackingConfig,
        log_path: PathBuf,
        score_table: PathBuf,
        structure_glob: String,
    ) -> Self {
        Self {
            total,
            recount_interval: tracking.recount_interval.max(1),
            log_path,
            score_table,
            structure_glob,
        }
    }

    /// Consumes `lines` until exhausted, logging each one and emitting events to `sink`.
    ///
    /// When `cancel` flips to `true`, `on_cancel` runs once and consumption stops without
    /// waiting for the stream to end, since descendants of a killed engine may keep its pipes
    /// open. Control is yielded to the runtime after every line.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written or the stream fails; events already
    /// sent stay sent.
    #[instrument(skip_all, name = "progress_tracker", fields(total = self.total))]
    pub async fn consume<S, F>(
        &self,
        mut lines: S,
        sink: &EventSink,
        cancel: &mut watch::Receiver<bool>,
        mut on_cancel: F,
    ) -> Result<StreamSummary, EngineError>
    where
        S: Stream<Item = io::Result<String>> + Unpin,
        F: FnMut(),
    {
        let mut log = BufWriter::new(File::create(&self.log_path).await?);
        let mut counter = ProgressCounter::new(self.total);
        let mut summary = StreamSummary {
            lines: 0,
            scores: 0,
            completed: 0,
            cancelled: false,
        };
        let mut watching = true;

        sink.send(ProgressEvent::Start {
            total: self.total,
            message: "Starting docking run...".to_string(),
        });
        sink.send(counter.start());

        if *cancel.borrow() {
            summary.cancelled = true;
            on_cancel();
        }

        while !summary.cancelled {
            let next = tokio::select! {
                line = lines.next() => line,
                changed = cancel.changed(), if watching => {
                    watching = changed.is_ok();
                    if *cancel.borrow() {
                        info!("Cancellation requested; terminating docking engine.");
                        summary.cancelled = true;
                        on_cancel();
                    }
                    continue;
                }
            };
            let Some(line) = next else { break };
            let line = line?;

            summary.lines += 1;
            log.write_all(line.as_bytes()).await?;
            log.write_all(b"\n").await?;
            log.flush().await?;

            if summary.lines % self.recount_interval == 0 {
                let rows = count_score_rows(&self.score_table).await;
                if let Some(event) = counter.observe_table_rows(rows) {
                    sink.send(event);
                }
            }

            if let Some(index) = distributor_index(&line) {
                if let Some(event) = counter.observe_distributor(index) {
                    sink.send(event);
                }
            }

            if let Some(ScoreLine { score, desc }) = parse_score_line(&line) {
                summary.scores += 1;
                if let Some(event) = counter.observe_score_line() {
                    sink.send(event);
                }
                sink.send(ProgressEvent::Score {
                    score,
                    desc,
                    line: line.trim().to_string(),
                });
            }

            tokio::task::yield_now().await;
        }

        summary.completed = counter.completed();
        debug!(
            lines = summary.lines,
            scores = summary.scores,
            completed = summary.completed,
            "Output stream exhausted."
        );
        Ok(summary)
    }

    /// Emits the terminal event for an exited process and returns the job's final state.
    pub fn finalize(&self, exit: ProcessExit, cancelled: bool, sink: &EventSink) -> JobState {
        if cancelled {
            sink.error("Docking run was cancelled");
            return JobState::Cancelled;
        }
        if !exit.success() {
            warn!(exit = %exit, "Docking engine exited unsuccessfully.");
            sink.error(format!(
                "Docking engine {exit}; see {}",
                self.log_path.display()
            ));
            return JobState::Failed;
        }
        if !self.score_table.exists() {
            sink.error("Docking failed - no results file generated");
            return JobState::Failed;
        }

        let records = match ScoreTableParser::parse_all(&self.score_table, &self.structure_glob) {
            Ok(records) => records,
            Err(e) => {
                sink.error(format!("Failed to parse results: {e}"));
                return JobState::Failed;
            }
        };
        let Some(best) = select_best(&records).cloned() else {
            sink.error("Failed to parse results: no records");
            return JobState::Failed;
        };

        info!(
            best_score = best.score,
            best_model = %best.desc,
            models = records.len(),
            "Docking run complete."
        );
        sink.send(ProgressEvent::Complete {
            best_score: best.score,
            best_model: best.desc,
            pdb_path: best.pdb_path,
            index: best.index,
            all_models: records,
        });
        JobState::Completed
    }
}
