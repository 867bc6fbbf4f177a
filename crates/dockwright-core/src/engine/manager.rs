use super::config::DockingConfig;
use super::error::EngineError;
use super::job::{DockingJob, JobHandle, JobState, ProcessExit};
use super::progress::EventSink;
use super::registry::{CancelOutcome, JobKey, JobRegistry};
use super::tracker::ProgressTracker;
use crate::core::models::project::{
    DOCKING_LOG_FILE, OPTIONS_FILE, OUTPUT_SUFFIX, PROTOCOL_FILE, ProjectLayout,
    SCORE_TABLE_FILE, structure_glob_in,
};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{error, info, instrument, warn};

const STRUCTURE_INPUT_DIRECTIVE: &str = "-s";
const SCORE_OUTPUT_DIRECTIVE: &str = "-out:file:scorefile";
const REPLICA_DIRECTIVE: &str = "-nstruct";

fn is_directive(line: &str, directive: &str) -> bool {
    let line = line.trim_start();
    line == directive
        || line
            .strip_prefix(directive)
            .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Points an options template at this run's inputs and outputs.
///
/// The structure-input and score-output directives are replaced (or appended when the
/// template lacks them), any replica count in the template is dropped, and the run's
/// replica count is appended last.
pub fn rewrite_options(template: &str, complex: &Path, score_table: &Path, replicas: usize) -> String {
    let mut has_input = false;
    let mut has_scorefile = false;
    let mut lines: Vec<String> = Vec::new();

    for line in template.lines() {
        if is_directive(line, STRUCTURE_INPUT_DIRECTIVE) {
            has_input = true;
            lines.push(format!("{STRUCTURE_INPUT_DIRECTIVE} {}", complex.display()));
        } else if is_directive(line, SCORE_OUTPUT_DIRECTIVE) {
            has_scorefile = true;
            lines.push(format!("{SCORE_OUTPUT_DIRECTIVE} {}", score_table.display()));
        } else if is_directive(line, REPLICA_DIRECTIVE) {
            continue;
        } else {
            lines.push(line.to_string());
        }
    }

    if !has_input {
        lines.push(format!("{STRUCTURE_INPUT_DIRECTIVE} {}", complex.display()));
    }
    if !has_scorefile {
        lines.push(format!("{SCORE_OUTPUT_DIRECTIVE} {}", score_table.display()));
    }
    lines.push(format!("{REPLICA_DIRECTIVE} {replicas}"));

    let mut options = lines.join("\n");
    options.push('\n');
    options
}

/// Launches docking runs and supervises them until they finish.
///
/// The manager itself is cheap to share behind a reference; all per-job state lives in
/// the spawned supervising task and the injected [`JobRegistry`].
#[derive(Debug, Clone)]
pub struct DockingJobManager {
    config: DockingConfig,
    layout: ProjectLayout,
    registry: JobRegistry,
}

impl DockingJobManager {
    pub fn new(config: DockingConfig, layout: ProjectLayout, registry: JobRegistry) -> Self {
        Self {
            config,
            layout,
            registry,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Prepares the project's run files, spawns the docking engine, and starts supervising it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] before anything is spawned when `complex` or a
    /// template is missing, and [`EngineError::Process`] when the engine cannot be spawned.
    #[instrument(skip_all, name = "docking_submit", fields(project = %project, replicas = replicas))]
    pub async fn submit(
        &self,
        project: &str,
        complex: &Path,
        replicas: usize,
    ) -> Result<JobHandle, EngineError> {
        if !complex.is_file() {
            return Err(EngineError::NotFound {
                what: "Merged complex",
                path: complex.to_path_buf(),
                hint: Some("Run the merge step first"),
            });
        }
        let complex = tokio::fs::canonicalize(complex).await?;
        let project_dir = tokio::fs::canonicalize(self.layout.project_dir(project)?).await?;

        let protocol = project_dir.join(PROTOCOL_FILE);
        let options = project_dir.join(OPTIONS_FILE);
        let score_table = project_dir.join(SCORE_TABLE_FILE);
        let log_path = project_dir.join(DOCKING_LOG_FILE);

        self.install_templates(&complex, &protocol, &options, &score_table, replicas)
            .await?;
        if score_table.exists() {
            tokio::fs::remove_file(&score_table).await?;
        }

        let mut job = DockingJob::new(project, replicas, log_path.clone(), score_table.clone());

        let mut command = self.config.engine.command();
        command
            .arg(format!("@{}", options.display()))
            .arg("-parser:protocol")
            .arg(&protocol)
            .arg("-out:suffix")
            .arg(OUTPUT_SUFFIX)
            .arg("-overwrite")
            .current_dir(&project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            EngineError::process(
                self.config.engine.display_name(),
                format!("failed to spawn: {e}"),
            )
        })?;
        job.transition(JobState::Running)?;
        info!(pid = child.id(), "Docking engine started.");

        let (key, cancel) = self.registry.register(project);
        let (sink, events) = EventSink::channel();
        let tracker = ProgressTracker::new(
            replicas,
            &self.config.tracking,
            log_path,
            score_table,
            structure_glob_in(&project_dir),
        );
        let task = tokio::spawn(supervise(
            child,
            job.clone(),
            tracker,
            sink,
            cancel,
            self.registry.clone(),
            key,
        ));

        Ok(JobHandle::new(&job, key, events, task))
    }

    /// Requests termination of the project's job. Never fails.
    pub fn cancel(&self, project: &str) -> CancelOutcome {
        let outcome = self.registry.cancel(project);
        info!(project, outcome = outcome.as_str(), "Docking cancellation requested.");
        outcome
    }

    async fn install_templates(
        &self,
        complex: &Path,
        protocol: &Path,
        options: &Path,
        score_table: &Path,
        replicas: usize,
    ) -> Result<(), EngineError> {
        if !self.config.protocol_template.is_file() {
            return Err(EngineError::not_found(
                "Protocol template",
                &self.config.protocol_template,
            ));
        }
        if !self.config.options_template.is_file() {
            return Err(EngineError::not_found(
                "Options template",
                &self.config.options_template,
            ));
        }
        tokio::fs::copy(&self.config.protocol_template, protocol).await?;
        let template = tokio::fs::read_to_string(&self.config.options_template).await?;
        tokio::fs::write(
            options,
            rewrite_options(&template, complex, score_table, replicas),
        )
        .await?;
        Ok(())
    }
}

fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to signal docking engine.");
    }
}

async fn wait_for_exit(child: &mut Child) -> ProcessExit {
    match child.wait().await {
        Ok(status) => status.into(),
        Err(e) => {
            warn!(error = %e, "Failed to collect docking engine exit status.");
            ProcessExit::from_code(None)
        }
    }
}

async fn supervise(
    mut child: Child,
    mut job: DockingJob,
    tracker: ProgressTracker,
    sink: EventSink,
    mut cancel: watch::Receiver<bool>,
    registry: JobRegistry,
    key: JobKey,
) -> JobState {
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        sink.error("Docking engine output was not captured");
        terminate(&mut child);
        registry.release(key);
        return finish(&mut job, JobState::Failed);
    };

    let lines = LinesStream::new(BufReader::new(stdout).lines())
        .merge(LinesStream::new(BufReader::new(stderr).lines()));
    let consumed = tracker
        .consume(lines, &sink, &mut cancel, || terminate(&mut child))
        .await;

    let state = match consumed {
        Ok(summary) => {
            let exit = wait_for_exit(&mut child).await;
            info!(project = %job.project, exit = %exit, "Docking engine finished.");
            tracker.finalize(exit, summary.cancelled, &sink)
        }
        Err(e) => {
            error!(project = %job.project, error = %e, "Docking output stream failed.");
            sink.error(e.to_string());
            terminate(&mut child);
            wait_for_exit(&mut child).await;
            JobState::Failed
        }
    };

    registry.release(key);
    finish(&mut job, state)
}

fn finish(job: &mut DockingJob, state: JobState) -> JobState {
    if let Err(e) = job.transition(state) {
        warn!(error = %e, "Ignoring invalid job state transition.");
    }
    info!(project = %job.project, state = %state, "Docking job finished.");
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{DockingConfigBuilder, ExternalCommand};
    use crate::engine::progress::ProgressEvent;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    const OPTIONS_TEMPLATE: &str =
        "-in:file:fullatom\n-s placeholder.pdb\n-out:file:scorefile old.fasc\n-nstruct 50\n";

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        templates: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let root = dir.path().join("projects");
        let templates = dir.path().join("templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("docking_full.xml"), "<ROSETTASCRIPTS/>\n").unwrap();
        fs::write(templates.join("docking.options.txt"), OPTIONS_TEMPLATE).unwrap();
        Fixture {
            root,
            templates,
            _dir: dir,
        }
    }

    fn manager(fx: &Fixture, engine: ExternalCommand) -> DockingJobManager {
        let config = DockingConfigBuilder::new()
            .engine(engine)
            .protocol_template(fx.templates.join("docking_full.xml"))
            .options_template(fx.templates.join("docking.options.txt"))
            .build()
            .unwrap();
        DockingJobManager::new(config, ProjectLayout::new(&fx.root), JobRegistry::new())
    }

    fn write_complex(manager: &DockingJobManager, project: &str) -> PathBuf {
        let path = manager.layout().complex_input(project).unwrap();
        fs::write(&path, "END\n").unwrap();
        path
    }

    #[test]
    fn rewrite_options_replaces_directives_and_appends_replicas() {
        let rewritten = rewrite_options(
            OPTIONS_TEMPLATE,
            Path::new("/w/p/complex_input.pdb"),
            Path::new("/w/p/docking.fasc"),
            7,
        );
        assert_eq!(
            rewritten,
            "-in:file:fullatom\n-s /w/p/complex_input.pdb\n-out:file:scorefile /w/p/docking.fasc\n-nstruct 7\n"
        );
    }

    #[test]
    fn rewrite_options_appends_missing_directives() {
        let rewritten = rewrite_options(
            "-ex1\n-score:weights ref2015\n",
            Path::new("c.pdb"),
            Path::new("s.fasc"),
            3,
        );
        assert_eq!(
            rewritten,
            "-ex1\n-score:weights ref2015\n-s c.pdb\n-out:file:scorefile s.fasc\n-nstruct 3\n"
        );
    }

    #[test]
    fn directive_match_requires_whole_flag() {
        assert!(is_directive("  -s in.pdb", "-s"));
        assert!(!is_directive("-score:weights ref2015", "-s"));
        assert!(!is_directive("-nstructures 5", "-nstruct"));
    }

    #[tokio::test]
    async fn submit_without_complex_fails_before_spawning() {
        let fx = fixture();
        let manager = manager(&fx, ExternalCommand::new("/nonexistent/docking-engine"));
        let complex = fx.root.join("p").join("complex_input.pdb");

        let result = manager.submit("p", &complex, 5).await;
        match result {
            Err(EngineError::NotFound { path, hint, .. }) => {
                assert_eq!(path, complex);
                assert!(hint.is_some());
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(!manager.registry().is_active("p"));
        assert!(!fx.root.join("p").join("docking.options.txt").exists());
    }

    #[tokio::test]
    async fn submit_reports_spawn_failure_as_process_error() {
        let fx = fixture();
        let manager = manager(&fx, ExternalCommand::new("/nonexistent/docking-engine"));
        let complex = write_complex(&manager, "p");

        let result = manager.submit("p", &complex, 5).await;
        assert!(matches!(result, Err(EngineError::Process { .. })));
        assert!(!manager.registry().is_active("p"));
    }

    #[tokio::test]
    async fn cancel_unknown_project_is_idempotent() {
        let fx = fixture();
        let manager = manager(&fx, ExternalCommand::new("true"));
        assert_eq!(manager.cancel("ghost"), CancelOutcome::NotFound);
        assert_eq!(manager.cancel("ghost"), CancelOutcome::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn submit_runs_engine_and_completes_with_best_model() {
        let fx = fixture();
        let script = fx.templates.join("fake_engine.sh");
        fs::write(
            &script,
            r#"echo "$@" > engine_args.txt
echo "protocols.jd2.JobDistributor: starting 1 of 2"
echo "SCORE: total_score description"
echo "SCORE: -10.0 complex_input_full_0001"
echo "core.io: noise" >&2
echo "protocols.jd2.JobDistributor: starting 2 of 2"
echo "SCORE: -25.0 complex_input_full_0002"
printf 'SCORE: total_score description\nSCORE: -10.0 complex_input_full_0001\nSCORE: -25.0 complex_input_full_0002\n' > docking.fasc
echo END > complex_input_full_0002.pdb
"#,
        )
        .unwrap();
        let manager = manager(&fx, ExternalCommand::new("sh").with_args([script.to_string_lossy()]));
        let complex = write_complex(&manager, "p");

        let handle = manager.submit("p", &complex, 2).await.unwrap();
        assert!(manager.registry().is_active("p"));
        let log_path = handle.log_path.clone();
        let (events, state) = handle.collect().await.unwrap();

        assert_eq!(state, JobState::Completed);
        assert!(!manager.registry().is_active("p"));

        let scores: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Score { score, .. } => Some(*score),
                _ => None,
            })
            .collect();
        assert_eq!(scores, vec![-10.0, -25.0]);

        match events.last() {
            Some(ProgressEvent::Complete {
                best_score,
                best_model,
                pdb_path,
                ..
            }) => {
                assert_eq!(*best_score, -25.0);
                assert_eq!(best_model, "complex_input_full_0002");
                assert!(pdb_path.as_ref().is_some_and(|p| p.ends_with("complex_input_full_0002.pdb")));
            }
            other => panic!("expected completion, got {other:?}"),
        }

        let project_dir = fx.root.join("p");
        let options = fs::read_to_string(project_dir.join("docking.options.txt")).unwrap();
        assert!(options.ends_with("-nstruct 2\n"));
        assert!(options.contains("complex_input.pdb"));
        let args = fs::read_to_string(project_dir.join("engine_args.txt")).unwrap();
        assert!(args.contains("-parser:protocol"));
        assert!(args.contains("-out:suffix _full -overwrite"));
        assert!(project_dir.join("docking_full.xml").exists());
        assert_eq!(fs::read_to_string(log_path).unwrap().lines().count(), 6);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_fails_even_with_partial_output() {
        let fx = fixture();
        let script = fx.templates.join("failing_engine.sh");
        fs::write(&script, "echo 'ERROR: bad option'\nexit 3\n").unwrap();
        let manager = manager(&fx, ExternalCommand::new("sh").with_args([script.to_string_lossy()]));
        let complex = write_complex(&manager, "p");

        let (events, state) = manager
            .submit("p", &complex, 1)
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(state, JobState::Failed);
        assert!(matches!(events.last(), Some(ProgressEvent::Error { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_terminates_running_engine() {
        let fx = fixture();
        let script = fx.templates.join("slow_engine.sh");
        fs::write(
            &script,
            "echo 'protocols.jd2.JobDistributor: starting 1 of 5'\nexec sleep 30\n",
        )
        .unwrap();
        let manager = manager(&fx, ExternalCommand::new("sh").with_args([script.to_string_lossy()]));
        let complex = write_complex(&manager, "p");

        let mut handle = manager.submit("p", &complex, 5).await.unwrap();
        loop {
            match handle.next_event().await {
                Some(ProgressEvent::Progress { current: 1, .. }) => break,
                Some(_) => continue,
                None => panic!("stream ended before the engine reported progress"),
            }
        }

        assert_eq!(manager.cancel("p"), CancelOutcome::Cancelled);
        assert_eq!(manager.cancel("p"), CancelOutcome::NotFound);

        let (events, state) = tokio::time::timeout(std::time::Duration::from_secs(10), handle.collect())
            .await
            .expect("cancelled job should finish promptly")
            .unwrap();
        assert_eq!(state, JobState::Cancelled);
        assert!(matches!(events.last(), Some(ProgressEvent::Error { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_finishes_while_wrapped_engine_holds_output_open() {
        let fx = fixture();
        let script = fx.templates.join("wrapped_engine.sh");
        // The sleep outlives its killed parent shell and keeps stdout open.
        fs::write(
            &script,
            "echo 'protocols.jd2.JobDistributor: starting 1 of 5'\nsleep 8\necho done\n",
        )
        .unwrap();
        let manager = manager(&fx, ExternalCommand::new("sh").with_args([script.to_string_lossy()]));
        let complex = write_complex(&manager, "p");

        let mut handle = manager.submit("p", &complex, 5).await.unwrap();
        while !matches!(
            handle.next_event().await,
            Some(ProgressEvent::Progress { current: 1, .. }) | None
        ) {}

        assert_eq!(manager.cancel("p"), CancelOutcome::Cancelled);
        let (_, state) = tokio::time::timeout(std::time::Duration::from_secs(3), handle.collect())
            .await
            .expect("cancelled job should not wait for the engine's children")
            .unwrap();
        assert_eq!(state, JobState::Cancelled);
        assert!(!manager.registry().is_active("p"));
    }
}
