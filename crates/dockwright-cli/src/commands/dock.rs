use crate::cli::DockArgs;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::ui::DockProgressDisplay;
use dockwright::engine::job::{JobHandle, JobState};
use dockwright::engine::manager::DockingJobManager;
use dockwright::engine::progress::ProgressEvent;
use dockwright::engine::registry::JobRegistry;
use std::future::Future;
use tracing::{debug, info, warn};

pub async fn run(args: DockArgs, config: &AppConfig) -> Result<()> {
    let layout = config.layout();
    let complex = match args.complex {
        Some(path) => path,
        None => layout.complex_input(&args.project)?,
    };
    let replicas = args.replicas.unwrap_or(config.replicas);
    if replicas == 0 {
        return Err(CliError::Argument("--replicas must be at least 1".to_string()));
    }

    let manager = DockingJobManager::new(config.docking.clone(), layout, JobRegistry::new());
    let handle = manager.submit(&args.project, &complex, replicas).await?;
    println!(
        "Docking '{}' with {} replica(s); engine log: {}",
        handle.project,
        replicas,
        handle.log_path.display()
    );

    let mut progress = DockProgressDisplay::new();
    let (state, terminal) = follow(handle, &manager, &mut progress, tokio::signal::ctrl_c()).await?;
    debug!(scored = progress.scored(), best = ?progress.best(), "Score lines observed.");

    match (state, terminal) {
        (
            JobState::Completed,
            Some(ProgressEvent::Complete {
                best_score,
                best_model,
                pdb_path,
                ..
            }),
        ) => {
            let location = pdb_path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(structure file not found)".to_string());
            println!("✓ Best model {best_model} (score {best_score:.3}): {location}");
            Ok(())
        }
        (_, Some(ProgressEvent::Error { message })) => Err(CliError::JobFailed(message)),
        (state, _) => Err(CliError::JobFailed(format!("job ended in state '{state}'"))),
    }
}

/// Drives the display from the job's events until the stream closes.
///
/// The first completion of `interrupt` cancels the job through `manager`; the stream then
/// still runs to its terminal event. Returns the job's state and its terminal event.
async fn follow<I>(
    mut handle: JobHandle,
    manager: &DockingJobManager,
    display: &mut DockProgressDisplay,
    interrupt: I,
) -> Result<(JobState, Option<ProgressEvent>)>
where
    I: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(interrupt);
    let project = handle.project.clone();
    let mut interrupted = false;
    let mut terminal = None;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                display.handle_event(&event);
                if event.is_terminal() {
                    terminal = Some(event);
                }
            }
            signal = &mut interrupt, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        warn!(project = %project, "Interrupt received; cancelling docking run.");
                        manager.cancel(&project);
                    }
                    Err(e) => warn!("Failed to listen for interrupt signal: {}", e),
                }
            }
        }
    }

    let state = handle.wait().await?;
    info!(state = %state, "Docking run finished.");
    Ok((state, terminal))
}
