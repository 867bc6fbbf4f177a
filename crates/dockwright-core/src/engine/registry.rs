use serde::Serialize;
use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{info, warn};

new_key_type! {
    /// Identifies one registered job; keys are never reused for a later job.
    pub struct JobKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
}

impl CancelOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CancelOutcome::Cancelled => "cancelled",
            CancelOutcome::NotFound => "not-found",
        }
    }
}

#[derive(Debug)]
struct JobEntry {
    project: String,
    cancel: watch::Sender<bool>,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: SlotMap<JobKey, JobEntry>,
    by_project: HashMap<String, JobKey>,
}

/// Process-wide map from project to its running job.
///
/// Clones share the same state. Each project has at most one entry; registering a second
/// job for a project replaces the first entry without cancelling that job.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a job for `project`, returning its key and cancellation signal.
    pub fn register(&self, project: &str) -> (JobKey, watch::Receiver<bool>) {
        let (cancel, receiver) = watch::channel(false);
        let mut state = self.state();

        if let Some(previous) = state.by_project.remove(project) {
            state.entries.remove(previous);
            warn!(
                project,
                "A job is already registered for this project; replacing its registry entry."
            );
        }

        let key = state.entries.insert(JobEntry {
            project: project.to_string(),
            cancel,
        });
        state.by_project.insert(project.to_string(), key);
        (key, receiver)
    }

    /// Signals the project's job to terminate and removes its entry without waiting.
    pub fn cancel(&self, project: &str) -> CancelOutcome {
        let mut state = self.state();
        let Some(key) = state.by_project.remove(project) else {
            return CancelOutcome::NotFound;
        };
        if let Some(entry) = state.entries.remove(key) {
            entry.cancel.send_replace(true);
        }
        info!(project, "Cancellation signalled.");
        CancelOutcome::Cancelled
    }

    /// Removes the entry for `key` if it is still registered; returns whether it was.
    pub fn release(&self, key: JobKey) -> bool {
        let mut state = self.state();
        let Some(entry) = state.entries.remove(key) else {
            return false;
        };
        if state.by_project.get(&entry.project) == Some(&key) {
            state.by_project.remove(&entry.project);
        }
        true
    }

    pub fn is_active(&self, project: &str) -> bool {
        self.state().by_project.contains_key(project)
    }

    pub fn active_projects(&self) -> Vec<String> {
        let mut projects: Vec<String> = self.state().by_project.keys().cloned().collect();
        projects.sort();
        projects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_without_job_is_not_found_and_idempotent() {
        let registry = JobRegistry::new();
        assert_eq!(registry.cancel("p"), CancelOutcome::NotFound);
        assert_eq!(registry.cancel("p"), CancelOutcome::NotFound);
    }

    #[test]
    fn cancel_signals_and_removes_entry() {
        let registry = JobRegistry::new();
        let (_key, receiver) = registry.register("p");
        assert!(registry.is_active("p"));

        assert_eq!(registry.cancel("p"), CancelOutcome::Cancelled);
        assert!(*receiver.borrow());
        assert!(!registry.is_active("p"));
        assert_eq!(registry.cancel("p"), CancelOutcome::NotFound);
    }

    #[test]
    fn stale_release_does_not_remove_newer_entry() {
        let registry = JobRegistry::new();
        let (old, _old_rx) = registry.register("p");
        let (new, new_rx) = registry.register("p");
        assert_ne!(old, new);

        assert!(!registry.release(old));
        assert!(registry.is_active("p"));

        assert_eq!(registry.cancel("p"), CancelOutcome::Cancelled);
        assert!(*new_rx.borrow());
        assert!(!registry.release(new));
    }

    #[test]
    fn clones_share_state() {
        let registry = JobRegistry::new();
        let other = registry.clone();
        let (key, _rx) = registry.register("a");
        other.register("b");
        assert_eq!(registry.active_projects(), vec!["a", "b"]);
        assert!(other.release(key));
        assert_eq!(registry.active_projects(), vec!["b"]);
    }

    #[test]
    fn outcome_wire_names() {
        assert_eq!(CancelOutcome::NotFound.as_str(), "not-found");
        assert_eq!(
            serde_json::to_value(CancelOutcome::Cancelled).unwrap(),
            serde_json::json!("cancelled")
        );
    }
}
