use dockwright::engine::progress::ProgressEvent;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::time::Duration;

const SPINNER_TICK_MS: u64 = 80;

/// Renders a docking job's event stream as a progress bar on stderr.
pub struct DockProgressDisplay {
    bar: ProgressBar,
    best: Option<(f64, String)>,
    scored: usize,
}

impl DockProgressDisplay {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr_with_hz(12))
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_draw_target(target);
        bar.set_style(Self::spinner_style());
        bar.set_message("Launching docking engine...");
        bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
        Self {
            bar,
            best: None,
            scored: 0,
        }
    }

    pub fn handle_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Start { total, message } => {
                self.bar.disable_steady_tick();
                self.bar.set_style(Self::bar_style());
                self.bar.set_length(*total as u64);
                self.bar.set_position(0);
                self.bar.set_message(message.clone());
            }
            ProgressEvent::Progress { current, .. } => {
                self.bar.set_position(*current as u64);
            }
            ProgressEvent::Score { score, desc, .. } => {
                self.scored += 1;
                let improved = self.best.as_ref().is_none_or(|(best, _)| score < best);
                if improved {
                    self.best = Some((*score, desc.clone()));
                    self.bar
                        .set_message(format!("Docking (best {score:.3}: {desc})"));
                }
                self.bar.println(format!("  {desc}: {score:.3}"));
            }
            ProgressEvent::Complete {
                best_score,
                best_model,
                all_models,
                ..
            } => {
                if let Some(length) = self.bar.length() {
                    self.bar.set_position(length);
                }
                self.bar.finish_with_message(format!(
                    "✓ {} model(s) scored; best {best_model} ({best_score:.3})",
                    all_models.len()
                ));
            }
            ProgressEvent::Error { message } => {
                self.bar.abandon_with_message(format!("✗ {message}"));
            }
        }
    }

    pub fn best(&self) -> Option<&(f64, String)> {
        self.best.as_ref()
    }

    pub fn scored(&self) -> usize {
        self.scored
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<45} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "elapsed",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.elapsed().as_secs_f64());
                },
            )
            .progress_chars("━╸ ")
    }
}
