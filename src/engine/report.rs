//! Terminal progress for pipeline runs

use colored::Colorize;
use declarative::{ApplyResult, ProgressCallback};

use super::stage::Stage;
use crate::ui;

/// Prints each step and records the stages a run passed through
pub struct Reporter {
    quiet: bool,
    history: Vec<Stage>,
    warnings: Vec<String>,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            history: vec![Stage::Idle],
            warnings: Vec::new(),
        }
    }

    /// Stages entered, in order, starting at `Idle`
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    pub fn stage(&self) -> Stage {
        self.history.last().copied().unwrap_or(Stage::Idle)
    }

    /// Messages from best-effort steps that failed
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn enter(&mut self, stage: Stage) {
        if self.history.last() != Some(&stage) {
            self.history.push(stage);
        }
    }
}

fn result_label(result: &ApplyResult) -> String {
    match result {
        ApplyResult::NoChange => "unchanged".dimmed().to_string(),
        ApplyResult::Created => "done".green().to_string(),
        ApplyResult::Modified => "updated".green().to_string(),
        ApplyResult::Removed => "removed".green().to_string(),
        ApplyResult::Skipped { reason } => format!("skipped ({reason})").yellow().to_string(),
    }
}

impl ProgressCallback<Stage> for Reporter {
    fn on_step_start(&mut self, index: usize, total: usize, stage: Stage, description: &str) {
        self.enter(stage);
        log::debug!("Entering stage {}", stage);
        if !self.quiet {
            ui::step(index + 1, total, description);
        }
    }

    fn on_step_complete(&mut self, id: &str, result: &ApplyResult) {
        log::debug!("{}: {:?}", id, result);
        if !self.quiet {
            println!("      {}", result_label(result));
        }
    }

    fn on_step_warning(&mut self, id: &str, error: &anyhow::Error) {
        let message = format!("{error:#}");
        log::warn!("{}: {}", id, message);
        ui::warn(&message);
        self.warnings.push(message);
    }

    fn on_step_failed(&mut self, stage: Stage, id: &str, error: &anyhow::Error) {
        log::error!("{} failed during {}: {:#}", id, stage, error);
        self.history.push(Stage::Failed);
    }
}
