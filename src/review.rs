//! Diff/review gate for `--manual` runs.

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use similar::TextDiff;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Unified diff with `--- original` / `+++ modified` headers.
pub fn unified_diff(original: &str, modified: &str) -> String {
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(3)
        .header("original", "modified")
        .to_string()
}

/// Answers yes/no questions about proposed changes.
pub trait Reviewer: Send + Sync {
    /// Show `diff` for `path` and decide whether to apply it.
    fn review(&self, path: &str, diff: &str) -> Result<bool>;

    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Prompts on the terminal.
pub struct TerminalReviewer;

impl Reviewer for TerminalReviewer {
    fn review(&self, path: &str, diff: &str) -> Result<bool> {
        println!("\n=== Proposed changes for {} ===", path);
        println!("{}", diff);
        self.confirm(&format!("Apply these changes to {}?", path))
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .default(false)
            .interact()?)
    }
}

/// Approves everything without asking.
pub struct AutoApprove;

impl Reviewer for AutoApprove {
    fn review(&self, _path: &str, _diff: &str) -> Result<bool> {
        Ok(true)
    }

    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Replays prepared answers in order; answers `false` once they run out.
#[derive(Default)]
pub struct ScriptedReviewer {
    answers: Mutex<VecDeque<bool>>,
    reviewed: Mutex<Vec<String>>,
}

impl ScriptedReviewer {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            reviewed: Mutex::new(Vec::new()),
        }
    }

    /// Paths shown for review so far.
    pub fn reviewed(&self) -> Vec<String> {
        self.reviewed.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next(&self) -> bool {
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .unwrap_or(false)
    }
}

impl Reviewer for ScriptedReviewer {
    fn review(&self, path: &str, _diff: &str) -> Result<bool> {
        if let Ok(mut reviewed) = self.reviewed.lock() {
            reviewed.push(path.to_string());
        }
        Ok(self.next())
    }

    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(self.next())
    }
}
