//! Core data models used throughout Docstring-AI.
//!
//! These types represent the cached file state, accumulated knowledge, and
//! the per-run change sets that flow from generation to publishing.

use std::fmt;

/// Cached state for one source file, keyed by its repo-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub fingerprint: String,
    pub processed_at: i64,
    pub content: String,
}

/// Accumulated natural-language description of a unit (file or class).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSummary {
    pub unit_id: String,
    pub summary: String,
    pub fingerprint: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A proposed rewrite of one file, alive for the duration of a run.
#[derive(Debug, Clone)]
pub struct PendingChange {
    pub path: String,
    pub original: String,
    pub proposed: String,
    pub status: ApprovalStatus,
}

impl PendingChange {
    pub fn new(path: impl Into<String>, original: String, proposed: String) -> Self {
        Self {
            path: path.into(),
            original,
            proposed,
            status: ApprovalStatus::Pending,
        }
    }
}

/// A batch of approved changes published as one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrGroup {
    pub key: String,
    pub files: Vec<String>,
    pub target_branch: String,
    pub branch_name: String,
}

/// Terminal state of one file in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Fingerprint matched the cache; no API call was made.
    Cached,
    /// New content was produced and handed to the publisher.
    Generated,
    /// The model proposed no change.
    Unchanged,
    /// The operator declined the change.
    Rejected,
    Failed(String),
}

impl FileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Cached => "cached",
            FileOutcome::Generated => "generated",
            FileOutcome::Unchanged => "unchanged",
            FileOutcome::Rejected => "rejected",
            FileOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}
