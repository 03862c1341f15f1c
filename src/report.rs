//! End-of-run summary printed to stdout.

use std::fmt;

use crate::models::FileOutcome;
use crate::publish::{GroupOutcome, GroupResult};

#[derive(Debug, Default)]
pub struct RunReport {
    pub files: Vec<(String, FileOutcome)>,
    pub groups: Vec<GroupResult>,
    pub backups: Vec<String>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn record(&mut self, path: &str, outcome: FileOutcome) {
        self.files.push((path.to_string(), outcome));
    }

    pub fn outcome(&self, path: &str) -> Option<&FileOutcome> {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, outcome)| outcome)
    }

    pub fn count(&self, label: &str) -> usize {
        self.files
            .iter()
            .filter(|(_, outcome)| outcome.label() == label)
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.count("failed") > 0
            || self
                .groups
                .iter()
                .any(|g| matches!(g.outcome, GroupOutcome::Failed(_)))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "docstring-ai{}", if self.dry_run { " (dry-run)" } else { "" })?;
        writeln!(f, "  files:     {}", self.files.len())?;
        if self.dry_run {
            writeln!(f, "  cached:    {}", self.count("cached"))?;
            writeln!(f, "  to generate: {}", self.files.len() - self.count("cached"))?;
        } else {
            for label in ["cached", "generated", "unchanged", "rejected", "failed"] {
                writeln!(f, "  {:<10} {}", format!("{}:", label), self.count(label))?;
            }
        }

        if !self.files.is_empty() {
            writeln!(f)?;
            for (path, outcome) in &self.files {
                let label = if self.dry_run && *outcome != FileOutcome::Cached {
                    "to generate".to_string()
                } else {
                    outcome.to_string()
                };
                writeln!(f, "  {:<11} {}", label, path)?;
            }
        }

        if !self.backups.is_empty() {
            writeln!(f)?;
            writeln!(f, "  backups:")?;
            for backup in &self.backups {
                writeln!(f, "    {}", backup)?;
            }
        }

        if !self.groups.is_empty() {
            writeln!(f)?;
            writeln!(f, "  pull requests:")?;
            for result in &self.groups {
                let status = match &result.outcome {
                    GroupOutcome::Opened { url } => url.clone(),
                    GroupOutcome::Declined => "declined".to_string(),
                    GroupOutcome::Failed(e) => format!("failed: {}", e),
                };
                writeln!(
                    f,
                    "    {} ({} file(s), {}) {}",
                    result.group.key,
                    result.group.files.len(),
                    result.group.branch_name,
                    status
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_lines() {
        let mut report = RunReport::default();
        report.record("a.py", FileOutcome::Cached);
        report.record("b.py", FileOutcome::Generated);
        report.record("c.py", FileOutcome::Failed("HTTP 401".into()));

        assert_eq!(report.count("cached"), 1);
        assert!(report.has_failures());
        assert_eq!(report.outcome("b.py"), Some(&FileOutcome::Generated));

        let text = report.to_string();
        assert!(text.contains("generated: 1"));
        assert!(text.contains("failed: HTTP 401 c.py"));
    }

    #[test]
    fn dry_run_lists_files_to_generate() {
        let mut report = RunReport {
            dry_run: true,
            ..Default::default()
        };
        report.record("a.py", FileOutcome::Cached);
        report.record("b.py", FileOutcome::Generated);
        let text = report.to_string();
        assert!(text.contains("(dry-run)"));
        assert!(text.contains("to generate b.py"));
        assert!(text.contains("cached      a.py"));
    }
}
