//! Change publisher: direct write or folder-grouped pull requests.
//!
//! In PR mode, approved changes are partitioned into [`PrGroup`]s by a
//! folder key truncated at `--pr-depth`. Each group becomes one branch, one
//! commit, and one pull request against the target branch. Failures are
//! reported per group; work already pushed is left in place.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::git::GitRepo;
use crate::github::GithubClient;
use crate::models::{ApprovalStatus, PendingChange, PrGroup};
use crate::review::Reviewer;

pub const PR_TITLE_PREFIX: &str = "[Docstring-AI]";
pub const COMMIT_MESSAGE: &str = "[Docstring-AI] ✨ Add docstrings via Docstring-AI script";

/// Grouping key of `path` at `depth`.
///
/// Depth 0 keys by the file itself. Otherwise the first `depth` directories
/// followed by `/`; files at the root share the key `./`.
pub fn folder_key(path: &str, depth: usize) -> String {
    if depth == 0 {
        return path.to_string();
    }
    let dirs: Vec<&str> = path.split('/').collect();
    let dirs = &dirs[..dirs.len().saturating_sub(1)];
    if dirs.is_empty() {
        return "./".to_string();
    }
    let take = depth.min(dirs.len());
    format!("{}/", dirs[..take].join("/"))
}

/// Partition approved changes into groups, sorted by key.
pub fn group_changes(
    changes: &[PendingChange],
    depth: usize,
    target_branch: &str,
    base_branch_name: &str,
) -> Vec<PrGroup> {
    let mut by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for change in changes
        .iter()
        .filter(|c| c.status == ApprovalStatus::Approved)
    {
        by_key
            .entry(folder_key(&change.path, depth))
            .or_default()
            .push(change.path.clone());
    }

    by_key
        .into_iter()
        .map(|(key, mut files)| {
            files.sort();
            files.dedup();
            let branch_name = group_branch_name(base_branch_name, &key);
            PrGroup {
                key,
                files,
                target_branch: target_branch.to_string(),
                branch_name,
            }
        })
        .collect()
}

fn group_branch_name(base: &str, key: &str) -> String {
    let folder = match key.trim_end_matches('/') {
        "." | "" => "root",
        other => other,
    };
    let unique = uuid::Uuid::new_v4().simple().to_string();
    sanitize_branch_name(&format!("{}-{}-{}", base, folder, &unique[..8]))
}

/// `/` becomes `-`; anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_branch_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' => '-',
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => c,
            _ => '_',
        })
        .collect()
}

/// Inputs to the target-branch decision, highest priority resolved first.
#[derive(Debug, Clone, Default)]
pub struct BranchSources {
    pub use_repo_config: bool,
    pub detected: Option<String>,
    pub explicit: Option<String>,
    pub configured: Option<String>,
    pub current: Option<String>,
}

pub fn resolve_target_branch(sources: BranchSources) -> Option<String> {
    let BranchSources {
        use_repo_config,
        detected,
        explicit,
        configured,
        current,
    } = sources;
    let preferred = if use_repo_config {
        detected.or(explicit)
    } else {
        explicit
    };
    preferred.or(configured).or(current)
}

/// `[Docstring-AI] <name>`, with a per-group name unless one was given.
pub fn pr_title(pr_name: Option<&str>, group_key: &str) -> String {
    match pr_name {
        Some(name) => format!("{} {}", PR_TITLE_PREFIX, name),
        None if group_key.ends_with('/') => format!(
            "{} -- Add docstrings for folder `{}`",
            PR_TITLE_PREFIX, group_key
        ),
        None => format!("{} -- Add docstrings for `{}`", PR_TITLE_PREFIX, group_key),
    }
}

pub fn pr_body(files: &[String]) -> String {
    let mut body = String::from("Automated docstring additions.\n\n**Files Changed:**\n");
    for file in files {
        body.push_str(&format!("- `{}`\n", file));
    }
    body
}

/// Overwrite `change.path` under `root`. Returns the backup path if one
/// was written.
///
/// A backup is taken when `root` is not a git work tree, or when the file
/// has uncommitted changes that the write would otherwise destroy.
pub fn write_direct(root: &Path, change: &PendingChange, git: &GitRepo) -> Result<Option<PathBuf>> {
    let target = root.join(&change.path);
    let needs_backup = !git.is_work_tree()
        || git.has_uncommitted_changes(&change.path).unwrap_or(true);

    let backup = if needs_backup {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let mut name = target.as_os_str().to_os_string();
        name.push(format!(".{}.bak", stamp));
        let backup = PathBuf::from(name);
        std::fs::write(&backup, &change.original)
            .with_context(|| format!("Failed to write backup {}", backup.display()))?;
        Some(backup)
    } else {
        None
    };

    std::fs::write(&target, &change.proposed)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    info!(path = %change.path, backup = ?backup, "wrote docstrings");
    Ok(backup)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Opened { url: String },
    /// Declined at the per-group confirmation.
    Declined,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct GroupResult {
    pub group: PrGroup,
    pub outcome: GroupOutcome,
}

pub struct PrPublisher<'a> {
    pub git: &'a GitRepo,
    pub github: &'a GithubClient,
    pub repo: &'a str,
    pub remote: &'a str,
    pub pr_name: Option<&'a str>,
}

impl PrPublisher<'_> {
    /// Publish every group in order. `reviewer` is asked per group when set.
    pub async fn publish(
        &self,
        groups: &[PrGroup],
        changes: &[PendingChange],
        reviewer: Option<&dyn Reviewer>,
    ) -> Result<Vec<GroupResult>> {
        let start_branch = self.git.current_branch()?;
        let proposed: BTreeMap<&str, &PendingChange> =
            changes.iter().map(|c| (c.path.as_str(), c)).collect();

        let mut results = Vec::with_capacity(groups.len());
        for group in groups {
            if let Some(reviewer) = reviewer {
                let question = format!(
                    "Create a pull request for {} ({} file(s)) on branch {}?",
                    group.key,
                    group.files.len(),
                    group.branch_name
                );
                if !reviewer.confirm(&question)? {
                    info!(group = %group.key, "pull request declined");
                    results.push(GroupResult {
                        group: group.clone(),
                        outcome: GroupOutcome::Declined,
                    });
                    continue;
                }
            }

            let outcome = match self.publish_group(group, &proposed).await {
                Ok(url) => GroupOutcome::Opened { url },
                Err(e) => {
                    error!(group = %group.key, error = %e, "failed to publish group");
                    GroupOutcome::Failed(format!("{:#}", e))
                }
            };

            if let Err(e) = self.git.checkout(&start_branch) {
                warn!(branch = %start_branch, error = %e, "failed to return to starting branch");
            }
            results.push(GroupResult {
                group: group.clone(),
                outcome,
            });
        }
        Ok(results)
    }

    async fn publish_group(
        &self,
        group: &PrGroup,
        proposed: &BTreeMap<&str, &PendingChange>,
    ) -> Result<String> {
        self.git.checkout_new_branch(&group.branch_name)?;

        for path in &group.files {
            let change = proposed
                .get(path.as_str())
                .with_context(|| format!("No proposed content for {}", path))?;
            let target = self.git.root().join(path);
            std::fs::write(&target, &change.proposed)
                .with_context(|| format!("Failed to write {}", target.display()))?;
        }

        self.git.add(&group.files)?;
        self.git.commit(COMMIT_MESSAGE)?;
        self.git.push(self.remote, &group.branch_name)?;

        let url = self
            .github
            .create_pull_request(
                self.repo,
                &pr_title(self.pr_name, &group.key),
                &group.branch_name,
                &group.target_branch,
                &pr_body(&group.files),
            )
            .await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn approved(path: &str) -> PendingChange {
        let mut change = PendingChange::new(path, "x = 1\n".into(), "\"\"\"D.\"\"\"\nx = 1\n".into());
        change.status = ApprovalStatus::Approved;
        change
    }

    #[test]
    fn folder_keys() {
        assert_eq!(folder_key("lib/sub/a.py", 0), "lib/sub/a.py");
        assert_eq!(folder_key("lib/sub/a.py", 1), "lib/");
        assert_eq!(folder_key("lib/sub/a.py", 2), "lib/sub/");
        assert_eq!(folder_key("lib/sub/a.py", 5), "lib/sub/");
        assert_eq!(folder_key("main.py", 2), "./");
    }

    #[test]
    fn depth_zero_is_one_group_per_file() {
        let changes = vec![approved("lib/a.py"), approved("lib/b.py"), approved("c.py")];
        let groups = group_changes(&changes, 0, "main", "feature/docs");
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["c.py", "lib/a.py", "lib/b.py"]);
        assert!(groups.iter().all(|g| g.files.len() == 1));
    }

    #[test]
    fn groups_partition_approved_changes() {
        let mut rejected = approved("lib/skip.py");
        rejected.status = ApprovalStatus::Rejected;
        let changes = vec![
            approved("lib/x/a.py"),
            approved("lib/y/b.py"),
            approved("lib/c.py"),
            approved("tools/d.py"),
            approved("e.py"),
            rejected,
        ];

        let groups = group_changes(&changes, 1, "main", "feature/docs");
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["./", "lib/", "tools/"]);
        assert_eq!(groups[1].files, vec!["lib/c.py", "lib/x/a.py", "lib/y/b.py"]);

        let mut all: Vec<String> = groups.iter().flat_map(|g| g.files.clone()).collect();
        all.sort();
        assert_eq!(all.len(), 5);
        assert!(!all.contains(&"lib/skip.py".to_string()));

        assert!(groups[0].branch_name.starts_with("feature-docs-root-"));
        assert!(groups[1].branch_name.starts_with("feature-docs-lib-"));
        assert_eq!(groups[1].branch_name.len(), "feature-docs-lib-".len() + 8);
        assert!(groups.iter().all(|g| g.target_branch == "main"));
    }

    #[test]
    fn branch_names_are_sanitized() {
        assert_eq!(
            sanitize_branch_name("feature/docs update:v1"),
            "feature-docs_update_v1"
        );
    }

    #[test]
    fn target_branch_priority() {
        let all = || BranchSources {
            use_repo_config: false,
            detected: Some("detected".into()),
            explicit: Some("explicit".into()),
            configured: Some("configured".into()),
            current: Some("current".into()),
        };
        assert_eq!(resolve_target_branch(all()).as_deref(), Some("explicit"));
        assert_eq!(
            resolve_target_branch(BranchSources {
                use_repo_config: true,
                ..all()
            })
            .as_deref(),
            Some("detected")
        );
        assert_eq!(
            resolve_target_branch(BranchSources {
                explicit: None,
                configured: None,
                ..all()
            })
            .as_deref(),
            Some("current")
        );
        assert_eq!(resolve_target_branch(BranchSources::default()), None);
    }

    #[test]
    fn body_lists_files() {
        let body = pr_body(&["lib/a.py".to_string(), "lib/b.py".to_string()]);
        assert_eq!(
            body,
            "Automated docstring additions.\n\n**Files Changed:**\n- `lib/a.py`\n- `lib/b.py`\n"
        );
        assert_eq!(pr_title(Some("docs"), "lib/"), "[Docstring-AI] docs");
        assert_eq!(
            pr_title(None, "lib/"),
            "[Docstring-AI] -- Add docstrings for folder `lib/`"
        );
        assert_eq!(
            pr_title(None, "lib/a.py"),
            "[Docstring-AI] -- Add docstrings for `lib/a.py`"
        );
    }

    #[test]
    fn direct_write_backs_up_outside_git() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.py"), "x = 1\n").unwrap();
        let change = approved("a.py");

        let backup = write_direct(tmp.path(), &change, &GitRepo::new(tmp.path()))
            .unwrap()
            .expect("backup outside a work tree");
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "x = 1\n");
        assert!(backup.to_string_lossy().ends_with(".bak"));
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("a.py")).unwrap(),
            change.proposed
        );
    }
}
