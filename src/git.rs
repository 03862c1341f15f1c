//! Thin wrapper over the `git` CLI for the publishing workflow.
//!
//! Every call runs `git` as a subprocess in the repository root and turns a
//! non-zero exit into an error carrying git's stderr.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .with_context(|| format!("Failed to execute 'git {}'. Is git installed?", args[0]))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn is_work_tree(&self) -> bool {
        self.run(&["rev-parse", "--is-inside-work-tree"])
            .is_ok_and(|out| out == "true")
    }

    pub fn current_branch(&self) -> Result<String> {
        let branch = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch == "HEAD" {
            bail!("HEAD is detached; check out a branch first");
        }
        Ok(branch)
    }

    /// True if `rel_path` differs from HEAD in the index or working tree.
    pub fn has_uncommitted_changes(&self, rel_path: &str) -> Result<bool> {
        let status = self.run(&["status", "--porcelain", "--", rel_path])?;
        Ok(!status.is_empty())
    }

    /// Default branch of `remote`, from `refs/remotes/<remote>/HEAD`.
    pub fn default_branch(&self, remote: &str) -> Option<String> {
        let head = format!("refs/remotes/{}/HEAD", remote);
        let full = self.run(&["symbolic-ref", "--short", &head]).ok()?;
        full.strip_prefix(&format!("{}/", remote))
            .map(str::to_string)
            .filter(|b| !b.is_empty())
    }

    /// `owner/repo` parsed from the URL of `remote`, if it points at GitHub.
    pub fn repo_slug(&self, remote: &str) -> Option<String> {
        let url = self.run(&["remote", "get-url", remote]).ok()?;
        parse_repo_slug(&url)
    }

    /// Create or reset `branch` at the current HEAD and switch to it.
    pub fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "-B", branch]).map(|_| ())
    }

    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch]).map(|_| ())
    }

    pub fn add(&self, paths: &[String]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).map(|_| ())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message]).map(|_| ())
    }

    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", "-u", remote, branch]).map(|_| ())
    }
}

/// Parse `owner/repo` from an https or ssh GitHub remote URL.
pub fn parse_repo_slug(url: &str) -> Option<String> {
    let url = url.trim();
    let path = if let Some(rest) = url.strip_prefix("git@github.com:") {
        rest
    } else if let Some(idx) = url.find("github.com/") {
        &url[idx + "github.com/".len()..]
    } else {
        return None;
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Some(format!("{}/{}", owner, repo))
        }
        _ => None,
    }
}
