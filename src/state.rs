//! The per-repository state directory: database handle and run lock.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::warn;

use crate::db;
use crate::migrate;

pub const DB_FILE: &str = "state.sqlite";
pub const LOG_FILE: &str = "docstring_ai.log";
pub const LOCK_FILE: &str = "run.lock";

/// Open the state database under `state_dir` and apply migrations.
pub async fn open(state_dir: &Path) -> Result<SqlitePool> {
    let pool = db::connect(&state_dir.join(DB_FILE))
        .await
        .with_context(|| format!("Failed to open state database in {}", state_dir.display()))?;
    migrate::run_migrations(&pool).await?;
    Ok(pool)
}

/// Exclusive marker for a run against one repository. Removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock, clearing it first if the process that wrote it is gone.
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join(LOCK_FILE);
        match Self::create(&path) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let Some(pid) = stale_owner(&path) else {
                    bail!(
                        "Another docstring-ai run holds {}. Remove it if no run is active.",
                        path.display()
                    );
                };
                warn!(pid, lock = %path.display(), "removing stale run lock");
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove stale {}", path.display()))?;
                Self::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))
            }
            result => result.with_context(|| format!("Failed to create {}", path.display())),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

/// The PID recorded in the lock file, if that process no longer runs.
fn stale_owner(path: &Path) -> Option<u32> {
    let pid: u32 = std::fs::read_to_string(path).ok()?.trim().parse().ok()?;
    (!process_alive(pid)).then_some(pid)
}

fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    system.process(pid).is_some()
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_fails_until_first_is_dropped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let first = RunLock::acquire(tmp.path()).unwrap();
        assert!(RunLock::acquire(tmp.path()).is_err());
        drop(first);
        assert!(RunLock::acquire(tmp.path()).is_ok());
    }

    #[test]
    fn lock_of_a_dead_process_is_reclaimed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        std::fs::write(tmp.path().join(LOCK_FILE), format!("{}\n", dead_pid)).unwrap();

        let lock = RunLock::acquire(tmp.path()).unwrap();
        let owner = std::fs::read_to_string(tmp.path().join(LOCK_FILE)).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
        drop(lock);
    }

    #[test]
    fn lock_of_a_live_or_unknown_owner_is_kept() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(LOCK_FILE);
        std::fs::write(&path, format!("{}\n", std::process::id())).unwrap();
        assert!(RunLock::acquire(tmp.path()).is_err());

        std::fs::write(&path, "not a pid\n").unwrap();
        assert!(RunLock::acquire(tmp.path()).is_err());
        assert!(path.exists());
    }
}
