//! Repository scanner and processing order.
//!
//! Walks the root with `walkdir`, keeps files matching `files.include_globs`,
//! drops anything under the default excludes, user excludes, or hidden
//! directories, then orders the result with an [`OrderingPolicy`].

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::FilesConfig;
use crate::python;

const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/.docstring_ai/**",
    "**/node_modules/**",
    "**/target/**",
    "**/venv/**",
    "**/.venv/**",
];

/// One eligible source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path relative to the root, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
}

/// Eligible files under `root`, sorted by relative path.
pub fn scan(root: &Path, files: &FilesConfig) -> Result<Vec<ScannedFile>> {
    if !root.is_dir() {
        bail!("Scan root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&files.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(files.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(files.follow_symlinks)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_dir(e));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = to_slash_path(relative);

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let size = entry
            .metadata()
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        out.push(ScannedFile {
            rel_path: rel_str,
            abs_path: path.to_path_buf(),
            size,
        });
    }

    out.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(out)
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Decides the order files are processed in, which is also the order
/// knowledge accumulates in.
pub trait OrderingPolicy {
    fn name(&self) -> &'static str;

    fn order(&self, files: &mut Vec<ScannedFile>) -> Result<()>;
}

/// Smallest files first, ties by path.
pub struct BySize;

impl OrderingPolicy for BySize {
    fn name(&self) -> &'static str {
        "size"
    }

    fn order(&self, files: &mut Vec<ScannedFile>) -> Result<()> {
        files.sort_by(|a, b| a.size.cmp(&b.size).then_with(|| a.rel_path.cmp(&b.rel_path)));
        Ok(())
    }
}

/// Lexical path order.
pub struct ByPath;

impl OrderingPolicy for ByPath {
    fn name(&self) -> &'static str {
        "path"
    }

    fn order(&self, files: &mut Vec<ScannedFile>) -> Result<()> {
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Ok(())
    }
}

/// Fewest importers first, ties by size then path. Reads every file.
pub struct ByDependents;

impl OrderingPolicy for ByDependents {
    fn name(&self) -> &'static str {
        "dependents"
    }

    fn order(&self, files: &mut Vec<ScannedFile>) -> Result<()> {
        let modules: Vec<String> = files.iter().map(|f| module_name(&f.rel_path)).collect();
        let mut importers: HashMap<usize, HashSet<usize>> = HashMap::new();

        for (i, file) in files.iter().enumerate() {
            let source = std::fs::read_to_string(&file.abs_path).unwrap_or_default();
            for import in python::imported_modules(&source) {
                for (j, module) in modules.iter().enumerate() {
                    if i != j && module_matches(module, &import) {
                        importers.entry(j).or_default().insert(i);
                    }
                }
            }
        }

        let counts: HashMap<String, usize> = files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.rel_path.clone(), importers.get(&i).map_or(0, |s| s.len())))
            .collect();

        files.sort_by(|a, b| {
            counts[&a.rel_path]
                .cmp(&counts[&b.rel_path])
                .then_with(|| a.size.cmp(&b.size))
                .then_with(|| a.rel_path.cmp(&b.rel_path))
        });
        Ok(())
    }
}

/// Dotted module name of a relative path: `pkg/sub/__init__.py` → `pkg.sub`.
fn module_name(rel_path: &str) -> String {
    let stem = rel_path.strip_suffix(".py").unwrap_or(rel_path);
    let stem = stem.strip_suffix("/__init__").unwrap_or(stem);
    stem.replace('/', ".")
}

/// An import names a module if it equals it or is a dotted suffix of it.
fn module_matches(module: &str, import: &str) -> bool {
    module == import
        || module
            .strip_suffix(import)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

pub fn policy_from_name(name: &str) -> Result<Box<dyn OrderingPolicy>> {
    match name {
        "size" => Ok(Box::new(BySize)),
        "path" => Ok(Box::new(ByPath)),
        "dependents" => Ok(Box::new(ByDependents)),
        other => bail!("Unknown ordering policy: '{}'", other),
    }
}
