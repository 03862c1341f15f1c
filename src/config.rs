//! Configuration: the optional TOML file plus CLI and environment resolution.
//!
//! The TOML file supplies tuning knobs (models, retries, globs). Credentials
//! and publishing targets come from CLI flags with environment fallbacks and
//! are folded into a single [`Settings`] value by [`Settings::resolve`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the per-repository state directory (cache, log, lock).
pub const STATE_DIR: &str = ".docstring_ai";
/// Default config file name, looked up under the scanned root.
pub const DEFAULT_CONFIG_FILE: &str = "docstring-ai.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_backoff_ms() -> u64 {
    2000
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_top_k() -> usize {
    5
}
fn default_max_context_chars() -> usize {
    32_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.py".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    #[serde(default = "default_ordering")]
    pub ordering: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ordering: default_ordering(),
        }
    }
}

fn default_ordering() -> String {
    "size".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_github_api")]
    pub api_base: String,
    #[serde(default)]
    pub default_repo: Option<String>,
    #[serde(default)]
    pub default_target_branch: Option<String>,
    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api(),
            default_repo: None,
            default_target_branch: None,
            remote: default_remote(),
        }
    }
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}
fn default_remote() -> String {
    "origin".to_string()
}

/// Load and validate a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.context.top_k == 0 {
        bail!("context.top_k must be >= 1");
    }

    if config.files.include_globs.is_empty() {
        bail!("files.include_globs must not be empty");
    }

    if !(0.0..=2.0).contains(&config.openai.temperature) {
        bail!("openai.temperature must be in [0.0, 2.0]");
    }

    match config.run.ordering.as_str() {
        "size" | "dependents" | "path" => {}
        other => bail!(
            "Unknown ordering policy: '{}'. Must be size, dependents, or path.",
            other
        ),
    }

    Ok(config)
}

/// Raw command-line options, before environment and config fallbacks.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub path: PathBuf,
    pub api_key: Option<String>,
    pub pr: Option<String>,
    pub target_branch: Option<String>,
    pub github_token: Option<String>,
    pub branch_name: Option<String>,
    pub pr_name: Option<String>,
    pub pr_depth: usize,
    pub manual: bool,
    pub use_repo_config: bool,
    pub no_cache: bool,
    pub yes: bool,
    pub dry_run: bool,
}

/// Where changes go at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishMode {
    /// Overwrite files in place.
    DirectWrite,
    /// Group changes and open pull requests against `repo`.
    PullRequest { repo: String, token: String },
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub api_key: String,
    pub mode: PublishMode,
    pub target_branch: Option<String>,
    pub branch_name: String,
    /// Explicit PR title; each group derives its own when unset.
    pub pr_name: Option<String>,
    pub pr_depth: usize,
    pub manual: bool,
    pub use_repo_config: bool,
    pub no_cache: bool,
    pub yes: bool,
    pub dry_run: bool,
    pub config: Config,
}

impl Settings {
    /// Resolve CLI options against the environment and the config file.
    ///
    /// `env` looks up an environment variable; `detected_repo` is the
    /// `owner/repo` parsed from the local git remote, used only when
    /// `--use-repo-config` is set. Fails on missing path or credentials.
    pub fn resolve<F>(
        cli: CliOptions,
        config: Config,
        env: F,
        detected_repo: Option<String>,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !cli.path.exists() {
            bail!("The specified path '{}' does not exist.", cli.path.display());
        }
        if !cli.path.is_dir() {
            bail!("The specified path '{}' is not a directory.", cli.path.display());
        }

        // A dry run never calls the model, so it may run without a key.
        let api_key = match non_empty(cli.api_key).or_else(|| non_empty(env("OPENAI_API_KEY"))) {
            Some(key) => key,
            None if cli.dry_run => String::new(),
            None => bail!(
                "OpenAI API key must be provided via --api_key or the OPENAI_API_KEY environment variable."
            ),
        };

        let explicit_repo = non_empty(cli.pr)
            .or_else(|| non_empty(env("GITHUB_REPO")))
            .or_else(|| config.github.default_repo.clone());
        let repo = if cli.use_repo_config {
            detected_repo.or(explicit_repo)
        } else {
            explicit_repo
        };

        let mode = match repo {
            Some(repo) => {
                if !is_valid_repo_slug(&repo) {
                    bail!("GitHub repository must look like 'owner/repo', got '{}'", repo);
                }
                let token = non_empty(cli.github_token)
                    .or_else(|| non_empty(env("GITHUB_TOKEN")))
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "GitHub token must be provided via --github-token or the GITHUB_TOKEN environment variable."
                        )
                    })?;
                PublishMode::PullRequest { repo, token }
            }
            None => PublishMode::DirectWrite,
        };

        let branch_name = non_empty(cli.branch_name).unwrap_or_else(|| {
            format!(
                "feature/docstring-updates-{}",
                chrono::Local::now().format("%Y%m%d%H%M%S")
            )
        });
        let pr_name = non_empty(cli.pr_name);

        Ok(Self {
            root: cli.path,
            api_key,
            mode,
            target_branch: non_empty(cli.target_branch),
            branch_name,
            pr_name,
            pr_depth: cli.pr_depth,
            manual: cli.manual,
            use_repo_config: cli.use_repo_config,
            no_cache: cli.no_cache,
            yes: cli.yes,
            dry_run: cli.dry_run,
            config,
        })
    }

    /// `<root>/.docstring_ai`
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// Publishing mode without credentials, for logs.
    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            PublishMode::DirectWrite => "direct-write",
            PublishMode::PullRequest { .. } => "pull-request",
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_valid_repo_slug(repo: &str) -> bool {
    let mut parts = repo.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn cli_for(tmp: &TempDir) -> CliOptions {
        CliOptions {
            path: tmp.path().to_path_buf(),
            pr_depth: 2,
            ..Default::default()
        }
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&tmp.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.openai.model, "gpt-4o-mini");
        assert_eq!(cfg.context.top_k, 5);
        assert_eq!(cfg.files.include_globs, vec!["**/*.py".to_string()]);
        assert_eq!(cfg.run.ordering, "size");
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docstring-ai.toml");
        std::fs::write(
            &path,
            "[openai]\nmodel = \"gpt-4o\"\n\n[run]\nordering = \"dependents\"\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.openai.model, "gpt-4o");
        assert_eq!(cfg.openai.max_retries, 5);
        assert_eq!(cfg.run.ordering, "dependents");
    }

    #[test]
    fn unknown_ordering_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docstring-ai.toml");
        std::fs::write(&path, "[run]\nordering = \"random\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn api_key_falls_back_to_env() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::resolve(
            cli_for(&tmp),
            Config::default(),
            env_from(&[("OPENAI_API_KEY", "sk-env")]),
            None,
        )
        .unwrap();
        assert_eq!(settings.api_key, "sk-env");
        assert_eq!(settings.mode, PublishMode::DirectWrite);
        assert!(settings.branch_name.starts_with("feature/docstring-updates-"));
    }

    #[test]
    fn missing_api_key_is_a_setup_error() {
        let tmp = TempDir::new().unwrap();
        let err = Settings::resolve(cli_for(&tmp), Config::default(), env_from(&[]), None)
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn dry_run_needs_no_api_key() {
        let tmp = TempDir::new().unwrap();
        let mut cli = cli_for(&tmp);
        cli.dry_run = true;
        let settings = Settings::resolve(cli, Config::default(), env_from(&[]), None).unwrap();
        assert!(settings.api_key.is_empty());
        assert!(settings.dry_run);
    }

    #[test]
    fn missing_path_is_a_setup_error() {
        let tmp = TempDir::new().unwrap();
        let mut cli = cli_for(&tmp);
        cli.path = tmp.path().join("missing");
        cli.api_key = Some("sk".into());
        assert!(Settings::resolve(cli, Config::default(), env_from(&[]), None).is_err());
    }

    #[test]
    fn pr_flag_overrides_env_repo_and_requires_token() {
        let tmp = TempDir::new().unwrap();
        let mut cli = cli_for(&tmp);
        cli.api_key = Some("sk".into());
        cli.pr = Some("me/flag".into());

        let err = Settings::resolve(
            cli.clone(),
            Config::default(),
            env_from(&[("GITHUB_REPO", "me/env")]),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN"));

        let settings = Settings::resolve(
            cli,
            Config::default(),
            env_from(&[("GITHUB_REPO", "me/env"), ("GITHUB_TOKEN", "ghp")]),
            None,
        )
        .unwrap();
        assert_eq!(
            settings.mode,
            PublishMode::PullRequest {
                repo: "me/flag".into(),
                token: "ghp".into()
            }
        );
    }

    #[test]
    fn repo_config_wins_when_requested() {
        let tmp = TempDir::new().unwrap();
        let mut cli = cli_for(&tmp);
        cli.api_key = Some("sk".into());
        cli.pr = Some("me/flag".into());
        cli.github_token = Some("ghp".into());
        cli.use_repo_config = true;

        let settings = Settings::resolve(
            cli,
            Config::default(),
            env_from(&[]),
            Some("org/detected".into()),
        )
        .unwrap();
        match settings.mode {
            PublishMode::PullRequest { repo, .. } => assert_eq!(repo, "org/detected"),
            other => panic!("expected PR mode, got {:?}", other),
        }
    }

    #[test]
    fn malformed_repo_slug_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut cli = cli_for(&tmp);
        cli.api_key = Some("sk".into());
        cli.pr = Some("not-a-slug".into());
        cli.github_token = Some("ghp".into());
        assert!(Settings::resolve(cli, Config::default(), env_from(&[]), None).is_err());
    }
}
