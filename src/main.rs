//! # Docstring-AI CLI (`docstring-ai`)
//!
//! ## Usage
//!
//! ```bash
//! # Document files in place
//! docstring-ai --path ./my-project --api_key sk-...
//!
//! # Review every diff, then open one pull request per top-level folder
//! docstring-ai --path ./my-project --manual --pr owner/repo --pr-depth 1
//!
//! # See what would be sent to the model
//! docstring-ai --path ./my-project --dry-run
//! ```
//!
//! Credentials fall back to `OPENAI_API_KEY`, `GITHUB_TOKEN`, and
//! `GITHUB_REPO`, also read from a `.env` file in the working directory.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use docstring_ai::config::{self, CliOptions, Settings};
use docstring_ai::git::GitRepo;
use docstring_ai::logging;
use docstring_ai::pipeline::{self, Services};

/// Docstring-AI: add docstrings to a repository with an LLM.
#[derive(Parser)]
#[command(
    name = "docstring-ai",
    version,
    about = "Add docstrings to a code repository with an LLM, with caching, context retrieval, and pull requests"
)]
struct Cli {
    /// Root directory of the repository to scan.
    #[arg(long)]
    path: PathBuf,

    /// OpenAI API key. Defaults to OPENAI_API_KEY.
    #[arg(long = "api_key", visible_alias = "api-key")]
    api_key: Option<String>,

    /// GitHub repository (`owner/repo`) to open pull requests against.
    /// Defaults to GITHUB_REPO.
    #[arg(long)]
    pr: Option<String>,

    /// Branch the pull requests target.
    #[arg(long)]
    target_branch: Option<String>,

    /// GitHub token. Defaults to GITHUB_TOKEN.
    #[arg(long)]
    github_token: Option<String>,

    /// Base name for created branches.
    #[arg(long)]
    branch_name: Option<String>,

    /// Pull request title, after the `[Docstring-AI]` prefix.
    #[arg(long)]
    pr_name: Option<String>,

    /// Folder depth used to group files into pull requests (0 = one per file).
    #[arg(long, default_value_t = 2)]
    pr_depth: usize,

    /// Review each diff and confirm each pull request.
    #[arg(long)]
    manual: bool,

    /// Prefer the local git configuration for repository and target branch.
    #[arg(long)]
    use_repo_config: bool,

    /// Clear the cache and accumulated knowledge before running.
    #[arg(long)]
    no_cache: bool,

    /// Configuration file (TOML). Defaults to `<path>/docstring-ai.toml`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not ask before overwriting files outside a git repository.
    #[arg(long, short = 'y')]
    yes: bool,

    /// Classify files as cached or to-generate without calling any service.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.path.join(config::DEFAULT_CONFIG_FILE));
    let cfg = config::load_config(&config_path)?;

    let detected_repo = if cli.use_repo_config && cli.path.is_dir() {
        GitRepo::new(&cli.path).repo_slug(&cfg.github.remote)
    } else {
        None
    };

    let options = CliOptions {
        path: cli.path,
        api_key: cli.api_key,
        pr: cli.pr,
        target_branch: cli.target_branch,
        github_token: cli.github_token,
        branch_name: cli.branch_name,
        pr_name: cli.pr_name,
        pr_depth: cli.pr_depth,
        manual: cli.manual,
        use_repo_config: cli.use_repo_config,
        no_cache: cli.no_cache,
        yes: cli.yes,
        dry_run: cli.dry_run,
    };
    let settings = Settings::resolve(options, cfg, |key| std::env::var(key).ok(), detected_repo)?;

    let _guard = logging::init(&settings.state_dir())?;
    info!(root = %settings.root.display(), mode = settings.mode_name(), "starting run");

    let services = Services::from_settings(&settings)?;
    let report = pipeline::run(&settings, services).await?;
    print!("{}", report);

    Ok(())
}
