//! Run orchestration.
//!
//! Coordinates one run over a repository:
//! scan → order → describe files with no summary yet → per file {hash →
//! cache check → context → generate → review → write or stage} → publish
//! pull requests → report.
//!
//! Files are processed sequentially so that knowledge accumulated from one
//! file is visible to the next. A failure on one file is recorded in the
//! report and the run moves on.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cache::{self, CacheStore};
use crate::completion::{CompletionService, OpenAiCompletion};
use crate::config::{PublishMode, Settings};
use crate::context::{self, ContextRetriever};
use crate::embedding::{DisabledEmbedder, Embedder, OpenAiEmbedder};
use crate::generator::{DocstringGenerator, GenerationContext, GenerationOutcome};
use crate::git::GitRepo;
use crate::github::GithubClient;
use crate::hasher;
use crate::knowledge::{self, KnowledgeStore};
use crate::models::{ApprovalStatus, FileOutcome, PendingChange};
use crate::openai::OpenAiClient;
use crate::progress::{self, ProgressEvent, ProgressReporter};
use crate::prompt;
use crate::publish::{self, BranchSources, GroupOutcome, PrPublisher};
use crate::python;
use crate::report::RunReport;
use crate::review::{self, Reviewer, TerminalReviewer};
use crate::scan::{self, ScannedFile};
use crate::state::{self, RunLock};

/// Longest file prefix sent to the embedding service as a query.
const MAX_QUERY_CHARS: usize = 8_000;

/// External collaborators of a run. Tests swap in fakes.
pub struct Services {
    pub completion: Arc<dyn CompletionService>,
    pub embedder: Arc<dyn Embedder>,
    pub reviewer: Box<dyn Reviewer>,
    pub github: Option<GithubClient>,
    pub progress: Box<dyn ProgressReporter>,
}

impl Services {
    /// OpenAI and GitHub clients plus the interactive reviewer.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let openai = &settings.config.openai;
        let client = OpenAiClient::new(&settings.api_key, openai)?;

        let embedder: Arc<dyn Embedder> = if settings.config.context.enabled {
            Arc::new(OpenAiEmbedder::new(client.clone(), &openai.embedding_model))
        } else {
            Arc::new(DisabledEmbedder)
        };

        let github = match &settings.mode {
            PublishMode::PullRequest { token, .. } => {
                Some(GithubClient::new(&settings.config.github.api_base, token)?)
            }
            PublishMode::DirectWrite => None,
        };

        Ok(Self {
            completion: Arc::new(OpenAiCompletion::new(
                client,
                &openai.model,
                openai.temperature,
            )),
            embedder,
            reviewer: Box::new(TerminalReviewer),
            github,
            progress: progress::default_reporter(),
        })
    }
}

struct Run<'a> {
    settings: &'a Settings,
    services: &'a Services,
    cache: CacheStore,
    knowledge: KnowledgeStore,
    retriever: ContextRetriever,
    generator: DocstringGenerator,
    git: GitRepo,
    project_tree: String,
}

pub async fn run(settings: &Settings, services: Services) -> Result<RunReport> {
    let services = &services;
    let state_dir = settings.state_dir();
    let _lock = RunLock::acquire(&state_dir)?;
    let pool = state::open(&state_dir).await?;

    let cache = CacheStore::new(pool.clone());
    let knowledge = KnowledgeStore::new(pool.clone());

    if settings.no_cache && !settings.dry_run {
        let cleared = cache.clear().await?;
        knowledge.clear().await?;
        info!(records = cleared, "cleared cache and accumulated knowledge");
    }

    let mut files = scan::scan(&settings.root, &settings.config.files)?;
    let policy = scan::policy_from_name(&settings.config.run.ordering)?;
    policy.order(&mut files)?;
    info!(files = files.len(), ordering = policy.name(), "scan complete");
    services.progress.report(ProgressEvent::Scanned { total: files.len() });

    let git = GitRepo::new(&settings.root);
    let target_branch = prepare_publishing(settings, services, &git)?;

    let paths: Vec<String> = files.iter().map(|f| f.rel_path.clone()).collect();
    let run = Run {
        settings,
        services,
        cache,
        knowledge,
        retriever: ContextRetriever::new(
            pool.clone(),
            services.embedder.clone(),
            settings.config.context.top_k,
        ),
        generator: DocstringGenerator::new(services.completion.clone()),
        git,
        project_tree: prompt::render_tree(&paths),
    };

    if settings.config.context.enabled && !settings.dry_run {
        run.describe_missing(&files).await?;
    }

    let mut report = RunReport {
        dry_run: settings.dry_run,
        ..Default::default()
    };
    let mut staged: Vec<PendingChange> = Vec::new();
    let total = files.len();

    for (i, file) in files.iter().enumerate() {
        services.progress.report(ProgressEvent::Started {
            path: &file.rel_path,
            n: i + 1,
            total,
        });

        let outcome = match run.process_file(file, &mut staged, &mut report).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(path = %file.rel_path, error = %reason, "file failed");
                FileOutcome::Failed(reason)
            }
        };

        services.progress.report(ProgressEvent::Finished {
            path: &file.rel_path,
            outcome: &outcome,
        });
        report.record(&file.rel_path, outcome);
    }

    if let Some(target) = target_branch {
        run.publish_staged(&staged, &target, &mut report).await?;
    }

    pool.close().await;
    Ok(report)
}

/// Checks that publishing can work before any file is touched. Returns the
/// target branch in PR mode.
fn prepare_publishing(
    settings: &Settings,
    services: &Services,
    git: &GitRepo,
) -> Result<Option<String>> {
    if settings.dry_run {
        return Ok(None);
    }

    match &settings.mode {
        PublishMode::PullRequest { repo, .. } => {
            if !git.is_work_tree() {
                bail!(
                    "Pull request mode needs a git work tree, but {} is not one.",
                    settings.root.display()
                );
            }
            if services.github.is_none() {
                bail!("Pull request mode needs a GitHub client");
            }
            // Each group starts from and returns to this branch
            let current = git
                .current_branch()
                .context("Pull request mode needs a checked-out branch")?;
            let github = &settings.config.github;
            let target = publish::resolve_target_branch(BranchSources {
                use_repo_config: settings.use_repo_config,
                detected: git.default_branch(&github.remote),
                explicit: settings.target_branch.clone(),
                configured: github.default_target_branch.clone(),
                current: Some(current),
            })
            .context("Could not determine a target branch; pass --target-branch")?;
            info!(repo = %repo, target = %target, "pull request mode");
            Ok(Some(target))
        }
        PublishMode::DirectWrite => {
            if !settings.yes && !git.is_work_tree() {
                let question = format!(
                    "{} is not a git repository. Files will be overwritten in place (with .bak backups). Do you wish to continue?",
                    settings.root.display()
                );
                if !services.reviewer.confirm(&question)? {
                    bail!("Aborted: direct write declined");
                }
            }
            Ok(None)
        }
    }
}

impl Run<'_> {
    async fn process_file(
        &self,
        file: &ScannedFile,
        staged: &mut Vec<PendingChange>,
        report: &mut RunReport,
    ) -> Result<FileOutcome> {
        let path = file.rel_path.as_str();
        let bytes = std::fs::read(&file.abs_path)
            .with_context(|| format!("Failed to read {}", file.abs_path.display()))?;
        let fingerprint = hasher::fingerprint(&bytes);

        if !self.settings.no_cache {
            let record = self.cache.lookup(path).await?;
            if cache::is_fresh(record.as_ref(), &fingerprint) {
                return Ok(FileOutcome::Cached);
            }
        }
        if self.settings.dry_run {
            return Ok(FileOutcome::Generated);
        }

        let original = String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path))?;
        let context = GenerationContext {
            path: path.to_string(),
            project_tree: self.project_tree.clone(),
            own_summary: self.knowledge.get(path).await?,
            related: self.related_context(path, &original).await,
        };

        let (proposed, summary) = match self.generator.generate(&original, &context).await {
            GenerationOutcome::Generated { content, summary } => (content, summary),
            GenerationOutcome::Unchanged { summary } => {
                self.cache.store(path, &fingerprint, &original).await?;
                self.accumulate(path, &summary, &original, &fingerprint).await?;
                return Ok(FileOutcome::Unchanged);
            }
            GenerationOutcome::Malformed(reason) => {
                warn!(path, %reason, "discarding malformed response, keeping original");
                return Ok(FileOutcome::Failed(format!("malformed response: {}", reason)));
            }
            GenerationOutcome::Failed(e) => {
                error!(path, error = %e, "generation failed");
                return Ok(FileOutcome::Failed(e.to_string()));
            }
        };

        let mut change = PendingChange::new(path, original, proposed);
        change.status = if self.settings.manual {
            let diff = review::unified_diff(&change.original, &change.proposed);
            if self.services.reviewer.review(path, &diff)? {
                ApprovalStatus::Approved
            } else {
                ApprovalStatus::Rejected
            }
        } else {
            ApprovalStatus::Approved
        };
        if change.status == ApprovalStatus::Rejected {
            info!(path, "change rejected");
            return Ok(FileOutcome::Rejected);
        }

        let proposed_fingerprint = hasher::fingerprint(change.proposed.as_bytes());
        match self.settings.mode {
            PublishMode::DirectWrite => {
                if let Some(backup) = publish::write_direct(&self.settings.root, &change, &self.git)? {
                    report.backups.push(backup.display().to_string());
                }
                self.cache
                    .store(path, &proposed_fingerprint, &change.proposed)
                    .await?;
            }
            // Cached once the pull request is open
            PublishMode::PullRequest { .. } => {}
        }

        self.accumulate(path, &summary, &change.proposed, &proposed_fingerprint)
            .await?;
        if matches!(self.settings.mode, PublishMode::PullRequest { .. }) {
            staged.push(change);
        }
        Ok(FileOutcome::Generated)
    }

    /// Seed knowledge with a description of every file that has none, so
    /// the first files processed already see the rest of the project.
    async fn describe_missing(&self, files: &[ScannedFile]) -> Result<()> {
        let mut described = 0;
        for file in files {
            let path = file.rel_path.as_str();
            if self.knowledge.get_summary(path).await?.is_some() {
                continue;
            }
            let bytes = match std::fs::read(&file.abs_path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path, error = %e, "cannot read file for description");
                    continue;
                }
            };
            let Ok(source) = String::from_utf8(bytes) else {
                continue;
            };

            info!(path, "generating file description");
            match self
                .generator
                .describe(path, &source, &self.project_tree)
                .await
            {
                Ok(description) => {
                    let fingerprint = hasher::fingerprint(source.as_bytes());
                    let summary = self.knowledge.update(path, &description, &fingerprint).await?;
                    self.retriever.index(&summary).await;
                    described += 1;
                }
                Err(e) => warn!(path, error = %e, "file description failed, continuing without it"),
            }
        }
        if described > 0 {
            info!(files = described, "described files missing from knowledge");
        }
        Ok(())
    }

    async fn related_context(&self, path: &str, source: &str) -> String {
        if !self.settings.config.context.enabled {
            return String::new();
        }
        let query: String = source.chars().take(MAX_QUERY_CHARS).collect();
        let related = self.retriever.retrieve(path, &query).await;
        context::render_context(&related, self.settings.config.context.max_context_chars)
    }

    /// Fold the module summary and class docstrings of `source` into the
    /// knowledge store and index what changed.
    async fn accumulate(
        &self,
        path: &str,
        summary: &str,
        source: &str,
        fingerprint: &str,
    ) -> Result<()> {
        let mut updated = vec![self.knowledge.update(path, summary, fingerprint).await?];

        for class in python::parse_classes(source) {
            let Some(doc) = python::class_docstring(source, &class.name) else {
                continue;
            };
            let mut line = python::first_line(&doc).to_string();
            if !class.bases.is_empty() {
                line = format!("{} (extends {})", line, class.bases.join(", "));
            }
            let unit = knowledge::class_unit_id(path, &class.name);
            updated.push(self.knowledge.update(&unit, &line, fingerprint).await?);
        }

        if self.settings.config.context.enabled {
            for summary in &updated {
                self.retriever.index(summary).await;
            }
        }
        Ok(())
    }

    async fn publish_staged(
        &self,
        staged: &[PendingChange],
        target: &str,
        report: &mut RunReport,
    ) -> Result<()> {
        let (PublishMode::PullRequest { repo, .. }, Some(github)) =
            (&self.settings.mode, self.services.github.as_ref())
        else {
            return Ok(());
        };
        if staged.is_empty() {
            info!("no approved changes to publish");
            return Ok(());
        }

        let groups = publish::group_changes(
            staged,
            self.settings.pr_depth,
            target,
            &self.settings.branch_name,
        );
        let publisher = PrPublisher {
            git: &self.git,
            github,
            repo,
            remote: &self.settings.config.github.remote,
            pr_name: self.settings.pr_name.as_deref(),
        };
        let reviewer = self.settings.manual.then_some(self.services.reviewer.as_ref());
        let results = publisher.publish(&groups, staged, reviewer).await?;

        let by_path: HashMap<&str, &PendingChange> =
            staged.iter().map(|c| (c.path.as_str(), c)).collect();
        for result in &results {
            for path in &result.group.files {
                let outcome = match &result.outcome {
                    GroupOutcome::Opened { .. } => {
                        if let Some(change) = by_path.get(path.as_str()) {
                            let fingerprint = hasher::fingerprint(change.original.as_bytes());
                            self.cache.store(path, &fingerprint, &change.proposed).await?;
                        }
                        continue;
                    }
                    GroupOutcome::Declined => FileOutcome::Rejected,
                    GroupOutcome::Failed(e) => FileOutcome::Failed(format!("publish failed: {}", e)),
                };
                if let Some(entry) = report.files.iter_mut().find(|(p, _)| p == path) {
                    entry.1 = outcome;
                }
            }
        }
        report.groups = results;
        Ok(())
    }
}
