//! Prompt construction for docstring generation.

use std::collections::BTreeSet;

pub const SYSTEM_PROMPT: &str = "You are a senior Python engineer who writes clear, accurate docstrings. \
You add or improve docstrings for modules, classes, and functions. \
You never change executable code: no renames, no reformatting, no reordering, no new imports. \
Reply with JSON only, matching the requested schema.";

/// Everything the model sees for one file.
#[derive(Debug, Clone, Default)]
pub struct PromptInput<'a> {
    pub path: &'a str,
    pub source: &'a str,
    pub project_tree: &'a str,
    /// What earlier runs learned about this file.
    pub own_summary: &'a str,
    /// Rendered summaries of related units.
    pub related: &'a str,
}

pub fn build_user_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = String::new();

    if !input.project_tree.is_empty() {
        prompt.push_str("## Project structure\n```\n");
        prompt.push_str(input.project_tree);
        prompt.push_str("```\n\n");
    }

    if !input.own_summary.trim().is_empty() {
        prompt.push_str("## What is known about this file\n");
        prompt.push_str(input.own_summary.trim());
        prompt.push_str("\n\n");
    }

    if !input.related.trim().is_empty() {
        prompt.push_str("## Related code summaries\n");
        prompt.push_str(input.related.trim_end());
        prompt.push_str("\n\n");
    }

    prompt.push_str(&format!(
        "## Task\nAdd appropriate docstrings to `{}`. Ensure that all functions, classes, and the module \
have clear and concise docstrings explaining their purpose, parameters, return values, and any exceptions raised. \
Return the complete file in `code` and a detailed description of what the file does in `summary`.\n\n",
        input.path
    ));
    prompt.push_str("```python\n");
    prompt.push_str(input.source);
    if !input.source.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```\n");
    prompt
}

/// Prompt for a standalone description of a file, used to seed knowledge
/// before any docstrings are written.
pub fn build_description_prompt(path: &str, source: &str, project_tree: &str) -> String {
    let mut prompt = String::new();
    if !project_tree.is_empty() {
        prompt.push_str("## Project structure\n```\n");
        prompt.push_str(project_tree);
        prompt.push_str("```\n\n");
    }
    prompt.push_str(&format!(
        "## Task\nDescribe `{}` in detail: its purpose, its main classes and functions, \
and how it relates to the rest of the project. Return the description in `summary`.\n\n",
        path
    ));
    prompt.push_str("```python\n");
    prompt.push_str(source);
    if !source.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```\n");
    prompt
}

/// Indented directory tree of `paths` (repo-relative, `/`-separated).
pub fn render_tree(paths: &[String]) -> String {
    // Component-wise keys keep a folder's children next to it.
    let mut entries: BTreeSet<(Vec<&str>, bool)> = BTreeSet::new();
    for path in paths {
        let parts: Vec<&str> = path.split('/').collect();
        for depth in 1..parts.len() {
            entries.insert((parts[..depth].to_vec(), true));
        }
        entries.insert((parts, false));
    }

    let mut out = String::new();
    for (parts, is_dir) in &entries {
        let Some(name) = parts.last() else {
            continue;
        };
        out.push_str(&"  ".repeat(parts.len() - 1));
        out.push_str(name);
        if *is_dir {
            out.push('/');
        }
        out.push('\n');
    }
    out
}
