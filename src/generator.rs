//! Docstring generation: one prompt and one completion call per file.
//!
//! The model answers with `{"code": ..., "summary": ...}`. The answer is
//! parsed strictly, the header comment is ensured, and the result is rejected
//! if its executable code differs from the original in any line.

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::completion::{CompletionRequest, CompletionService, ResponseSchema};
use crate::error::ServiceError;
use crate::prompt::{self, PromptInput};
use crate::python;

/// Inputs besides the file text.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    pub path: String,
    pub project_tree: String,
    pub own_summary: String,
    pub related: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated { content: String, summary: String },
    /// The model returned the file as it was. Carries the summary.
    Unchanged { summary: String },
    Malformed(String),
    Failed(ServiceError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DocstringResult {
    code: String,
    summary: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DescriptionResult {
    summary: String,
}

pub struct DocstringGenerator {
    service: Arc<dyn CompletionService>,
}

impl DocstringGenerator {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    pub async fn generate(&self, file_content: &str, context: &GenerationContext) -> GenerationOutcome {
        let request = CompletionRequest {
            system: prompt::SYSTEM_PROMPT.to_string(),
            user: prompt::build_user_prompt(&PromptInput {
                path: &context.path,
                source: file_content,
                project_tree: &context.project_tree,
                own_summary: &context.own_summary,
                related: &context.related,
            }),
            schema: ResponseSchema::Docstrings,
        };

        let response = match self.service.complete(&request).await {
            Ok(r) => r,
            Err(e) => return GenerationOutcome::Failed(e),
        };

        if response.finish_reason.as_deref() == Some("length") {
            return GenerationOutcome::Malformed("completion was truncated".to_string());
        }

        let parsed: DocstringResult = match serde_json::from_str(response.content.trim()) {
            Ok(p) => p,
            Err(e) => return GenerationOutcome::Malformed(format!("invalid response JSON: {}", e)),
        };

        interpret(file_content, parsed)
    }

    /// Ask for a description of a file without touching it.
    pub async fn describe(
        &self,
        path: &str,
        file_content: &str,
        project_tree: &str,
    ) -> Result<String, ServiceError> {
        let request = CompletionRequest {
            system: prompt::SYSTEM_PROMPT.to_string(),
            user: prompt::build_description_prompt(path, file_content, project_tree),
            schema: ResponseSchema::Description,
        };
        let response = self.service.complete(&request).await?;
        if response.finish_reason.as_deref() == Some("length") {
            return Err(ServiceError::Fatal("description was truncated".into()));
        }
        let parsed: DescriptionResult = serde_json::from_str(response.content.trim())
            .map_err(|e| ServiceError::Fatal(format!("invalid description JSON: {}", e)))?;
        let summary = parsed.summary.trim();
        if summary.is_empty() {
            return Err(ServiceError::Fatal("empty description".into()));
        }
        Ok(summary.to_string())
    }
}

fn interpret(original: &str, result: DocstringResult) -> GenerationOutcome {
    let code = python::strip_code_fence(&result.code);
    if code.trim().is_empty() {
        return GenerationOutcome::Malformed("response contained no code".to_string());
    }

    if code.trim_end() == original.trim_end() {
        return GenerationOutcome::Unchanged {
            summary: result.summary,
        };
    }

    if let Err(reason) = python::check_code_preserved(original, code) {
        return GenerationOutcome::Malformed(reason);
    }

    let mut content = python::ensure_header(code);
    if original.ends_with('\n') && !content.ends_with('\n') {
        content.push('\n');
    }
    debug!(bytes = content.len(), "generated docstrings");

    GenerationOutcome::Generated {
        content,
        summary: result.summary,
    }
}
