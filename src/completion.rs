//! Chat completion backend.
//!
//! [`OpenAiCompletion`] posts to `/chat/completions` with a strict JSON
//! schema response format, chosen by [`ResponseSchema`]. Parsing of the
//! returned content is left to the generator.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ServiceError;
use crate::openai::OpenAiClient;

/// Shape the model must answer in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseSchema {
    /// `{"code": ..., "summary": ...}`
    #[default]
    Docstrings,
    /// `{"summary": ...}`
    Description,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub schema: ResponseSchema,
}

/// The first choice of a completion, unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, ServiceError>;
}

pub struct OpenAiCompletion {
    client: OpenAiClient,
    model: String,
    temperature: f32,
}

impl OpenAiCompletion {
    pub fn new(client: OpenAiClient, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": response_schema(request.schema),
            }
        })
    }
}

fn response_schema(schema: ResponseSchema) -> Value {
    let summary = json!({
        "type": "string",
        "description": "A detailed description of what the file does."
    });
    match schema {
        ResponseSchema::Docstrings => json!({
            "name": "docstring_result",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "The complete file with docstrings added."
                    },
                    "summary": summary
                },
                "required": ["code", "summary"],
                "additionalProperties": false
            }
        }),
        ResponseSchema::Description => json!({
            "name": "file_description",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {"summary": summary},
                "required": ["summary"],
                "additionalProperties": false
            }
        }),
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ServiceError> {
        let response = self
            .client
            .post_json("chat/completions", &self.request_body(request))
            .await?;
        parse_choice(&response)
    }
}

fn parse_choice(json: &Value) -> Result<CompletionResponse, ServiceError> {
    let choice = json
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ServiceError::Fatal("completion response has no choices".into()))?;

    let message = choice.get("message");
    if let Some(refusal) = message
        .and_then(|m| m.get("refusal"))
        .and_then(|r| r.as_str())
    {
        return Err(ServiceError::Fatal(format!("model refused: {}", refusal)));
    }

    let content = message
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| ServiceError::Fatal("completion response has no content".into()))?;

    Ok(CompletionResponse {
        content: content.to_string(),
        finish_reason: choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(str::to_string),
    })
}
