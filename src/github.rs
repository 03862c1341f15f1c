//! GitHub REST client: pull request creation only.

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::error::ServiceError;

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    html_url: String,
}

impl GithubClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("docstring-ai/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Open a pull request from `head` into `base`. Returns its web URL.
    pub async fn create_pull_request(
        &self,
        repo: &str,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/repos/{}/pulls", self.api_base, repo);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&json!({
                "title": title,
                "head": head,
                "base": base,
                "body": body,
            }))
            .send()
            .await
            .map_err(ServiceError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status, &text));
        }

        let pr: PullRequest = response
            .json()
            .await
            .map_err(|e| ServiceError::Fatal(format!("invalid pull request response: {}", e)))?;
        info!(repo, head, base, url = %pr.html_url, "pull request created");
        Ok(pr.html_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn creates_pull_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/owner/repo/pulls")
            .match_header("authorization", "Bearer ghp-test")
            .match_body(Matcher::PartialJson(json!({
                "title": "[Docstring-AI] docs",
                "head": "docs-lib",
                "base": "main"
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"number": 7, "html_url": "https://github.com/owner/repo/pull/7"}"#)
            .create_async()
            .await;

        let client = GithubClient::new(&server.url(), "ghp-test").unwrap();
        let url = client
            .create_pull_request("owner/repo", "[Docstring-AI] docs", "docs-lib", "main", "body")
            .await
            .unwrap();
        assert_eq!(url, "https://github.com/owner/repo/pull/7");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn validation_failure_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/owner/repo/pulls")
            .with_status(422)
            .with_body(r#"{"message": "Validation Failed"}"#)
            .create_async()
            .await;

        let client = GithubClient::new(&server.url(), "ghp-test").unwrap();
        let err = client
            .create_pull_request("owner/repo", "t", "h", "main", "b")
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Validation Failed"));
    }
}
