//! Ledger kept in a GitHub repository, read and written via the contents API.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, info};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use super::snapshot::LedgerSnapshot;
use super::store::{LedgerStore, LedgerStoreError};
use crate::http::error_body;

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    content: UpdatedContent,
}

#[derive(Debug, Deserialize)]
struct UpdatedContent {
    sha: String,
}

/// Decode the line-wrapped base64 GitHub returns for file content
pub(crate) fn decode_content(content: &str) -> Result<String, LedgerStoreError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}

/// A ledger file on one branch of a GitHub repository.
///
/// The version is the file's blob sha; GitHub refuses an update whose `sha`
/// is no longer current.
pub struct GithubLedgerStore {
    client: Client,
    api_base: String,
    repo: String,
    path: String,
    branch: String,
    token: String,
}

impl GithubLedgerStore {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repo: repo.into(),
            path: path.into(),
            branch: branch.into(),
            token: token.into(),
        }
    }

    fn contents_url(&self) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, self.repo, self.path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, LedgerStoreError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LedgerStoreError::Api {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }
        Ok(response.json().await?)
    }

    async fn fetch_blob(&self, sha: &str) -> Result<String, LedgerStoreError> {
        let url = format!("{}/repos/{}/git/blobs/{}", self.api_base, self.repo, sha);
        let blob: BlobResponse = self.send_json(self.client.get(url)).await?;
        decode_content(&blob.content)
    }
}

#[async_trait]
impl LedgerStore for GithubLedgerStore {
    fn describe(&self) -> String {
        format!("github {}:{}@{}", self.repo, self.path, self.branch)
    }

    async fn load(&self) -> Result<LedgerSnapshot, LedgerStoreError> {
        let request = self
            .client
            .get(self.contents_url())
            .query(&[("ref", self.branch.as_str())]);
        let contents: ContentsResponse = self.send_json(request).await?;

        // Files over the inline limit come back without content.
        let document = if contents.encoding == "base64" && !contents.content.is_empty() {
            decode_content(&contents.content)?
        } else {
            debug!("Ledger content not inline, fetching blob {}", contents.sha);
            self.fetch_blob(&contents.sha).await?
        };

        Ok(LedgerSnapshot::parse(contents.sha, &document)?)
    }

    async fn replace(
        &self,
        expected_version: &str,
        document: &str,
        message: &str,
    ) -> Result<String, LedgerStoreError> {
        let body = UpdateRequest {
            message,
            content: STANDARD.encode(document),
            sha: expected_version,
            branch: &self.branch,
        };
        let response = self
            .authorized(self.client.put(self.contents_url()).json(&body))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            debug!("GitHub rejected update: {}", error_body(response).await);
            return Err(LedgerStoreError::Conflict {
                expected: expected_version.to_string(),
            });
        }
        if !status.is_success() {
            return Err(LedgerStoreError::Api {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        let updated: UpdateResponse = response.json().await?;
        info!(
            "Updated {} from {} to {}",
            self.describe(),
            expected_version,
            updated.content.sha
        );
        Ok(updated.content.sha)
    }
}
