//! Basic-auth REST client for the Jira v2 API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::tracker_records::{RawCreatedIssue, RawIssue, RawSearchResponse};
use crate::{
    validate_issue_key, CreatedIssue, IssueQuery, IssueRecord, NewIssueRequest, ProjectRef,
    TrackerError, NEW_ISSUE_TYPE,
};

const REST_API_PATH: &str = "/rest/api/2";
const ERROR_BODY_MAX_CHARS: usize = 800;

#[async_trait]
/// Operations the bot needs from an issue tracker.
pub trait IssueTracker: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<ProjectRef>, TrackerError>;

    async fn search_issues(&self, query: &IssueQuery) -> Result<Vec<IssueRecord>, TrackerError>;

    async fn fetch_issue(&self, key: &str) -> Result<IssueRecord, TrackerError>;

    async fn create_issue(&self, request: &NewIssueRequest) -> Result<CreatedIssue, TrackerError>;

    async fn add_comment(&self, key: &str, body: &str) -> Result<(), TrackerError>;

    /// Human-facing link for an issue key.
    fn browse_url(&self, key: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct JiraClientConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    api_base: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl JiraClient {
    pub fn new(config: JiraClientConfig) -> Result<Self, TrackerError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(TrackerError::InvalidRequest(
                "tracker base url cannot be empty".to_string(),
            ));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("issuebot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| TrackerError::Http {
                operation: "client setup".to_string(),
                source,
            })?;

        Ok(Self {
            http,
            api_base: format!("{base_url}{REST_API_PATH}"),
            base_url,
            username: config.username,
            password: config.password,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{path}", self.api_base))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{path}", self.api_base))
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Sends one request (no retries) and decodes a successful JSON body.
    async fn request_json<T>(
        &self,
        operation: &str,
        not_found_key: Option<&str>,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await.map_err(|source| TrackerError::Http {
            operation: operation.to_string(),
            source,
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| TrackerError::Http {
            operation: operation.to_string(),
            source,
        })?;
        tracing::debug!(
            operation,
            status = status.as_u16(),
            bytes = body.len(),
            "tracker request finished"
        );

        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(key) = not_found_key {
                return Err(TrackerError::NotFound {
                    resource: "issue",
                    key: key.to_string(),
                });
            }
        }
        if !status.is_success() {
            return Err(TrackerError::HttpStatus {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: truncate_for_error(&body, ERROR_BODY_MAX_CHARS),
            });
        }

        serde_json::from_str::<T>(&body)
            .map_err(|error| TrackerError::decode(operation, error.to_string()))
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn list_projects(&self) -> Result<Vec<ProjectRef>, TrackerError> {
        self.request_json("list projects", None, self.get("/project"))
            .await
    }

    async fn search_issues(&self, query: &IssueQuery) -> Result<Vec<IssueRecord>, TrackerError> {
        let operation = "search issues";
        let mut request = self.get("/search").query(&[("jql", query.jql())]);
        if let Some(max_results) = query.max_results() {
            request = request.query(&[("maxResults", max_results.to_string())]);
        }
        let response: RawSearchResponse = self.request_json(operation, None, request).await?;
        response
            .issues
            .into_iter()
            .map(|issue| issue.into_record(operation))
            .collect()
    }

    async fn fetch_issue(&self, key: &str) -> Result<IssueRecord, TrackerError> {
        let operation = "fetch issue";
        let key = validate_issue_key(key)?;
        let raw: RawIssue = self
            .request_json(operation, Some(key), self.get(&format!("/issue/{key}")))
            .await?;
        raw.into_record(operation)
    }

    async fn create_issue(&self, request: &NewIssueRequest) -> Result<CreatedIssue, TrackerError> {
        let payload = json!({
            "fields": {
                "project": { "key": request.project_key },
                "summary": request.summary,
                "description": request.description,
                "issuetype": { "name": NEW_ISSUE_TYPE },
            }
        });
        let created: RawCreatedIssue = self
            .request_json("create issue", None, self.post("/issue").json(&payload))
            .await?;
        Ok(created.into())
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<(), TrackerError> {
        if body.trim().is_empty() {
            return Err(TrackerError::InvalidRequest(
                "comment body cannot be empty".to_string(),
            ));
        }
        let key = validate_issue_key(key)?;
        let _created: serde_json::Value = self
            .request_json(
                "create comment",
                Some(key),
                self.post(&format!("/issue/{key}/comment"))
                    .json(&json!({ "body": body })),
            )
            .await?;
        Ok(())
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.base_url)
    }
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
