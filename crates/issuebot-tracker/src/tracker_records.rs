//! Typed projections of issue-tracker REST payloads.
//!
//! Raw wire shapes stay private to this module; callers only see the validated
//! records, so a payload missing a required field fails at decode time instead
//! of leaking half-populated data into rendering.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::TrackerError;

const JIRA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Snapshot of a tracker project taken at fetch time.
pub struct ProjectRef {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Read-only view of a tracker issue used for rendering and status polling.
pub struct IssueRecord {
    pub key: String,
    pub reporter_display_name: String,
    pub summary: String,
    pub status: String,
    pub updated_at: DateTime<FixedOffset>,
    pub assignee_display_name: Option<String>,
    pub self_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
    pub self_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Fields for a new issue; the issue type is always `Task`.
pub struct NewIssueRequest {
    pub project_key: String,
    pub summary: String,
    pub description: String,
}

pub const NEW_ISSUE_TYPE: &str = "Task";

#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchResponse {
    #[serde(default)]
    pub(crate) issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawIssue {
    key: String,
    #[serde(rename = "self", default)]
    self_url: Option<String>,
    fields: RawIssueFields,
}

#[derive(Debug, Deserialize)]
struct RawIssueFields {
    status: RawNamed,
    summary: String,
    updated: String,
    #[serde(default)]
    assignee: Option<RawUser>,
    creator: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    display_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCreatedIssue {
    id: String,
    key: String,
    #[serde(rename = "self", default)]
    self_url: Option<String>,
}

impl RawIssue {
    pub(crate) fn into_record(self, operation: &str) -> Result<IssueRecord, TrackerError> {
        let updated_at = parse_tracker_timestamp(&self.fields.updated).ok_or_else(|| {
            TrackerError::decode(
                operation,
                format!(
                    "issue {} has unparseable updated timestamp '{}'",
                    self.key, self.fields.updated
                ),
            )
        })?;
        Ok(IssueRecord {
            key: self.key,
            reporter_display_name: self.fields.creator.display_name,
            summary: self.fields.summary,
            status: self.fields.status.name,
            updated_at,
            assignee_display_name: self.fields.assignee.map(|user| user.display_name),
            self_url: self.self_url.filter(|value| !value.trim().is_empty()),
        })
    }
}

impl From<RawCreatedIssue> for CreatedIssue {
    fn from(raw: RawCreatedIssue) -> Self {
        Self {
            id: raw.id,
            key: raw.key,
            self_url: raw.self_url,
        }
    }
}

/// Parses the tracker's `2024-03-01T10:15:30.000+0000` timestamps, falling back to RFC 3339.
pub fn parse_tracker_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    DateTime::parse_from_str(trimmed, JIRA_TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .ok()
}
