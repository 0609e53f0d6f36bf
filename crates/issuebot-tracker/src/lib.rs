//! Issue-tracker client and typed records for the issuebot workspace.
//!
//! Exposes the [`IssueTracker`] seam consumed by the bot runtime and the
//! Basic-auth [`JiraClient`] that implements it over the REST v2 API.

pub mod issue_query;
pub mod tracker_client;
pub mod tracker_error;
pub mod tracker_records;

pub use issue_query::{validate_issue_key, IssueQuery, IN_PROGRESS_STATUS};
pub use tracker_client::{IssueTracker, JiraClient, JiraClientConfig};
pub use tracker_error::TrackerError;
pub use tracker_records::{
    parse_tracker_timestamp, CreatedIssue, IssueRecord, NewIssueRequest, ProjectRef,
    NEW_ISSUE_TYPE,
};
