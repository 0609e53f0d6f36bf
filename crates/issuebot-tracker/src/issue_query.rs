use crate::TrackerError;

pub const IN_PROGRESS_STATUS: &str = "In Progress";
pub const PROJECT_SEARCH_MAX_RESULTS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates the JQL searches the bot issues.
pub enum IssueQuery {
    InProgressForProject { project_code: String },
    InProgressForAssignee { username: String },
}

impl IssueQuery {
    pub fn jql(&self) -> String {
        match self {
            Self::InProgressForProject { project_code } => {
                format!("project={project_code} AND status=\"{IN_PROGRESS_STATUS}\"")
            }
            Self::InProgressForAssignee { username } => {
                format!("status=\"{IN_PROGRESS_STATUS}\" AND assignee={username}")
            }
        }
    }

    pub fn max_results(&self) -> Option<u32> {
        match self {
            Self::InProgressForProject { .. } => Some(PROJECT_SEARCH_MAX_RESULTS),
            Self::InProgressForAssignee { .. } => None,
        }
    }
}

/// Checks that `key` looks like `PROJ-123` before it is placed in a URL path,
/// returning it trimmed.
pub fn validate_issue_key(key: &str) -> Result<&str, TrackerError> {
    let key = key.trim();
    let well_formed = key.rsplit_once('-').is_some_and(|(project, number)| {
        let mut project_chars = project.chars();
        project_chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic())
            && project_chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            && !number.is_empty()
            && number.chars().all(|ch| ch.is_ascii_digit())
    });
    if well_formed {
        Ok(key)
    } else {
        Err(TrackerError::InvalidRequest(format!("malformed issue key '{key}'")))
    }
}
