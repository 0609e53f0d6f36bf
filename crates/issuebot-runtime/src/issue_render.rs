//! Display-text rendering for issue lists, status changes, and created issues.

use chrono::{DateTime, FixedOffset, Utc};
use issuebot_tracker::IssueRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Issue lines that share one reporter, in the order they were seen.
pub struct ReporterGroup {
    pub reporter: String,
    pub lines: Vec<String>,
}

impl ReporterGroup {
    fn render(&self) -> String {
        let mut rendered = format!("\n{}\n", self.reporter);
        for line in &self.lines {
            rendered.push_str(line);
            rendered.push('\n');
        }
        rendered
    }
}

/// Humanizes the distance between `then` and `now` ("5 minutes ago").
pub fn format_relative_time(then: DateTime<FixedOffset>, now: DateTime<Utc>) -> String {
    let elapsed_secs = now
        .signed_duration_since(then.with_timezone(&Utc))
        .num_seconds();
    let in_future = elapsed_secs < 0;
    let seconds = elapsed_secs.unsigned_abs() as f64;
    let minutes = (seconds / 60.0).round();
    let hours = (seconds / 3_600.0).round();
    let days = (seconds / 86_400.0).round();
    let months = (seconds / (86_400.0 * 30.4375)).round();
    let years = (seconds / (86_400.0 * 365.25)).round();

    let phrase = if seconds < 45.0 {
        "a few seconds".to_string()
    } else if seconds < 90.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{minutes} minutes")
    } else if minutes < 90.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{hours} hours")
    } else if hours < 36.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{days} days")
    } else if days < 46.0 {
        "a month".to_string()
    } else if days < 320.0 {
        format!("{} months", months.max(2.0))
    } else if days < 548.0 {
        "a year".to_string()
    } else {
        format!("{} years", years.max(2.0))
    };

    if in_future {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

/// `<age> - [<key>](<url>) : <summary>[ (assignee <name>)]`
pub fn render_issue_line(issue: &IssueRecord, browse_url: &str, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "{} - [{}]({}) : {}",
        format_relative_time(issue.updated_at, now),
        issue.key,
        browse_url,
        issue.summary
    );
    if let Some(assignee) = issue.assignee_display_name.as_deref() {
        line.push_str(&format!(" (assignee {assignee})"));
    }
    line
}

/// `<status> - [<key>](<url>) : <summary>`, linking the API self url when present.
pub fn render_status_change(issue: &IssueRecord, browse_url: &str) -> String {
    let url = issue.self_url.as_deref().unwrap_or(browse_url);
    format!("{} - [{}]({}) : {}", issue.status, issue.key, url, issue.summary)
}

pub fn render_created_issue(key: &str, browse_url: &str, title: &str) -> String {
    format!("[{key}]({browse_url}) : {title}")
}

/// Groups `(reporter, line)` pairs by reporter, keeping first-seen reporter order.
pub fn group_by_reporter<I>(rows: I) -> Vec<ReporterGroup>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut groups: Vec<ReporterGroup> = Vec::new();
    for (reporter, line) in rows {
        match groups.iter_mut().find(|group| group.reporter == reporter) {
            Some(group) => group.lines.push(line),
            None => groups.push(ReporterGroup {
                reporter,
                lines: vec![line],
            }),
        }
    }
    groups
}

/// Packs rendered groups into message blocks of at most `max_chars` characters.
///
/// A group never splits across blocks, so one oversized group becomes its own
/// oversized block. Empty blocks are dropped.
pub fn paginate_groups(groups: &[ReporterGroup], max_chars: usize) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0_usize;
    for group in groups {
        let rendered = group.render();
        let rendered_chars = rendered.chars().count();
        if current_chars + rendered_chars > max_chars && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(&rendered);
        current_chars += rendered_chars;
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Renders `issues` grouped by reporter and split into message blocks.
pub fn render_grouped_issues<F>(
    issues: &[IssueRecord],
    browse_url: F,
    now: DateTime<Utc>,
    max_chars: usize,
) -> Vec<String>
where
    F: Fn(&str) -> String,
{
    let groups = group_by_reporter(issues.iter().map(|issue| {
        (
            issue.reporter_display_name.clone(),
            render_issue_line(issue, &browse_url(&issue.key), now),
        )
    }));
    paginate_groups(&groups, max_chars)
}
