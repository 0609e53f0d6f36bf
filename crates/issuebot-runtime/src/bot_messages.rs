//! Fixed user-facing reply texts.

pub const ACTIVE_COMMAND: &str = "active";
pub const PROGRESS_COMMAND: &str = "progress";
pub const NEW_COMMAND: &str = "new";
pub const COMMENT_COMMAND: &str = "comment";
pub const START_COMMAND: &str = "start";
pub const STOP_COMMAND: &str = "stop";

pub const NO_USER_TASKS: &str = "You have no tasks in status \"In Progress\"";
pub const SELECT_PROJECT: &str = "Select the project you want to add the task to:";
pub const COMMENT_ADDED: &str = "Comment has been added successfully to the task";
pub const NO_DESCRIPTION: &str =
    "Creating of an issue using project keys and issue type names using the REST API";
pub const PROJECT_WIDGET_ID: &str = "projects";
pub const PROJECT_WIDGET_LABEL: &str = "Projects";

pub fn unknown_project(valid_codes: &[&str]) -> String {
    format!(
        "Unknown project code. Valid project codes: `{}`",
        valid_codes.join("`, `")
    )
}

pub fn no_project_tasks(project_code: &str) -> String {
    format!("Project {project_code} has no tasks in status \"In Progress\"")
}

pub fn tracking_started(issue_key: &str) -> String {
    format!("I'm tracking {issue_key} for you.")
}

pub fn tracking_already(issue_key: &str) -> String {
    format!("I'm already tracking {issue_key} for you.")
}

pub fn tracking_stopped(issue_key: &str) -> String {
    format!("I've stopped tracking {issue_key} for you.")
}

pub fn not_tracking(issue_key: &str) -> String {
    format!("I'm not tracking {issue_key} for you.")
}

pub fn no_such_task(issue_key: &str) -> String {
    format!("No task {issue_key}")
}

pub fn help_text() -> String {
    [
        "send commands:".to_string(),
        format!(
            "`{ACTIVE_COMMAND} project_code` - for get all tasks in `project_code` project with status \"In Progress\" (example `project_code` = `DP` Dialog Platform),"
        ),
        format!("`{PROGRESS_COMMAND}` - for get your tasks with status \"In Progress\","),
        format!("`{START_COMMAND} task_id` - for start tracking change status for `task_id`,"),
        format!("`{STOP_COMMAND} task_id` - for stop tracking change status for `task_id`,"),
        format!("`{COMMENT_COMMAND} task_id`"),
        "`comment_text` - for add comment to `task_id` with `comment_text`,".to_string(),
        format!("`{NEW_COMMAND}`"),
        "`title_text`".to_string(),
        "`description_text` - for create new task with title = `title_text` and description = `description_text`".to_string(),
    ]
    .join("\n")
}
