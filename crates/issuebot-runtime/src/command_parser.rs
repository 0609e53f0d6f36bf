//! Free-text command parsing.

use crate::bot_messages::{
    ACTIVE_COMMAND, COMMENT_COMMAND, NEW_COMMAND, PROGRESS_COMMAND, START_COMMAND, STOP_COMMAND,
};

/// Invisible separator some clients insert instead of a space when copying text.
const INVISIBLE_SEPARATOR: char = '\u{2063}';

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `BotCommand` values.
pub enum BotCommand {
    Active { project_code: String },
    Progress,
    New { title: String, description: String },
    Comment { issue_key: String, body: String },
    Start { issue_key: String },
    Stop { issue_key: String },
    Help,
}

impl BotCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active { .. } => ACTIVE_COMMAND,
            Self::Progress => PROGRESS_COMMAND,
            Self::New { .. } => NEW_COMMAND,
            Self::Comment { .. } => COMMENT_COMMAND,
            Self::Start { .. } => START_COMMAND,
            Self::Stop { .. } => STOP_COMMAND,
            Self::Help => "help",
        }
    }
}

/// Concatenates lines, terminating each one with `\n`.
fn join_terminated(lines: &[&str]) -> String {
    lines.iter().fold(String::new(), |mut joined, line| {
        joined.push_str(line);
        joined.push('\n');
        joined
    })
}

pub fn parse_bot_command(text: &str) -> BotCommand {
    let lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect::<Vec<_>>();
    let first_line = lines.first().copied().unwrap_or_default();
    let normalized = first_line.replace(INVISIBLE_SEPARATOR, " ");
    let tokens = normalized.split_whitespace().collect::<Vec<_>>();
    let keyed_argument = |command: &str| match tokens.as_slice() {
        [name, argument] if *name == command => Some((*argument).to_string()),
        _ => None,
    };

    if let Some(project_code) = keyed_argument(ACTIVE_COMMAND) {
        return BotCommand::Active { project_code };
    }
    if first_line == PROGRESS_COMMAND {
        return BotCommand::Progress;
    }
    if first_line == NEW_COMMAND && lines.len() > 1 {
        return BotCommand::New {
            title: lines[1].to_string(),
            description: join_terminated(&lines[2..]),
        };
    }
    if let Some(issue_key) = keyed_argument(COMMENT_COMMAND) {
        return BotCommand::Comment {
            issue_key,
            body: join_terminated(&lines[1..]),
        };
    }
    if let Some(issue_key) = keyed_argument(START_COMMAND) {
        return BotCommand::Start { issue_key };
    }
    if let Some(issue_key) = keyed_argument(STOP_COMMAND) {
        return BotCommand::Stop { issue_key };
    }
    BotCommand::Help
}
