//! Executes parsed chat commands against the tracker and the conversation store.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use issuebot_tracker::{IssueQuery, IssueRecord};

use crate::bot_context::BotContext;
use crate::bot_messages::{
    help_text, no_project_tasks, no_such_task, not_tracking, tracking_already, tracking_started,
    tracking_stopped, unknown_project, COMMENT_ADDED, NO_USER_TASKS, PROJECT_WIDGET_ID,
    PROJECT_WIDGET_LABEL, SELECT_PROJECT,
};
use crate::chat_transport::{
    ConversationId, InboundMessage, OutboundMessage, SelectOption, SelectionWidget,
};
use crate::command_parser::{parse_bot_command, BotCommand};
use crate::conversation_store::{Draft, TrackOutcome};
use crate::issue_render::render_grouped_issues;

#[derive(Clone)]
pub struct CommandDispatcher {
    context: BotContext,
}

impl CommandDispatcher {
    pub fn new(context: BotContext) -> Self {
        Self { context }
    }

    /// Handles one inbound message. Errors are tracker or delivery failures the
    /// caller logs; user-facing validation replies are sent here.
    pub async fn handle_message(&self, message: &InboundMessage) -> Result<()> {
        let command = parse_bot_command(&message.text);
        tracing::debug!(
            conversation = %message.conversation,
            command = command.name(),
            "dispatching chat command"
        );
        let conversation = &message.conversation;
        match command {
            BotCommand::Active { project_code } => {
                self.list_project_issues(conversation, &project_code).await
            }
            BotCommand::Progress => self.list_own_issues(conversation).await,
            BotCommand::New { title, description } => {
                self.start_new_issue(message, title, description).await
            }
            BotCommand::Comment { issue_key, body } => {
                self.add_comment(conversation, &issue_key, &body).await
            }
            BotCommand::Start { issue_key } => self.start_tracking(conversation, &issue_key).await,
            BotCommand::Stop { issue_key } => self.stop_tracking(conversation, &issue_key).await,
            BotCommand::Help => self.reply(conversation, help_text()).await,
        }
    }

    async fn reply(&self, conversation: &ConversationId, text: impl Into<String>) -> Result<()> {
        self.context
            .transport
            .send(conversation, OutboundMessage::text(text))
            .await
            .with_context(|| format!("failed to send reply to conversation {conversation}"))?;
        Ok(())
    }

    async fn send_grouped(
        &self,
        conversation: &ConversationId,
        issues: &[IssueRecord],
    ) -> Result<()> {
        let tracker = &self.context.tracker;
        let blocks = render_grouped_issues(
            issues,
            |key| tracker.browse_url(key),
            Utc::now(),
            self.context.settings.max_message_length,
        );
        for block in blocks {
            self.reply(conversation, block).await?;
        }
        Ok(())
    }

    async fn list_project_issues(
        &self,
        conversation: &ConversationId,
        project_code: &str,
    ) -> Result<()> {
        let projects = self
            .context
            .tracker
            .list_projects()
            .await
            .context("failed to list projects")?;
        if !projects.iter().any(|project| project.key == project_code) {
            let mut codes = projects
                .iter()
                .map(|project| project.key.as_str())
                .collect::<Vec<_>>();
            codes.sort_unstable();
            return self.reply(conversation, unknown_project(&codes)).await;
        }

        let issues = self
            .context
            .tracker
            .search_issues(&IssueQuery::InProgressForProject {
                project_code: project_code.to_string(),
            })
            .await
            .with_context(|| format!("failed to search in-progress issues of {project_code}"))?;
        if issues.is_empty() {
            return self.reply(conversation, no_project_tasks(project_code)).await;
        }
        self.send_grouped(conversation, &issues).await
    }

    async fn list_own_issues(&self, conversation: &ConversationId) -> Result<()> {
        let user = self
            .context
            .transport
            .get_user(conversation)
            .await
            .context("failed to resolve chat user")?;
        let issues = self
            .context
            .tracker
            .search_issues(&IssueQuery::InProgressForAssignee {
                username: user.nick.clone(),
            })
            .await
            .with_context(|| format!("failed to search in-progress issues of {}", user.nick))?;
        if issues.is_empty() {
            return self.reply(conversation, NO_USER_TASKS).await;
        }
        self.send_grouped(conversation, &issues).await
    }

    async fn start_new_issue(
        &self,
        message: &InboundMessage,
        title: String,
        description: String,
    ) -> Result<()> {
        let conversation = &message.conversation;
        let snapshot = self.context.tracker.list_projects().await;
        let replaced = self.context.store.set_draft(
            conversation,
            Draft {
                title,
                description,
                candidate_projects: snapshot.as_ref().ok().cloned(),
            },
        );
        if replaced.is_some() {
            tracing::debug!(conversation = %conversation, "replaced pending issue draft");
        }
        let projects =
            snapshot.context("failed to snapshot projects; draft kept without candidates")?;

        let widget = SelectionWidget {
            id: PROJECT_WIDGET_ID.to_string(),
            label: PROJECT_WIDGET_LABEL.to_string(),
            options: projects
                .iter()
                .map(|project| SelectOption {
                    label: project.name.clone(),
                    value: project.name.clone(),
                })
                .collect(),
        };
        self.context
            .transport
            .send(
                conversation,
                OutboundMessage::text(SELECT_PROJECT)
                    .replying_to(message.message_id.clone())
                    .with_widget(widget),
            )
            .await
            .context("failed to send project selection")?;
        Ok(())
    }

    async fn add_comment(
        &self,
        conversation: &ConversationId,
        issue_key: &str,
        body: &str,
    ) -> Result<()> {
        if body.trim().is_empty() {
            tracing::debug!(
                conversation = %conversation,
                issue_key,
                "ignoring comment without body"
            );
            return Ok(());
        }
        self.context
            .tracker
            .add_comment(issue_key, body)
            .await
            .with_context(|| format!("failed to comment on {issue_key}"))?;
        self.reply(conversation, COMMENT_ADDED).await
    }

    async fn start_tracking(&self, conversation: &ConversationId, issue_key: &str) -> Result<()> {
        let issue = match self.context.tracker.fetch_issue(issue_key).await {
            Ok(issue) => issue,
            Err(error) if error.is_not_found() || error.is_invalid_request() => {
                return self.reply(conversation, no_such_task(issue_key)).await;
            }
            Err(error) => {
                return Err(anyhow!(error).context(format!("failed to fetch {issue_key}")));
            }
        };

        let outcome = self
            .context
            .store
            .track(conversation, &issue.key, &issue.status);
        match outcome {
            TrackOutcome::Started => {
                tracing::info!(
                    conversation = %conversation,
                    issue_key = %issue.key,
                    status = %issue.status,
                    "tracking issue"
                );
                self.reply(conversation, tracking_started(&issue.key)).await
            }
            TrackOutcome::AlreadyTracking => {
                self.reply(conversation, tracking_already(&issue.key)).await
            }
        }
    }

    async fn stop_tracking(&self, conversation: &ConversationId, issue_key: &str) -> Result<()> {
        match self.context.store.untrack(conversation, issue_key) {
            Some(removed) => {
                tracing::info!(
                    conversation = %conversation,
                    issue_key = %removed.issue_key,
                    "stopped tracking issue"
                );
                self.reply(conversation, tracking_stopped(&removed.issue_key)).await
            }
            None => self.reply(conversation, not_tracking(issue_key)).await,
        }
    }
}
