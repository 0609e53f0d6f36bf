//! Completes the new-issue flow once a project is picked from the widget.

use issuebot_tracker::{NewIssueRequest, TrackerError};
use thiserror::Error;

use crate::bot_context::BotContext;
use crate::bot_messages::NO_DESCRIPTION;
use crate::chat_transport::{ConversationId, OutboundMessage, SelectionEvent};
use crate::issue_render::render_created_issue;

#[derive(Debug, Error)]
/// Failures of a selection event. The first three mean the draft state was not
/// usable; nothing is sent to the user for any of them.
pub enum SelectionError {
    #[error("conversation {conversation} has no pending issue draft")]
    MissingDraft { conversation: ConversationId },
    #[error("issue draft of conversation {conversation} has no project snapshot")]
    MissingCandidates { conversation: ConversationId },
    #[error("conversation {conversation} selected unknown project '{selected}'")]
    UnknownProject {
        conversation: ConversationId,
        selected: String,
    },
    #[error("failed to create issue")]
    CreateFailed(#[source] TrackerError),
    #[error("failed to deliver created issue confirmation: {0:#}")]
    Delivery(anyhow::Error),
}

#[derive(Clone)]
pub struct SelectionHandler {
    context: BotContext,
}

impl SelectionHandler {
    pub fn new(context: BotContext) -> Self {
        Self { context }
    }

    pub async fn handle_selection(&self, event: &SelectionEvent) -> Result<(), SelectionError> {
        let conversation = &event.conversation;
        let draft = self
            .context
            .store
            .draft(conversation)
            .ok_or_else(|| SelectionError::MissingDraft {
                conversation: conversation.clone(),
            })?;
        let candidates =
            draft
                .candidate_projects
                .as_ref()
                .ok_or_else(|| SelectionError::MissingCandidates {
                    conversation: conversation.clone(),
                })?;
        let project = candidates
            .iter()
            .find(|project| project.name == event.selected_value)
            .ok_or_else(|| SelectionError::UnknownProject {
                conversation: conversation.clone(),
                selected: event.selected_value.clone(),
            })?;

        let description = if draft.description.is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            draft.description.clone()
        };
        let request = NewIssueRequest {
            project_key: project.key.clone(),
            summary: draft.title.clone(),
            description,
        };
        let created = self.context.tracker.create_issue(&request).await;
        self.context.store.clear_draft(conversation);
        let created = created.map_err(SelectionError::CreateFailed)?;

        tracing::info!(
            conversation = %conversation,
            issue_key = %created.key,
            project = %project.key,
            "created issue"
        );
        let text = render_created_issue(
            &created.key,
            &self.context.tracker.browse_url(&created.key),
            &draft.title,
        );
        self.context
            .transport
            .send(conversation, OutboundMessage::text(text))
            .await
            .map_err(SelectionError::Delivery)?;
        Ok(())
    }
}
