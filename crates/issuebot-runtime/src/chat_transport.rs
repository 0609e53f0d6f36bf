//! Chat transport contract consumed by the bot runtime.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Stable identity of a private conversation with the bot.
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub conversation: ConversationId,
    pub message_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A user picked an option from a previously sent selection widget.
pub struct SelectionEvent {
    pub conversation: ConversationId,
    pub selected_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionWidget {
    pub id: String,
    pub label: String,
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub reply_to: Option<String>,
    pub widget: Option<SelectionWidget>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_to: None,
            widget: None,
        }
    }

    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }

    pub fn with_widget(mut self, widget: SelectionWidget) -> Self {
        self.widget = Some(widget);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub nick: String,
}

pub type EventStream<T> = BoxStream<'static, Result<T>>;

#[async_trait]
/// Messaging platform operations the bot depends on.
pub trait ChatTransport: Send + Sync {
    async fn get_self(&self) -> Result<ChatUser>;

    async fn get_user(&self, conversation: &ConversationId) -> Result<ChatUser>;

    /// Delivers a message and returns the platform message id.
    async fn send(&self, conversation: &ConversationId, message: OutboundMessage)
        -> Result<String>;

    fn subscribe_messages(&self) -> EventStream<InboundMessage>;

    fn subscribe_actions(&self) -> EventStream<SelectionEvent>;
}
