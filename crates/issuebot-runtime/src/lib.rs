//! Chat runtime for the issuebot workspace.
//!
//! Parses chat commands, keeps per-conversation drafts and tracked issues,
//! renders issue digests, polls tracked issues for status changes, and wires
//! all of it to a [`ChatTransport`] through [`run_bot`].

pub mod bot_context;
pub mod bot_messages;
pub mod bot_runtime;
pub mod chat_transport;
pub mod command_dispatch;
pub mod command_parser;
pub mod conversation_store;
pub mod issue_render;
pub mod selection_handler;
pub mod telegram_transport;
pub mod tracking_poller;

#[cfg(test)]
mod test_support;

pub use bot_context::{
    BotContext, BotRuntimeSettings, DEFAULT_MAX_MESSAGE_LENGTH, DEFAULT_POLL_INTERVAL,
};
pub use bot_runtime::{run_bot, BotRunReport};
pub use chat_transport::{
    ChatTransport, ChatUser, ConversationId, EventStream, InboundMessage, OutboundMessage,
    SelectOption, SelectionEvent, SelectionWidget,
};
pub use command_dispatch::CommandDispatcher;
pub use command_parser::{parse_bot_command, BotCommand};
pub use conversation_store::{ConversationStore, Draft, StatusUpdate, TrackOutcome, TrackedIssue};
pub use selection_handler::{SelectionError, SelectionHandler};
pub use telegram_transport::{
    TelegramApiError, TelegramTransport, TelegramTransportConfig, DEFAULT_TELEGRAM_API_BASE,
};
pub use tracking_poller::{PollTickReport, TrackingPoller};
