use std::sync::Arc;
use std::time::Duration;

use issuebot_tracker::IssueTracker;

use crate::chat_transport::ChatTransport;
use crate::conversation_store::ConversationStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotRuntimeSettings {
    pub poll_interval: Duration,
    pub max_message_length: usize,
}

impl Default for BotRuntimeSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

#[derive(Clone)]
/// Collaborators shared by every event task and the tracking poller.
pub struct BotContext {
    pub tracker: Arc<dyn IssueTracker>,
    pub transport: Arc<dyn ChatTransport>,
    pub store: Arc<ConversationStore>,
    pub settings: BotRuntimeSettings,
}

impl BotContext {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        transport: Arc<dyn ChatTransport>,
        settings: BotRuntimeSettings,
    ) -> Self {
        Self {
            tracker,
            transport,
            store: Arc::new(ConversationStore::new()),
            settings,
        }
    }
}
