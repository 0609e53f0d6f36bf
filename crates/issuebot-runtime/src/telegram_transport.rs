//! Telegram Bot API implementation of [`ChatTransport`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::stream;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::chat_transport::{
    ChatTransport, ChatUser, ConversationId, EventStream, InboundMessage, OutboundMessage,
    SelectionEvent, SelectionWidget,
};

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const TELEGRAM_SAFE_MAX_CHARS: usize = 4096;
const DEFAULT_LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);
const MARKDOWN_PARSE_MODE: &str = "Markdown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramTransportConfig {
    pub api_base: String,
    pub bot_token: String,
    pub long_poll_timeout: Duration,
    pub retry_delay: Duration,
}

impl TelegramTransportConfig {
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            bot_token: bot_token.into(),
            long_poll_timeout: DEFAULT_LONG_POLL_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Error)]
pub enum TelegramApiError {
    #[error("telegram {method} request failed")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("telegram {method} rejected with status {status}: {description}")]
    Rejected {
        method: &'static str,
        status: u16,
        description: String,
    },
    #[error("telegram {method} returned an unreadable response: {message}")]
    Decode {
        method: &'static str,
        message: String,
    },
}

impl TelegramApiError {
    /// Unauthorized and not-found mean the bot token is wrong; polling stops.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Rejected {
                status: 401 | 404,
                ..
            }
        )
    }

    fn is_bad_request(&self) -> bool {
        matches!(self, Self::Rejected { status: 400, .. })
    }
}

#[derive(Debug, Deserialize)]
struct TelegramEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
    callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    chat: TelegramChat,
    from: Option<TelegramUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
}

impl TelegramUser {
    fn nick(&self) -> Option<String> {
        self.username
            .as_deref()
            .or(self.first_name.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct TelegramCallbackQuery {
    id: String,
    from: TelegramUser,
    message: Option<TelegramMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramSentMessage {
    message_id: i64,
}

struct UpdateSenders {
    messages: UnboundedSender<Result<InboundMessage>>,
    actions: UnboundedSender<Result<SelectionEvent>>,
}

impl UpdateSenders {
    fn is_closed(&self) -> bool {
        self.messages.is_closed() && self.actions.is_closed()
    }

    fn fail(&self, error: &TelegramApiError) {
        let message = format!("{error:#}");
        let _ = self.messages.send(Err(anyhow!(message.clone())));
        let _ = self.actions.send(Err(anyhow!(message)));
    }
}

#[derive(Default)]
struct UpdateChannels {
    senders: Option<UpdateSenders>,
    messages: Option<UnboundedReceiver<Result<InboundMessage>>>,
    actions: Option<UnboundedReceiver<Result<SelectionEvent>>>,
}

/// The keyboard a chat can still answer. Sending a new one replaces it.
struct LiveWidget {
    sequence: u64,
    values: Vec<String>,
}

struct TelegramApi {
    http: reqwest::Client,
    method_base: String,
    long_poll_timeout: Duration,
    retry_delay: Duration,
    users: Mutex<HashMap<ConversationId, String>>,
    widgets: Mutex<HashMap<ConversationId, LiveWidget>>,
    next_widget: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelegramApi {
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        payload: &Value,
    ) -> Result<T, TelegramApiError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.method_base))
            .json(payload)
            .send()
            .await
            .map_err(|source| TelegramApiError::Transport { method, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| TelegramApiError::Transport { method, source })?;
        let envelope = match serde_json::from_str::<TelegramEnvelope<T>>(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(TelegramApiError::Rejected {
                    method,
                    status: status.as_u16(),
                    description: truncate_for_error(&body, 400),
                });
            }
            Err(error) => {
                return Err(TelegramApiError::Decode {
                    method,
                    message: error.to_string(),
                });
            }
        };
        if !status.is_success() || !envelope.ok {
            return Err(TelegramApiError::Rejected {
                method,
                status: envelope.error_code.unwrap_or(status.as_u16()),
                description: envelope.description.unwrap_or_default(),
            });
        }
        envelope.result.ok_or_else(|| TelegramApiError::Decode {
            method,
            message: "missing result".to_string(),
        })
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>, TelegramApiError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": self.long_poll_timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    async fn send_message(&self, mut payload: Value) -> Result<i64, TelegramApiError> {
        payload["parse_mode"] = Value::String(MARKDOWN_PARSE_MODE.to_string());
        let sent = match self
            .call::<TelegramSentMessage>("sendMessage", &payload)
            .await
        {
            Err(error) if error.is_bad_request() => {
                tracing::debug!(error = %error, "markdown rejected, resending as plain text");
                if let Some(fields) = payload.as_object_mut() {
                    fields.remove("parse_mode");
                }
                self.call::<TelegramSentMessage>("sendMessage", &payload)
                    .await?
            }
            other => other?,
        };
        Ok(sent.message_id)
    }

    fn register_widget(&self, conversation: &ConversationId, widget: &SelectionWidget) -> Value {
        let sequence = self.next_widget.fetch_add(1, Ordering::Relaxed);
        let rows = widget
            .options
            .iter()
            .enumerate()
            .map(|(index, option)| {
                json!([{
                    "text": option.label,
                    "callback_data": format!("{sequence}:{index}"),
                }])
            })
            .collect::<Vec<_>>();
        let replaced = lock(&self.widgets).insert(
            conversation.clone(),
            LiveWidget {
                sequence,
                values: widget
                    .options
                    .iter()
                    .map(|option| option.value.clone())
                    .collect(),
            },
        );
        if replaced.is_some() {
            tracing::debug!(conversation = %conversation, "replaced pending selection keyboard");
        }
        json!({ "inline_keyboard": rows })
    }

    /// Resolves a callback token back to the option value. Only the latest
    /// keyboard of a chat resolves, and only once.
    fn resolve_callback(&self, conversation: &ConversationId, data: &str) -> Option<String> {
        let (sequence, index) = data.split_once(':')?;
        let sequence = sequence.parse::<u64>().ok()?;
        let index = index.parse::<usize>().ok()?;
        let mut widgets = lock(&self.widgets);
        let live = widgets.get(conversation)?;
        if live.sequence != sequence {
            return None;
        }
        let value = live.values.get(index)?.clone();
        widgets.remove(conversation);
        Some(value)
    }

    fn remember_user(&self, conversation: &ConversationId, user: Option<&TelegramUser>) {
        if let Some(nick) = user.and_then(TelegramUser::nick) {
            lock(&self.users).insert(conversation.clone(), nick);
        }
    }

    async fn route_update(&self, update: TelegramUpdate, senders: &UpdateSenders) {
        if let Some(message) = update.message {
            if message.chat.kind != "private" {
                tracing::debug!(chat_id = message.chat.id, "ignoring non-private chat message");
                return;
            }
            let Some(text) = message.text else {
                return;
            };
            let conversation = ConversationId::new(message.chat.id.to_string());
            self.remember_user(&conversation, message.from.as_ref());
            let _ = senders.messages.send(Ok(InboundMessage {
                conversation,
                message_id: message.message_id.to_string(),
                text,
            }));
            return;
        }

        if let Some(query) = update.callback_query {
            if let Err(error) = self
                .call::<bool>(
                    "answerCallbackQuery",
                    &json!({ "callback_query_id": query.id }),
                )
                .await
            {
                tracing::warn!(error = %error, "failed to acknowledge callback query");
            }
            let chat_id = query
                .message
                .as_ref()
                .map(|message| message.chat.id)
                .unwrap_or(query.from.id);
            let conversation = ConversationId::new(chat_id.to_string());
            self.remember_user(&conversation, Some(&query.from));
            let Some(selected_value) = query
                .data
                .as_deref()
                .and_then(|data| self.resolve_callback(&conversation, data))
            else {
                tracing::warn!(
                    conversation = %conversation,
                    data = query.data.as_deref().unwrap_or_default(),
                    "ignoring callback query with unknown token"
                );
                return;
            };
            let _ = senders.actions.send(Ok(SelectionEvent {
                conversation,
                selected_value,
            }));
        }
    }
}

async fn run_update_loop(api: Arc<TelegramApi>, senders: UpdateSenders) {
    let mut offset = 0i64;
    loop {
        if senders.is_closed() {
            return;
        }
        let updates = match api.get_updates(offset).await {
            Ok(updates) => updates,
            Err(error) if error.is_fatal() => {
                tracing::error!(error = %error, "telegram polling stopped");
                senders.fail(&error);
                return;
            }
            Err(error) => {
                tracing::warn!(error = %error, "telegram polling failed, retrying");
                tokio::time::sleep(api.retry_delay).await;
                continue;
            }
        };
        for update in updates {
            offset = offset.max(update.update_id.saturating_add(1));
            api.route_update(update, &senders).await;
        }
    }
}

pub struct TelegramTransport {
    api: Arc<TelegramApi>,
    channels: Mutex<UpdateChannels>,
}

impl TelegramTransport {
    pub fn new(config: TelegramTransportConfig) -> Result<Self> {
        let token = config.bot_token.trim();
        if token.is_empty() {
            return Err(anyhow!("telegram bot token cannot be empty"));
        }
        let base = config.api_base.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(anyhow!("telegram api base cannot be empty"));
        }
        let http = reqwest::Client::builder()
            .timeout(config.long_poll_timeout + REQUEST_TIMEOUT_MARGIN)
            .build()
            .context("failed to create telegram api client")?;
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        Ok(Self {
            api: Arc::new(TelegramApi {
                http,
                method_base: format!("{base}/bot{token}"),
                long_poll_timeout: config.long_poll_timeout,
                retry_delay: config.retry_delay,
                users: Mutex::new(HashMap::new()),
                widgets: Mutex::new(HashMap::new()),
                next_widget: AtomicU64::new(0),
            }),
            channels: Mutex::new(UpdateChannels {
                senders: Some(UpdateSenders {
                    messages: messages_tx,
                    actions: actions_tx,
                }),
                messages: Some(messages_rx),
                actions: Some(actions_rx),
            }),
        })
    }

    fn start_polling(&self, channels: &mut UpdateChannels) {
        if let Some(senders) = channels.senders.take() {
            tokio::spawn(run_update_loop(self.api.clone(), senders));
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn get_self(&self) -> Result<ChatUser> {
        let me: TelegramUser = self.api.call("getMe", &json!({})).await?;
        let nick = me
            .nick()
            .ok_or_else(|| anyhow!("telegram getMe returned no username"))?;
        Ok(ChatUser { nick })
    }

    async fn get_user(&self, conversation: &ConversationId) -> Result<ChatUser> {
        lock(&self.api.users)
            .get(conversation)
            .map(|nick| ChatUser { nick: nick.clone() })
            .ok_or_else(|| anyhow!("no known telegram user for chat {conversation}"))
    }

    async fn send(
        &self,
        conversation: &ConversationId,
        message: OutboundMessage,
    ) -> Result<String> {
        let chunks = chunk_text(&message.text, TELEGRAM_SAFE_MAX_CHARS);
        let last = chunks.len().saturating_sub(1);
        let mut message_id = None;
        for (index, chunk) in chunks.into_iter().enumerate() {
            let mut payload = json!({
                "chat_id": conversation.as_str(),
                "text": chunk,
            });
            if index == 0 {
                if let Some(reply_to) = message.reply_to.as_deref() {
                    if let Ok(reply_to) = reply_to.parse::<i64>() {
                        payload["reply_to_message_id"] = json!(reply_to);
                    }
                }
            }
            if index == last {
                if let Some(widget) = message.widget.as_ref() {
                    payload["reply_markup"] = self.api.register_widget(conversation, widget);
                }
            }
            let sent = self
                .api
                .send_message(payload)
                .await
                .with_context(|| format!("failed to send message to chat {conversation}"))?;
            message_id = Some(sent.to_string());
        }
        message_id.ok_or_else(|| anyhow!("refusing to send an empty message"))
    }

    fn subscribe_messages(&self) -> EventStream<InboundMessage> {
        let mut channels = lock(&self.channels);
        self.start_polling(&mut channels);
        match channels.messages.take() {
            Some(receiver) => Box::pin(UnboundedReceiverStream::new(receiver)),
            None => Box::pin(stream::once(async {
                Err(anyhow!("telegram message stream already subscribed"))
            })),
        }
    }

    fn subscribe_actions(&self) -> EventStream<SelectionEvent> {
        let mut channels = lock(&self.channels);
        self.start_polling(&mut channels);
        match channels.actions.take() {
            Some(receiver) => Box::pin(UnboundedReceiverStream::new(receiver)),
            None => Box::pin(stream::once(async {
                Err(anyhow!("telegram action stream already subscribed"))
            })),
        }
    }
}

fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for ch in text.chars() {
        current.push(ch);
        current_len = current_len.saturating_add(1);
        if current_len >= max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated = text.chars().take(max_chars).collect::<String>();
    format!("{truncated}...")
}
