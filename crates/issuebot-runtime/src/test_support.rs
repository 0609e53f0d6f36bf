//! In-memory tracker and transport doubles shared by the runtime tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::stream;
use issuebot_tracker::{
    parse_tracker_timestamp, validate_issue_key, CreatedIssue, IssueQuery, IssueRecord,
    IssueTracker, NewIssueRequest, ProjectRef, TrackerError,
};

use crate::bot_context::{BotContext, BotRuntimeSettings};
use crate::chat_transport::{
    ChatTransport, ChatUser, ConversationId, EventStream, InboundMessage, OutboundMessage,
    SelectionEvent,
};

fn unavailable(operation: &str) -> TrackerError {
    TrackerError::HttpStatus {
        operation: operation.to_string(),
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[derive(Default)]
struct FakeTrackerState {
    projects: Vec<ProjectRef>,
    fail_projects: bool,
    search_results: VecDeque<Vec<IssueRecord>>,
    queries: Vec<String>,
    issues: HashMap<String, IssueRecord>,
    failing_fetches: HashSet<String>,
    fetches: Vec<String>,
    comments: Vec<(String, String)>,
    fail_create: bool,
    creates: Vec<NewIssueRequest>,
}

#[derive(Default)]
pub(crate) struct FakeTracker {
    state: Mutex<FakeTrackerState>,
}

impl FakeTracker {
    pub(crate) fn with_projects(projects: &[(&str, &str)]) -> Self {
        let tracker = Self::default();
        tracker.state.lock().expect("tracker state").projects = projects
            .iter()
            .map(|(key, name)| ProjectRef {
                key: key.to_string(),
                name: name.to_string(),
            })
            .collect();
        tracker
    }

    pub(crate) fn issue(key: &str, reporter: &str, status: &str) -> IssueRecord {
        IssueRecord {
            key: key.to_string(),
            reporter_display_name: reporter.to_string(),
            summary: format!("summary {key}"),
            status: status.to_string(),
            updated_at: parse_tracker_timestamp("2024-03-10T09:00:00.000+0000")
                .expect("timestamp"),
            assignee_display_name: None,
            self_url: None,
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeTrackerState) -> T) -> T {
        f(&mut self.state.lock().expect("tracker state"))
    }

    pub(crate) fn fail_projects(&self) {
        self.with_state(|state| state.fail_projects = true);
    }

    pub(crate) fn push_search_result(&self, issues: Vec<IssueRecord>) {
        self.with_state(|state| state.search_results.push_back(issues));
    }

    pub(crate) fn set_issue(&self, issue: IssueRecord) {
        self.with_state(|state| {
            state.issues.insert(issue.key.clone(), issue);
        });
    }

    pub(crate) fn set_status(&self, key: &str, status: &str) {
        self.with_state(|state| {
            if let Some(issue) = state.issues.get_mut(key) {
                issue.status = status.to_string();
            }
        });
    }

    pub(crate) fn fail_fetch(&self, key: &str) {
        self.with_state(|state| {
            state.failing_fetches.insert(key.to_string());
        });
    }

    pub(crate) fn fail_create(&self) {
        self.with_state(|state| state.fail_create = true);
    }

    pub(crate) fn search_calls(&self) -> usize {
        self.with_state(|state| state.queries.len())
    }

    pub(crate) fn recorded_queries(&self) -> Vec<String> {
        self.with_state(|state| state.queries.clone())
    }

    pub(crate) fn recorded_fetches(&self) -> Vec<String> {
        self.with_state(|state| state.fetches.clone())
    }

    pub(crate) fn recorded_comments(&self) -> Vec<(String, String)> {
        self.with_state(|state| state.comments.clone())
    }

    pub(crate) fn recorded_creates(&self) -> Vec<NewIssueRequest> {
        self.with_state(|state| state.creates.clone())
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn list_projects(&self) -> Result<Vec<ProjectRef>, TrackerError> {
        self.with_state(|state| {
            if state.fail_projects {
                Err(unavailable("list projects"))
            } else {
                Ok(state.projects.clone())
            }
        })
    }

    async fn search_issues(&self, query: &IssueQuery) -> Result<Vec<IssueRecord>, TrackerError> {
        self.with_state(|state| {
            state.queries.push(query.jql());
            Ok(state.search_results.pop_front().unwrap_or_default())
        })
    }

    async fn fetch_issue(&self, key: &str) -> Result<IssueRecord, TrackerError> {
        let key = validate_issue_key(key)?;
        self.with_state(|state| {
            state.fetches.push(key.to_string());
            if state.failing_fetches.contains(key) {
                return Err(unavailable("fetch issue"));
            }
            state
                .issues
                .values()
                .find(|issue| issue.key.eq_ignore_ascii_case(key))
                .cloned()
                .ok_or_else(|| TrackerError::NotFound {
                    resource: "issue",
                    key: key.to_string(),
                })
        })
    }

    async fn create_issue(&self, request: &NewIssueRequest) -> Result<CreatedIssue, TrackerError> {
        self.with_state(|state| {
            state.creates.push(request.clone());
            if state.fail_create {
                return Err(unavailable("create issue"));
            }
            let number = state.creates.len();
            Ok(CreatedIssue {
                id: format!("1000{number}"),
                key: format!("{}-{number}", request.project_key),
                self_url: None,
            })
        })
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<(), TrackerError> {
        let key = validate_issue_key(key)?;
        self.with_state(|state| {
            state.comments.push((key.to_string(), body.to_string()));
            Ok(())
        })
    }

    fn browse_url(&self, key: &str) -> String {
        format!("https://jira.test/browse/{key}")
    }
}

#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<(ConversationId, OutboundMessage)>>,
    users: Mutex<HashMap<ConversationId, String>>,
    messages: Mutex<Option<Vec<Result<InboundMessage>>>>,
    actions: Mutex<Option<Vec<Result<SelectionEvent>>>>,
}

impl RecordingTransport {
    pub(crate) fn with_events(
        messages: Vec<Result<InboundMessage>>,
        actions: Vec<Result<SelectionEvent>>,
    ) -> Self {
        Self {
            messages: Mutex::new(Some(messages)),
            actions: Mutex::new(Some(actions)),
            ..Self::default()
        }
    }

    pub(crate) fn set_user(&self, conversation: &str, nick: &str) {
        self.users
            .lock()
            .expect("users")
            .insert(ConversationId::from(conversation), nick.to_string());
    }

    pub(crate) fn sent(&self) -> Vec<(ConversationId, OutboundMessage)> {
        self.sent.lock().expect("sent").clone()
    }

    pub(crate) fn texts_for(&self, conversation: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(target, _)| target.as_str() == conversation)
            .map(|(_, message)| message.text)
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn get_self(&self) -> Result<ChatUser> {
        Ok(ChatUser {
            nick: "issuebot".to_string(),
        })
    }

    async fn get_user(&self, conversation: &ConversationId) -> Result<ChatUser> {
        self.users
            .lock()
            .expect("users")
            .get(conversation)
            .map(|nick| ChatUser { nick: nick.clone() })
            .ok_or_else(|| anyhow!("unknown user for {conversation}"))
    }

    async fn send(
        &self,
        conversation: &ConversationId,
        message: OutboundMessage,
    ) -> Result<String> {
        let mut sent = self.sent.lock().expect("sent");
        sent.push((conversation.clone(), message));
        Ok(sent.len().to_string())
    }

    fn subscribe_messages(&self) -> EventStream<InboundMessage> {
        let events = self.messages.lock().expect("messages").take();
        Box::pin(stream::iter(events.unwrap_or_default()))
    }

    fn subscribe_actions(&self) -> EventStream<SelectionEvent> {
        let events = self.actions.lock().expect("actions").take();
        Box::pin(stream::iter(events.unwrap_or_default()))
    }
}

pub(crate) fn inbound(conversation: &str, text: &str) -> InboundMessage {
    InboundMessage {
        conversation: ConversationId::from(conversation),
        message_id: "m-1".to_string(),
        text: text.to_string(),
    }
}

pub(crate) fn test_context(
    tracker: FakeTracker,
    max_message_length: usize,
) -> (BotContext, Arc<FakeTracker>, Arc<RecordingTransport>) {
    context_with_transport(tracker, RecordingTransport::default(), max_message_length)
}

pub(crate) fn context_with_transport(
    tracker: FakeTracker,
    transport: RecordingTransport,
    max_message_length: usize,
) -> (BotContext, Arc<FakeTracker>, Arc<RecordingTransport>) {
    let tracker = Arc::new(tracker);
    let transport = Arc::new(transport);
    let context = BotContext::new(
        tracker.clone(),
        transport.clone(),
        BotRuntimeSettings {
            max_message_length,
            ..BotRuntimeSettings::default()
        },
    );
    (context, tracker, transport)
}
