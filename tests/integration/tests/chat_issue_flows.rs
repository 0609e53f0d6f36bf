use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::stream;
use httpmock::prelude::*;
use issuebot_runtime::{
    run_bot, BotContext, BotRuntimeSettings, ChatTransport, ChatUser, CommandDispatcher,
    ConversationId, EventStream, InboundMessage, OutboundMessage, SelectionEvent, TrackingPoller,
};
use issuebot_tracker::{JiraClient, JiraClientConfig};
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

struct ScriptedTransport {
    sent: Mutex<Vec<(ConversationId, OutboundMessage)>>,
    messages: Mutex<Option<UnboundedReceiver<Result<InboundMessage>>>>,
    actions: Mutex<Option<UnboundedReceiver<Result<SelectionEvent>>>>,
}

struct ScriptedInput {
    messages: UnboundedSender<Result<InboundMessage>>,
    actions: UnboundedSender<Result<SelectionEvent>>,
}

impl ScriptedTransport {
    fn new() -> (Arc<Self>, ScriptedInput) {
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            messages: Mutex::new(Some(messages_rx)),
            actions: Mutex::new(Some(actions_rx)),
        });
        (
            transport,
            ScriptedInput {
                messages: messages_tx,
                actions: actions_tx,
            },
        )
    }

    fn sent(&self) -> Vec<(ConversationId, OutboundMessage)> {
        self.sent.lock().expect("sent").clone()
    }

    async fn wait_for_sent(&self, count: usize) -> Vec<(ConversationId, OutboundMessage)> {
        for _ in 0..500 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} sent messages, got {:?}", self.sent());
    }
}

fn receiver_stream<T: Send + 'static>(
    slot: &Mutex<Option<UnboundedReceiver<Result<T>>>>,
) -> EventStream<T> {
    match slot.lock().expect("receiver").take() {
        Some(receiver) => Box::pin(UnboundedReceiverStream::new(receiver)),
        None => Box::pin(stream::empty()),
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn get_self(&self) -> Result<ChatUser> {
        Ok(ChatUser {
            nick: "issuebot".to_string(),
        })
    }

    async fn get_user(&self, conversation: &ConversationId) -> Result<ChatUser> {
        match conversation.as_str() {
            "chat-ada" => Ok(ChatUser {
                nick: "ada".to_string(),
            }),
            other => Err(anyhow!("unknown chat {other}")),
        }
    }

    async fn send(
        &self,
        conversation: &ConversationId,
        message: OutboundMessage,
    ) -> Result<String> {
        let mut sent = self.sent.lock().expect("sent");
        sent.push((conversation.clone(), message));
        Ok(format!("out-{}", sent.len()))
    }

    fn subscribe_messages(&self) -> EventStream<InboundMessage> {
        receiver_stream(&self.messages)
    }

    fn subscribe_actions(&self) -> EventStream<SelectionEvent> {
        receiver_stream(&self.actions)
    }
}

fn jira_client(server: &MockServer) -> Arc<JiraClient> {
    Arc::new(
        JiraClient::new(JiraClientConfig {
            base_url: server.base_url(),
            username: "bot".to_string(),
            password: "secret".to_string(),
        })
        .expect("jira client"),
    )
}

fn message(conversation: &str, message_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        conversation: ConversationId::from(conversation),
        message_id: message_id.to_string(),
        text: text.to_string(),
    }
}

fn issue_json(key: &str, status: &str, reporter: &str) -> serde_json::Value {
    json!({
        "key": key,
        "fields": {
            "status": { "name": status },
            "summary": format!("summary of {key}"),
            "updated": "2024-03-01T10:15:30.000+0000",
            "creator": { "displayName": reporter }
        }
    })
}

#[tokio::test]
async fn integration_new_issue_flow_creates_task_after_project_selection() {
    let server = MockServer::start();
    let projects = server.mock(|when, then| {
        when.method(GET).path("/rest/api/2/project");
        then.status(200).json_body(json!([
            { "key": "DP", "name": "Dialog Platform" },
            { "key": "OPS", "name": "Operations" }
        ]));
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/rest/api/2/issue").json_body_includes(
            json!({
                "fields": {
                    "project": { "key": "OPS" },
                    "summary": "Rotate keys",
                    "description": "before friday\n",
                    "issuetype": { "name": "Task" }
                }
            })
            .to_string(),
        );
        then.status(201).json_body(json!({
            "id": "10042",
            "key": "OPS-42",
            "self": format!("{}/rest/api/2/issue/10042", server.base_url())
        }));
    });

    let (transport, input) = ScriptedTransport::new();
    let context = BotContext::new(
        jira_client(&server),
        transport.clone(),
        BotRuntimeSettings::default(),
    );
    let bot = tokio::spawn(run_bot(context));

    input
        .messages
        .send(Ok(message("chat-ada", "11", "new\nRotate keys\nbefore friday")))
        .expect("queue message");
    let sent = transport.wait_for_sent(1).await;
    let prompt = &sent[0].1;
    assert_eq!(prompt.reply_to.as_deref(), Some("11"));
    let widget = prompt.widget.as_ref().expect("project widget");
    assert_eq!(
        widget
            .options
            .iter()
            .map(|option| option.value.as_str())
            .collect::<Vec<_>>(),
        vec!["Dialog Platform", "Operations"]
    );

    input
        .actions
        .send(Ok(SelectionEvent {
            conversation: ConversationId::from("chat-ada"),
            selected_value: "Operations".to_string(),
        }))
        .expect("queue selection");
    let sent = transport.wait_for_sent(2).await;
    assert_eq!(
        sent[1].1.text,
        format!(
            "[OPS-42]({}/browse/OPS-42) : Rotate keys",
            server.base_url()
        )
    );

    drop(input);
    let report = bot.await.expect("join bot").expect("bot run");
    assert_eq!(report.messages, 1);
    assert_eq!(report.selections, 1);
    assert_eq!(report.failed_events, 0);
    projects.assert_calls(1);
    create.assert_calls(1);
}

#[tokio::test]
async fn integration_tracked_issue_status_change_is_reported_once() {
    let server = MockServer::start();
    let mut open = server.mock(|when, then| {
        when.method(GET).path("/rest/api/2/issue/ABC-1");
        then.status(200)
            .json_body(issue_json("ABC-1", "Open", "Ada"));
    });

    let (transport, _input) = ScriptedTransport::new();
    let context = BotContext::new(
        jira_client(&server),
        transport.clone(),
        BotRuntimeSettings::default(),
    );
    let dispatcher = CommandDispatcher::new(context.clone());
    let poller = TrackingPoller::new(context.clone());

    dispatcher
        .handle_message(&message("chat-ada", "1", "start ABC-1"))
        .await
        .expect("start tracking");
    assert_eq!(poller.run_tick().await.status_changes, 0);

    open.delete();
    let done = server.mock(|when, then| {
        when.method(GET).path("/rest/api/2/issue/ABC-1");
        then.status(200)
            .json_body(issue_json("ABC-1", "Done", "Ada"));
    });
    assert_eq!(poller.run_tick().await.status_changes, 1);
    assert_eq!(poller.run_tick().await.status_changes, 0);
    done.assert_calls(2);

    dispatcher
        .handle_message(&message("chat-ada", "2", "stop ABC-1"))
        .await
        .expect("stop tracking");
    assert_eq!(poller.run_tick().await.checked_issues, 0);

    let texts = transport
        .sent()
        .into_iter()
        .map(|(_, message)| message.text)
        .collect::<Vec<_>>();
    assert_eq!(
        texts,
        vec![
            "I'm tracking ABC-1 for you.".to_string(),
            format!(
                "Done - [ABC-1]({}/browse/ABC-1) : summary of ABC-1",
                server.base_url()
            ),
            "I've stopped tracking ABC-1 for you.".to_string(),
        ]
    );
}

#[tokio::test]
async fn integration_progress_and_comment_commands_reach_the_tracker() {
    let server = MockServer::start();
    let search = server.mock(|when, then| {
        when.method(GET)
            .path("/rest/api/2/search")
            .query_param("jql", "status=\"In Progress\" AND assignee=ada");
        then.status(200).json_body(json!({
            "issues": [
                issue_json("ABC-1", "In Progress", "Grace"),
                issue_json("ABC-2", "In Progress", "Linus"),
                issue_json("ABC-3", "In Progress", "Grace")
            ]
        }));
    });
    let comment = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/api/2/issue/ABC-1/comment")
            .json_body(json!({ "body": "Deployed to staging\n" }));
        then.status(201).json_body(json!({ "id": "9" }));
    });

    let (transport, _input) = ScriptedTransport::new();
    let context = BotContext::new(
        jira_client(&server),
        transport.clone(),
        BotRuntimeSettings::default(),
    );
    let dispatcher = CommandDispatcher::new(context);

    dispatcher
        .handle_message(&message("chat-ada", "1", "progress"))
        .await
        .expect("progress");
    dispatcher
        .handle_message(&message(
            "chat-ada",
            "2",
            "comment ABC-1\nDeployed to staging",
        ))
        .await
        .expect("comment");

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    let digest = &sent[0].1.text;
    assert!(digest.starts_with("\nGrace\n"));
    let grace = digest.find("Grace").expect("grace group");
    let linus = digest.find("Linus").expect("linus group");
    assert!(grace < linus);
    assert!(digest.contains("[ABC-3]"));
    assert_eq!(sent[1].1.text, "Comment has been added successfully to the task");
    search.assert_calls(1);
    comment.assert_calls(1);
}
