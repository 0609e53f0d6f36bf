//! Event loop wiring the chat transport to the dispatcher, the selection
//! handler and the tracking poller.
//!
//! Each inbound event runs on its own task so a slow tracker call in one
//! conversation never stalls another. Failures inside a task are logged and
//! dropped; only a broken event stream ends the loop with an error.

use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use tokio::task::JoinSet;

use crate::bot_context::BotContext;
use crate::chat_transport::{InboundMessage, SelectionEvent};
use crate::command_dispatch::CommandDispatcher;
use crate::selection_handler::SelectionHandler;
use crate::tracking_poller::TrackingPoller;

#[derive(Debug)]
enum BotEvent {
    Message(InboundMessage),
    Selection(SelectionEvent),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BotRunReport {
    pub messages: usize,
    pub selections: usize,
    pub failed_events: usize,
}

/// Runs the bot until the transport streams end or ctrl-c is received.
pub async fn run_bot(context: BotContext) -> Result<BotRunReport> {
    let identity = context
        .transport
        .get_self()
        .await
        .context("failed to resolve bot identity")?;
    tracing::info!(
        nick = %identity.nick,
        poll_interval_ms = context.settings.poll_interval.as_millis() as u64,
        "issue bot connected"
    );

    let poller = tokio::spawn(TrackingPoller::new(context.clone()).run());
    let dispatcher = CommandDispatcher::new(context.clone());
    let selections = SelectionHandler::new(context.clone());

    let messages = context
        .transport
        .subscribe_messages()
        .map(|event| event.map(BotEvent::Message));
    let actions = context
        .transport
        .subscribe_actions()
        .map(|event| event.map(BotEvent::Selection));
    let mut events = stream::select(messages, actions);

    let mut report = BotRunReport::default();
    let mut in_flight: JoinSet<bool> = JoinSet::new();
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("issue bot shutdown requested");
                break Ok(());
            }
            Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                record_task_outcome(&mut report, finished);
            }
            next = events.next() => {
                let Some(event) = next else {
                    break Ok(());
                };
                let event = match event.context("chat event stream failed") {
                    Ok(event) => event,
                    Err(error) => break Err(error),
                };
                match event {
                    BotEvent::Message(message) => {
                        report.messages += 1;
                        let dispatcher = dispatcher.clone();
                        in_flight.spawn(async move {
                            match dispatcher.handle_message(&message).await {
                                Ok(()) => true,
                                Err(error) => {
                                    tracing::warn!(
                                        conversation = %message.conversation,
                                        error = %format!("{error:#}"),
                                        "chat command failed"
                                    );
                                    false
                                }
                            }
                        });
                    }
                    BotEvent::Selection(selection) => {
                        report.selections += 1;
                        let selections = selections.clone();
                        in_flight.spawn(async move {
                            match selections.handle_selection(&selection).await {
                                Ok(()) => true,
                                Err(error) => {
                                    tracing::error!(
                                        conversation = %selection.conversation,
                                        error = %error,
                                        "project selection failed"
                                    );
                                    false
                                }
                            }
                        });
                    }
                }
            }
        }
    };

    if outcome.is_ok() {
        while let Some(finished) = in_flight.join_next().await {
            record_task_outcome(&mut report, finished);
        }
    } else {
        in_flight.abort_all();
    }
    poller.abort();
    tracing::info!(
        messages = report.messages,
        selections = report.selections,
        failed_events = report.failed_events,
        "issue bot stopped"
    );
    outcome.map(|()| report)
}

fn record_task_outcome(report: &mut BotRunReport, finished: Result<bool, tokio::task::JoinError>) {
    match finished {
        Ok(true) => {}
        Ok(false) => report.failed_events += 1,
        Err(error) => {
            report.failed_events += 1;
            if !error.is_cancelled() {
                tracing::error!(error = %error, "chat event task panicked");
            }
        }
    }
}
