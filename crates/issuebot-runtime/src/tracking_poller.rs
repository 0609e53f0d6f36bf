//! Periodic status polling for tracked issues.

use tokio::time::MissedTickBehavior;

use crate::bot_context::BotContext;
use crate::chat_transport::OutboundMessage;
use crate::conversation_store::StatusUpdate;
use crate::issue_render::render_status_change;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollTickReport {
    pub checked_issues: usize,
    pub status_changes: usize,
    pub failed_fetches: usize,
    pub failed_notifications: usize,
}

pub struct TrackingPoller {
    context: BotContext,
}

impl TrackingPoller {
    pub fn new(context: BotContext) -> Self {
        Self { context }
    }

    /// Runs ticks forever. The first tick fires immediately; a tick that runs
    /// past the interval delays the next one instead of overlapping it.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.context.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let report = self.run_tick().await;
            if report.checked_issues > 0 {
                tracing::debug!(
                    checked = report.checked_issues,
                    changed = report.status_changes,
                    failed_fetches = report.failed_fetches,
                    failed_notifications = report.failed_notifications,
                    "tracking poll tick finished"
                );
            }
        }
    }

    /// Fetches every tracked issue once, one request at a time.
    pub async fn run_tick(&self) -> PollTickReport {
        let mut report = PollTickReport::default();
        for (conversation, tracked) in self.context.store.tracked_snapshot() {
            for issue in tracked {
                report.checked_issues += 1;
                let live = match self.context.tracker.fetch_issue(&issue.issue_key).await {
                    Ok(live) => live,
                    Err(error) => {
                        report.failed_fetches += 1;
                        tracing::warn!(
                            conversation = %conversation,
                            issue_key = %issue.issue_key,
                            error = %error,
                            "failed to poll tracked issue"
                        );
                        continue;
                    }
                };
                if live.status == issue.last_known_status {
                    continue;
                }

                let update =
                    self.context
                        .store
                        .record_status(&conversation, &issue.issue_key, &live.status);
                let StatusUpdate::Changed { previous } = update else {
                    continue;
                };
                report.status_changes += 1;
                tracing::info!(
                    conversation = %conversation,
                    issue_key = %issue.issue_key,
                    from = %previous,
                    to = %live.status,
                    "tracked issue changed status"
                );
                let text =
                    render_status_change(&live, &self.context.tracker.browse_url(&live.key));
                if let Err(error) = self
                    .context
                    .transport
                    .send(&conversation, OutboundMessage::text(text))
                    .await
                {
                    report.failed_notifications += 1;
                    tracing::warn!(
                        conversation = %conversation,
                        issue_key = %issue.issue_key,
                        error = %format!("{error:#}"),
                        "failed to deliver status change"
                    );
                }
            }
        }
        report
    }
}
