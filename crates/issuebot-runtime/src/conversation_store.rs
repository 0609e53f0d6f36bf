//! In-memory per-conversation state: the pending new-issue draft and the
//! tracked issues with their last observed status.
//!
//! Every operation takes the lock once and releases it before returning, so no
//! caller ever holds it across an await point. Multi-step flows built from
//! several calls can still interleave with other tasks.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use issuebot_tracker::ProjectRef;

use crate::chat_transport::ConversationId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedIssue {
    pub issue_key: String,
    pub last_known_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// New-issue state waiting for the user to pick a project.
pub struct Draft {
    pub title: String,
    pub description: String,
    /// `None` when the project snapshot could not be fetched.
    pub candidate_projects: Option<Vec<ProjectRef>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Started,
    AlreadyTracking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Unchanged,
    Changed { previous: String },
    NotTracked,
}

#[derive(Debug, Default)]
struct TrackedIssues {
    next_seq: u64,
    entries: BTreeMap<u64, TrackedIssue>,
    by_key: HashMap<String, u64>,
}

/// Issue keys compare case-insensitively; `abc-1` and `ABC-1` name one issue.
fn index_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

impl TrackedIssues {
    fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(&index_key(key))
    }

    fn insert(&mut self, key: &str, status: &str) -> TrackOutcome {
        if self.contains(key) {
            return TrackOutcome::AlreadyTracking;
        }
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.entries.insert(
            seq,
            TrackedIssue {
                issue_key: key.to_string(),
                last_known_status: status.to_string(),
            },
        );
        self.by_key.insert(index_key(key), seq);
        TrackOutcome::Started
    }

    fn remove(&mut self, key: &str) -> Option<TrackedIssue> {
        let seq = self.by_key.remove(&index_key(key))?;
        self.entries.remove(&seq)
    }

    fn update_status(&mut self, key: &str, status: &str) -> StatusUpdate {
        let Some(entry) = self
            .by_key
            .get(&index_key(key))
            .and_then(|seq| self.entries.get_mut(seq))
        else {
            return StatusUpdate::NotTracked;
        };
        if entry.last_known_status == status {
            return StatusUpdate::Unchanged;
        }
        let previous = std::mem::replace(&mut entry.last_known_status, status.to_string());
        StatusUpdate::Changed { previous }
    }

    fn ordered(&self) -> Vec<TrackedIssue> {
        self.entries.values().cloned().collect()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
struct ConversationState {
    draft: Option<Draft>,
    tracked: TrackedIssues,
}

#[derive(Debug, Default)]
/// Process-wide conversation state shared by the dispatcher, the selection
/// handler, and the tracking poller.
pub struct ConversationStore {
    conversations: Mutex<HashMap<ConversationId, ConversationState>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, ConversationState>> {
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a draft, returning the one it replaced.
    pub fn set_draft(&self, conversation: &ConversationId, draft: Draft) -> Option<Draft> {
        self.lock()
            .entry(conversation.clone())
            .or_default()
            .draft
            .replace(draft)
    }

    pub fn draft(&self, conversation: &ConversationId) -> Option<Draft> {
        self.lock()
            .get(conversation)
            .and_then(|state| state.draft.clone())
    }

    pub fn clear_draft(&self, conversation: &ConversationId) -> Option<Draft> {
        self.lock()
            .get_mut(conversation)
            .and_then(|state| state.draft.take())
    }

    pub fn track(
        &self,
        conversation: &ConversationId,
        issue_key: &str,
        status: &str,
    ) -> TrackOutcome {
        self.lock()
            .entry(conversation.clone())
            .or_default()
            .tracked
            .insert(issue_key, status)
    }

    pub fn is_tracking(&self, conversation: &ConversationId, issue_key: &str) -> bool {
        self.lock()
            .get(conversation)
            .is_some_and(|state| state.tracked.contains(issue_key))
    }

    /// Removes a tracked issue, returning the entry with its stored key.
    pub fn untrack(
        &self,
        conversation: &ConversationId,
        issue_key: &str,
    ) -> Option<TrackedIssue> {
        self.lock()
            .get_mut(conversation)
            .and_then(|state| state.tracked.remove(issue_key))
    }

    pub fn tracked_issues(&self, conversation: &ConversationId) -> Vec<TrackedIssue> {
        self.lock()
            .get(conversation)
            .map(|state| state.tracked.ordered())
            .unwrap_or_default()
    }

    /// Copies the tracked issues of every conversation that has any, ordered by conversation id.
    pub fn tracked_snapshot(&self) -> Vec<(ConversationId, Vec<TrackedIssue>)> {
        let mut rows = self
            .lock()
            .iter()
            .filter(|(_, state)| !state.tracked.is_empty())
            .map(|(conversation, state)| (conversation.clone(), state.tracked.ordered()))
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| left.0.cmp(&right.0));
        rows
    }

    pub fn record_status(
        &self,
        conversation: &ConversationId,
        issue_key: &str,
        status: &str,
    ) -> StatusUpdate {
        self.lock()
            .get_mut(conversation)
            .map(|state| state.tracked.update_status(issue_key, status))
            .unwrap_or(StatusUpdate::NotTracked)
    }
}
