use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::events::{HistoryEntry, SessionId};

/// In-memory state for a single company channel.
#[derive(Debug)]
pub struct ChannelState {
    pub company: String,
    /// Memberships in join order, keyed by connection so two connections
    /// sharing a username hold separate slots.
    pub members: Vec<(SessionId, String)>,
    pub history: VecDeque<HistoryEntry>,
    /// Set on creation and on every recorded message.
    pub last_activity: DateTime<Utc>,
}

impl ChannelState {
    pub fn new(company: String, now: DateTime<Utc>) -> Self {
        Self {
            company,
            members: Vec::new(),
            history: VecDeque::new(),
            last_activity: now,
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Usernames of all memberships, in join order.
    pub fn usernames(&self) -> Vec<String> {
        self.members.iter().map(|(_, name)| name.clone()).collect()
    }

    /// Add or refresh the membership held by `session_id`.
    pub fn add_member(&mut self, session_id: SessionId, username: &str) {
        match self.members.iter_mut().find(|(sid, _)| *sid == session_id) {
            Some((_, name)) => *name = username.to_string(),
            None => self.members.push((session_id, username.to_string())),
        }
    }

    /// Remove the membership held by `session_id`. Returns false if it had none.
    pub fn remove_member(&mut self, session_id: SessionId) -> bool {
        let before = self.members.len();
        self.members.retain(|(sid, _)| *sid != session_id);
        self.members.len() != before
    }

    /// Append to history, dropping the oldest entries beyond `limit` (0 = unbounded).
    pub fn push_history(&mut self, entry: HistoryEntry, limit: usize, now: DateTime<Utc>) {
        self.history.push_back(entry);
        if limit > 0 {
            while self.history.len() > limit {
                self.history.pop_front();
            }
        }
        self.last_activity = now;
    }
}
