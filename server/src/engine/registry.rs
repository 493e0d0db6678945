use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::channel::ChannelState;
use super::error::EngineError;
use super::events::{HistoryEntry, SessionId};

/// Result of [`ChannelRegistry::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// True if the channel did not exist before this join.
    pub created: bool,
    pub history: Vec<HistoryEntry>,
    pub active_count: usize,
    pub members: Vec<String>,
}

/// Result of [`ChannelRegistry::leave`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The connection actually held a membership.
    pub removed: bool,
    pub still_exists: bool,
    pub members: Vec<String>,
    /// The channel was deleted because this leave emptied it.
    pub became_empty: bool,
}

/// Owns every channel: membership, history and activity timestamps.
/// Pure data, no I/O. Callers serialize access (see `ChatEngine`).
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: HashMap<String, ChannelState>,
    /// Max history entries kept per channel (0 = unbounded).
    history_limit: usize,
}

impl ChannelRegistry {
    pub fn new(history_limit: usize) -> Self {
        Self {
            channels: HashMap::new(),
            history_limit,
        }
    }

    /// Add a membership, creating the channel if absent.
    pub fn join(
        &mut self,
        company: &str,
        session_id: SessionId,
        username: &str,
        now: DateTime<Utc>,
    ) -> JoinOutcome {
        let created = !self.channels.contains_key(company);
        let channel = self
            .channels
            .entry(company.to_string())
            .or_insert_with(|| ChannelState::new(company.to_string(), now));

        channel.add_member(session_id, username);

        JoinOutcome {
            created,
            history: channel.history.iter().cloned().collect(),
            active_count: channel.member_count(),
            members: channel.usernames(),
        }
    }

    /// Append a message to an existing channel's history.
    pub fn record_message(
        &mut self,
        company: &str,
        username: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<HistoryEntry, EngineError> {
        let channel = self
            .channels
            .get_mut(company)
            .ok_or_else(|| EngineError::UnknownChannel(company.to_string()))?;

        let entry = HistoryEntry::new(username, message);
        channel.push_history(entry.clone(), self.history_limit, now);
        Ok(entry)
    }

    /// Drop a membership. A channel left with no members is deleted together
    /// with its history. Leaving an absent channel is a no-op.
    pub fn leave(&mut self, company: &str, session_id: SessionId) -> LeaveOutcome {
        let Some(channel) = self.channels.get_mut(company) else {
            return LeaveOutcome {
                removed: false,
                still_exists: false,
                members: Vec::new(),
                became_empty: false,
            };
        };

        let removed = channel.remove_member(session_id);
        let members = channel.usernames();

        if channel.is_empty() {
            self.channels.remove(company);
            return LeaveOutcome {
                removed,
                still_exists: false,
                members,
                became_empty: true,
            };
        }

        LeaveOutcome {
            removed,
            still_exists: true,
            members,
            became_empty: false,
        }
    }

    /// Names of all live channels, in no particular order.
    pub fn list_channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Channels with no members whose last activity is at least `idle_window` old.
    pub fn snapshot_idle_candidates(&self, now: DateTime<Utc>, idle_window: Duration) -> Vec<String> {
        self.channels
            .values()
            .filter(|ch| ch.is_empty())
            .filter(|ch| {
                // A timestamp in the future counts as zero elapsed time.
                let idle = (now - ch.last_activity).to_std().unwrap_or(Duration::ZERO);
                idle >= idle_window
            })
            .map(|ch| ch.company.clone())
            .collect()
    }

    /// Unconditionally delete a channel. Returns false if it was already gone.
    pub fn evict(&mut self, company: &str) -> bool {
        self.channels.remove(company).is_some()
    }

    /// Delete a channel only if it still has no members.
    pub fn evict_if_empty(&mut self, company: &str) -> bool {
        match self.channels.get(company) {
            Some(ch) if ch.is_empty() => self.channels.remove(company).is_some(),
            _ => false,
        }
    }

    pub fn contains(&self, company: &str) -> bool {
        self.channels.contains_key(company)
    }

    pub fn members(&self, company: &str) -> Option<Vec<String>> {
        self.channels.get(company).map(ChannelState::usernames)
    }

    pub fn history(&self, company: &str) -> Option<Vec<HistoryEntry>> {
        self.channels
            .get(company)
            .map(|ch| ch.history.iter().cloned().collect())
    }

    /// Insert a memberless channel with a chosen activity time.
    #[cfg(test)]
    pub(crate) fn insert_empty(&mut self, company: &str, last_activity: DateTime<Utc>) {
        self.channels.insert(
            company.to_string(),
            ChannelState::new(company.to_string(), last_activity),
        );
    }
}
