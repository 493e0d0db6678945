use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::broadcast::BroadcastRouter;
use super::error::EngineError;
use super::events::{ChatEvent, ClientEvent, HistoryEntry, SessionId};
use super::registry::{ChannelRegistry, LeaveOutcome};
use super::session_table::{Session, SessionTable};
use super::user_session::{DEFAULT_OUTBOUND_QUEUE, UserSession};
use super::validation;

/// Default idle window and sweep period: one hour.
pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_secs(3600);

/// Default number of history entries kept per channel.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Max history entries per channel (0 = unbounded).
    pub history_limit: usize,
    /// Outbound queue length per connection.
    pub outbound_queue: usize,
    /// How long an empty channel must be quiet before the reaper evicts it.
    pub idle_window: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            idle_window: DEFAULT_IDLE_WINDOW,
        }
    }
}

/// What a connection held before a join.
enum PriorSession {
    Fresh,
    Switched(Session, LeaveOutcome),
    Renamed(String),
    Rejoined,
}

/// Registry and session table share one lock so every mutation sees both
/// consistently.
struct EngineState {
    registry: ChannelRegistry,
    sessions: SessionTable,
}

/// Translates client events into registry/session mutations and drives the
/// broadcast router with the results. Transport-agnostic: the WebSocket
/// adapter calls into this.
///
/// Mutations run under the state lock. Apart from a joiner's history replay,
/// events are delivered after it is released.
pub struct ChatEngine {
    state: Mutex<EngineState>,
    router: BroadcastRouter,
    settings: EngineSettings,
}

impl ChatEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            state: Mutex::new(EngineState {
                registry: ChannelRegistry::new(settings.history_limit),
                sessions: SessionTable::new(),
            }),
            router: BroadcastRouter::new(),
            settings,
        }
    }

    // ── Connection lifecycle ────────────────────────────────────────

    /// Register a new connection. Returns its ID and the event receiver the
    /// transport's write loop should drain.
    pub fn connect(&self) -> (SessionId, mpsc::Receiver<ChatEvent>) {
        let session_id = Uuid::new_v4();
        let (session, rx) = UserSession::new(session_id, self.settings.outbound_queue);
        self.router.register(Arc::new(session));

        info!(%session_id, "connection registered");
        (session_id, rx)
    }

    /// Tear down a connection and release its channel membership. Safe to call twice.
    pub fn disconnect(&self, session_id: SessionId) {
        let departure = {
            let mut state = self.state.lock();
            let session = state.sessions.take(session_id);
            self.router.unregister(session_id);
            session.map(|s| {
                let outcome = state.registry.leave(&s.company, session_id);
                (s, outcome)
            })
        };

        match departure {
            Some((session, outcome)) => {
                info!(%session_id, company = %session.company, username = %session.username, "session disconnected");
                self.announce_departure(&session, &outcome);
            }
            None => debug!(%session_id, "connection closed without a session"),
        }
    }

    // ── Event dispatch ──────────────────────────────────────────────

    /// Validate and apply one client event.
    pub fn handle_event(&self, session_id: SessionId, event: ClientEvent) -> Result<(), EngineError> {
        match event {
            ClientEvent::Join { company, username } => self.join(session_id, &company, &username),
            ClientEvent::SendMessage {
                company,
                message,
                username,
            } => self
                .send_message(session_id, &company, &username, &message)
                .map(|_| ()),
            ClientEvent::Typing { company, username } => {
                self.typing(session_id, &company, &username, true)
            }
            ClientEvent::StopTyping { company, username } => {
                self.typing(session_id, &company, &username, false)
            }
        }
    }

    /// Join a company channel, creating it if needed.
    ///
    /// A connection already in a different channel leaves it first. Rejoining
    /// the same channel under a new name announces the old name's departure;
    /// rejoining under the same name sends no join notice.
    pub fn join(&self, session_id: SessionId, company: &str, username: &str) -> Result<(), EngineError> {
        validation::validate_company(company)?;
        validation::validate_username(username)?;

        let (prior, outcome) = {
            let mut state = self.state.lock();
            // Checked under the lock so a concurrent disconnect cannot leave
            // a membership behind for a connection that is already gone.
            if !self.router.is_registered(session_id) {
                return Err(EngineError::NoSession);
            }

            let prior = match state.sessions.put(session_id, company, username) {
                None => PriorSession::Fresh,
                Some(prev) if prev.company != company => {
                    self.router.unsubscribe(&prev.company, session_id);
                    let left = state.registry.leave(&prev.company, session_id);
                    PriorSession::Switched(prev, left)
                }
                Some(prev) if prev.username != username => PriorSession::Renamed(prev.username),
                Some(_) => PriorSession::Rejoined,
            };

            let outcome = state.registry.join(company, session_id, username, Utc::now());
            // Subscribe and replay history before releasing the lock, so the
            // joiner gets the replay ahead of any message recorded after it.
            self.router.subscribe(company, session_id);
            if !outcome.created {
                self.router
                    .to_sender(session_id, ChatEvent::OlderMessages(outcome.history.clone()));
            }
            (prior, outcome)
        };

        let announce_join = !matches!(prior, PriorSession::Rejoined);
        match prior {
            PriorSession::Switched(prev, left) => {
                info!(%session_id, from = %prev.company, to = %company, "session switched channel");
                self.announce_departure(&prev, &left);
            }
            PriorSession::Renamed(old) => {
                self.router.to_channel(
                    company,
                    &ChatEvent::Message(HistoryEntry::system(format!("{old} left the chat"))),
                );
            }
            PriorSession::Fresh | PriorSession::Rejoined => {}
        }

        if announce_join {
            self.router.to_channel(
                company,
                &ChatEvent::Message(HistoryEntry::system(format!("{username} joined the chat"))),
            );
        }
        self.router.to_channel(
            company,
            &ChatEvent::ActiveUsers {
                count: outcome.active_count,
                company: company.to_string(),
                users: outcome.members,
            },
        );

        info!(%session_id, %company, %username, created = outcome.created, "joined channel");
        Ok(())
    }

    /// Record a message in a channel's history and broadcast it to the channel.
    /// Membership of the sender is not checked; the channel must exist.
    pub fn send_message(
        &self,
        session_id: SessionId,
        company: &str,
        username: &str,
        message: &str,
    ) -> Result<HistoryEntry, EngineError> {
        validation::validate_company(company)?;
        validation::validate_username(username)?;
        validation::validate_message(message)?;

        let entry = self
            .state
            .lock()
            .registry
            .record_message(company, username, message, Utc::now())?;

        let delivered = self.router.to_channel(company, &ChatEvent::Message(entry.clone()));
        debug!(%session_id, %company, delivered, "message broadcast");
        Ok(entry)
    }

    /// Relay a typing indicator to everyone in the channel but the sender.
    pub fn typing(
        &self,
        session_id: SessionId,
        company: &str,
        username: &str,
        started: bool,
    ) -> Result<(), EngineError> {
        validation::validate_company(company)?;
        validation::validate_username(username)?;

        let username = username.to_string();
        let event = if started {
            ChatEvent::Typing { username }
        } else {
            ChatEvent::StopTyping { username }
        };
        self.router
            .to_channel_except_sender(company, session_id, &event);
        Ok(())
    }

    // ── Idle reclamation ────────────────────────────────────────────

    /// One reaper pass: evict every channel that is empty and has been quiet
    /// for the idle window, announcing each removal globally. Returns the
    /// evicted names.
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let candidates = self
            .state
            .lock()
            .registry
            .snapshot_idle_candidates(now, self.settings.idle_window);

        let mut evicted = Vec::new();
        for company in candidates {
            // A member may have arrived since the scan.
            let removed = self.state.lock().registry.evict_if_empty(&company);
            if !removed {
                continue;
            }
            info!(%company, "evicted idle channel");
            self.router.to_all(&ChatEvent::GroupRemoved {
                company: company.clone(),
            });
            evicted.push(company);
        }
        evicted
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Names of all live channels.
    pub fn list_channels(&self) -> Vec<String> {
        self.state.lock().registry.list_channels()
    }

    pub fn channel_members(&self, company: &str) -> Option<Vec<String>> {
        self.state.lock().registry.members(company)
    }

    pub fn channel_history(&self, company: &str) -> Option<Vec<HistoryEntry>> {
        self.state.lock().registry.history(company)
    }

    pub fn session(&self, session_id: SessionId) -> Option<Session> {
        self.state.lock().sessions.get(session_id).cloned()
    }

    pub fn connection_count(&self) -> usize {
        self.router.subscriber_count()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Broadcast the consequences of a connection leaving a channel.
    fn announce_departure(&self, session: &Session, outcome: &LeaveOutcome) {
        let company = &session.company;
        self.router.to_channel(
            company,
            &ChatEvent::Message(HistoryEntry::system(format!(
                "{} left the chat",
                session.username
            ))),
        );

        if outcome.still_exists {
            self.router.to_channel(
                company,
                &ChatEvent::ActiveUsers {
                    count: outcome.members.len(),
                    company: company.clone(),
                    users: outcome.members.clone(),
                },
            );
        }

        if outcome.became_empty {
            info!(%company, "last member left, channel removed");
            self.router.to_all(&ChatEvent::GroupRemoved {
                company: company.clone(),
            });
        }
    }

    #[cfg(test)]
    pub(crate) fn seed_empty_channel(&self, company: &str, last_activity: DateTime<Utc>) {
        self.state
            .lock()
            .registry
            .insert_empty(company, last_activity);
    }
}

impl Default for ChatEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}
