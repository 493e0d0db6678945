use std::collections::HashMap;

use super::events::SessionId;

/// The (company, username) a connection last joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub company: String,
    pub username: String,
}

/// Maps live connections to their session. Holds lookup keys only; channel
/// state stays in the registry.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the session for a connection, returning the one it replaced.
    pub fn put(&mut self, session_id: SessionId, company: &str, username: &str) -> Option<Session> {
        self.sessions.insert(
            session_id,
            Session {
                company: company.to_string(),
                username: username.to_string(),
            },
        )
    }

    /// Remove and return the session for a connection.
    pub fn take(&mut self, session_id: SessionId) -> Option<Session> {
        self.sessions.remove(&session_id)
    }

    pub fn get(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions.get(&session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_put_overwrites_previous_session() {
        let mut table = SessionTable::new();
        let sid = Uuid::new_v4();
        assert!(table.put(sid, "acme", "alice").is_none());

        let previous = table.put(sid, "globex", "alice").unwrap();
        assert_eq!(previous.company, "acme");
        assert_eq!(table.get(sid).unwrap().company, "globex");
        assert_eq!(table.take(sid).unwrap().company, "globex");
        assert!(table.get(sid).is_none());
    }

    #[test]
    fn test_take_removes_once() {
        let mut table = SessionTable::new();
        let sid = Uuid::new_v4();
        table.put(sid, "acme", "alice");

        let session = table.take(sid).unwrap();
        assert_eq!(session.username, "alice");
        assert!(table.take(sid).is_none());
        assert!(table.get(sid).is_none());
    }
}
