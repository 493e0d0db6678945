//! Fan-out of outbound events to connected subscribers.
//!
//! Delivery is best-effort and fire-and-forget: a recipient is reached only if
//! it is registered (and subscribed, for channel scope) at the instant of the
//! call, and one recipient's failure never affects the others.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::warn;

use super::events::{ChatEvent, SessionId};

/// Why a single delivery failed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    QueueFull,
    #[error("connection closed")]
    Closed,
}

/// A connection that can receive events. Implemented by the transport-facing
/// session type so the router never depends on a specific transport.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SessionId;

    /// Hand one event to the connection without blocking.
    fn deliver(&self, event: ChatEvent) -> Result<(), DeliveryError>;
}

/// Routes events to registered subscribers, either globally or per channel topic.
#[derive(Default)]
pub struct BroadcastRouter {
    subscribers: DashMap<SessionId, Arc<dyn Subscriber>>,
    /// Company name -> subscribed connection IDs.
    topics: DashMap<String, HashSet<SessionId>>,
}

impl BroadcastRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.insert(subscriber.id(), subscriber);
    }

    /// Remove a subscriber and all of its topic subscriptions.
    pub fn unregister(&self, session_id: SessionId) {
        self.subscribers.remove(&session_id);
        self.topics.retain(|_, members| {
            members.remove(&session_id);
            !members.is_empty()
        });
    }

    pub fn subscribe(&self, company: &str, session_id: SessionId) {
        self.topics
            .entry(company.to_string())
            .or_default()
            .insert(session_id);
    }

    pub fn unsubscribe(&self, company: &str, session_id: SessionId) {
        if let Some(mut members) = self.topics.get_mut(company) {
            members.remove(&session_id);
        }
        self.topics.remove_if(company, |_, members| members.is_empty());
    }

    pub fn is_subscribed(&self, company: &str, session_id: SessionId) -> bool {
        self.topics
            .get(company)
            .is_some_and(|members| members.contains(&session_id))
    }

    pub fn is_registered(&self, session_id: SessionId) -> bool {
        self.subscribers.contains_key(&session_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver to every connection subscribed to `company`. Returns the number reached.
    pub fn to_channel(&self, company: &str, event: &ChatEvent) -> usize {
        self.fan_out(self.topic_members(company), None, event)
    }

    /// Deliver to the channel, skipping the sender.
    pub fn to_channel_except_sender(
        &self,
        company: &str,
        sender: SessionId,
        event: &ChatEvent,
    ) -> usize {
        self.fan_out(self.topic_members(company), Some(sender), event)
    }

    /// Deliver to every registered connection.
    pub fn to_all(&self, event: &ChatEvent) -> usize {
        let everyone: Vec<SessionId> = self.subscribers.iter().map(|s| *s.key()).collect();
        self.fan_out(everyone, None, event)
    }

    /// Deliver to one connection.
    pub fn to_sender(&self, session_id: SessionId, event: ChatEvent) -> bool {
        let Some(subscriber) = self.subscriber(session_id) else {
            return false;
        };
        match subscriber.deliver(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(%session_id, error = %e, "failed to deliver event");
                false
            }
        }
    }

    // Snapshot so no topic guard is held while delivering.
    fn topic_members(&self, company: &str) -> Vec<SessionId> {
        self.topics
            .get(company)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn subscriber(&self, session_id: SessionId) -> Option<Arc<dyn Subscriber>> {
        self.subscribers.get(&session_id).map(|s| s.value().clone())
    }

    fn fan_out(
        &self,
        recipients: Vec<SessionId>,
        exclude: Option<SessionId>,
        event: &ChatEvent,
    ) -> usize {
        let mut delivered = 0;
        for member_id in recipients {
            if Some(member_id) == exclude {
                continue;
            }
            let Some(subscriber) = self.subscriber(member_id) else {
                continue;
            };
            match subscriber.deliver(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%member_id, error = %e, "failed to deliver event"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::user_session::UserSession;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn connect(router: &BroadcastRouter) -> (SessionId, mpsc::Receiver<ChatEvent>) {
        let (session, rx) = UserSession::new(Uuid::new_v4(), 8);
        let id = session.id;
        router.register(Arc::new(session));
        (id, rx)
    }

    fn removed(company: &str) -> ChatEvent {
        ChatEvent::GroupRemoved {
            company: company.into(),
        }
    }

    /// Subscriber whose connection is always gone.
    struct Broken(SessionId);

    impl Subscriber for Broken {
        fn id(&self) -> SessionId {
            self.0
        }

        fn deliver(&self, _event: ChatEvent) -> Result<(), DeliveryError> {
            Err(DeliveryError::Closed)
        }
    }

    #[test]
    fn test_to_channel_reaches_only_subscribers() {
        let router = BroadcastRouter::new();
        let (a, mut rx_a) = connect(&router);
        let (_b, mut rx_b) = connect(&router);
        router.subscribe("acme", a);

        assert_eq!(router.to_channel("acme", &removed("x")), 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_to_channel_except_sender() {
        let router = BroadcastRouter::new();
        let (a, mut rx_a) = connect(&router);
        let (b, mut rx_b) = connect(&router);
        router.subscribe("acme", a);
        router.subscribe("acme", b);

        let event = ChatEvent::Typing {
            username: "alice".into(),
        };
        assert_eq!(router.to_channel_except_sender("acme", a, &event), 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), event);
    }

    #[test]
    fn test_to_all_and_to_sender() {
        let router = BroadcastRouter::new();
        let (a, mut rx_a) = connect(&router);
        let (_b, mut rx_b) = connect(&router);

        assert_eq!(router.to_all(&removed("acme")), 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());

        assert!(router.to_sender(a, removed("acme")));
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
        assert!(!router.to_sender(Uuid::new_v4(), removed("acme")));
    }

    #[test]
    fn test_failed_recipient_does_not_block_others() {
        let router = BroadcastRouter::new();
        let broken = Uuid::new_v4();
        router.register(Arc::new(Broken(broken)));
        let (ok, mut rx) = connect(&router);
        router.subscribe("acme", broken);
        router.subscribe("acme", ok);

        assert_eq!(router.to_channel("acme", &removed("acme")), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_unregister_drops_subscriptions() {
        let router = BroadcastRouter::new();
        let (a, _rx) = connect(&router);
        router.subscribe("acme", a);
        router.subscribe("globex", a);

        router.unregister(a);
        assert!(!router.is_subscribed("acme", a));
        assert!(!router.is_subscribed("globex", a));
        assert_eq!(router.subscriber_count(), 0);
        assert!(router.topics.is_empty());
    }

    #[test]
    fn test_unsubscribe_removes_empty_topic() {
        let router = BroadcastRouter::new();
        let (a, _rx) = connect(&router);
        router.subscribe("acme", a);
        router.unsubscribe("acme", a);
        assert!(!router.is_subscribed("acme", a));
        assert!(router.topics.get("acme").is_none());
        // Unknown topic is a no-op.
        router.unsubscribe("ghost", a);
    }
}
