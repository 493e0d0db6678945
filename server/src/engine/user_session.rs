use tokio::sync::mpsc;

use super::broadcast::{DeliveryError, Subscriber};
use super::events::{ChatEvent, SessionId};

/// Default bound on queued outbound events per connection.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 1024;

/// A connected client. Transport-agnostic: the engine only sees an outbound
/// queue that the transport's write loop drains.
#[derive(Debug)]
pub struct UserSession {
    pub id: SessionId,
    /// Bounded so a slow client cannot exhaust memory.
    pub outbound: mpsc::Sender<ChatEvent>,
}

impl UserSession {
    /// Create a session and the receiver its write loop should drain.
    pub fn new(id: SessionId, queue_len: usize) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (tx, rx) = mpsc::channel(queue_len.max(1));
        let session = Self { id, outbound: tx };
        (session, rx)
    }
}

impl Subscriber for UserSession {
    fn id(&self) -> SessionId {
        self.id
    }

    /// Never blocks: a full queue drops the event rather than stalling the sender.
    fn deliver(&self, event: ChatEvent) -> Result<(), DeliveryError> {
        self.outbound.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}
