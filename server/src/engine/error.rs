use thiserror::Error;

/// Errors surfaced by the chat engine. None of them are fatal: the transport
/// adapter logs and drops the offending event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Missing or malformed event field. Nothing was mutated or broadcast.
    #[error("invalid event: {0}")]
    Validation(String),

    /// A message was sent to a channel that does not exist.
    #[error("no such channel: {0}")]
    UnknownChannel(String),

    /// The connection is not registered with the engine.
    #[error("session not found")]
    NoSession,
}

impl From<String> for EngineError {
    fn from(reason: String) -> Self {
        EngineError::Validation(reason)
    }
}
