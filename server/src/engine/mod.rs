pub mod broadcast;
pub mod channel;
pub mod chat_engine;
pub mod error;
pub mod events;
pub mod reaper;
pub mod registry;
pub mod session_table;
pub mod user_session;
pub mod validation;
