//! Real-time group chat relay: clients join named company channels over a
//! WebSocket, exchange messages and typing indicators, and see who is present.
//! Empty channels are reclaimed immediately on the last leave, or by the idle
//! reaper once they have been quiet for the configured window.

pub mod config;
pub mod engine;
pub mod web;
