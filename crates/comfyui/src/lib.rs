//! ComfyUI WebSocket and REST client library.
//!
//! Provides the queue / await / fetch handshake against a ComfyUI
//! compatible engine: workflow submission and image upload over HTTP,
//! typed status-event parsing, the completion waiter that watches the
//! websocket channel (with a history-poll fallback), history parsing,
//! and result fetching. [`session::GenerationEngine`] bundles the whole
//! handshake behind one trait.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod messages;
pub mod session;
pub mod waiter;
