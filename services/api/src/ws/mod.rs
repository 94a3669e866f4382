//! WebSocket Conversation Sessions
//!
//! Real-time spoken-practice sessions over WebSockets, structured into
//! submodules:
//!
//! - `protocol`: the JSON message format between the client and the server.
//! - `session`: the connection lifecycle, from init handshake to termination.
//! - `turn_loop`: the event loop driving the turn-taking controller.
//! - `outbox`: the best-effort recorder worker, decoupled from the live loop.

mod outbox;
pub mod protocol;
pub mod session;
mod turn_loop;

pub use session::ws_handler;
