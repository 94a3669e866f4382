//! Lingua API Library Crate
//!
//! All the core logic for the lingua web service: application state, data
//! access, REST handlers, the conversation WebSocket loop, and routing. The
//! binaries in `bin/` are thin wrappers around this library.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
