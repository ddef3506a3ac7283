//! MeetSL API Library Crate
//!
//! Configuration, application state, REST handlers, the WebSocket recognition
//! session and routing. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
