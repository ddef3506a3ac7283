//! WebSocket Recognition Sessions
//!
//! - `protocol`: the JSON messages exchanged with the browser and session id rules.
//! - `session`: the connection lifecycle, from upgrade to close.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
