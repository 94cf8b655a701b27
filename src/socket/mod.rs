//! RPC socket server module.
//!
//! Accepts TCP connections and runs every frame through the checkpoint
//! before it reaches the command registry.

mod connection;
mod listener;

pub use connection::{handle_connection, ConnectionState};
pub use listener::{ConnectionMetrics, SocketListener};
