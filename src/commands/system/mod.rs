//! System commands.

mod ping;

pub use ping::PingCommand;
