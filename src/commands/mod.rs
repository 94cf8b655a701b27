//! Command handlers module.
//!
//! Holds the registry and every method served behind the checkpoint.
//!
//! ## Adding a Method
//!
//! 1. Implement the `Command` trait in the matching subdirectory
//! 2. Register it in `CommandRegistry::new()`

mod registry;
mod traits;
mod types;

pub mod auth;
pub mod system;

pub use registry::CommandRegistry;
pub use traits::Command;
pub use types::{CommandParams, CommandResult, ExecutionContext};
