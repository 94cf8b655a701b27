//! Runixo Agent Library
//!
//! Authentication gateway and RPC surface of the Runixo server agent. Every
//! inbound call passes one checkpoint that verifies the caller's credential,
//! tracks failures per source address and locks out repeat offenders before
//! any handler runs.

pub mod adapter;
pub mod audit;
pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod protocol;
pub mod socket;
