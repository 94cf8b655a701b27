//! Transport adapters around the authorization checkpoint.
//!
//! Each adapter pulls the method, peer address and credential out of its
//! transport, asks [`Gateway::authorize`](crate::auth::Gateway::authorize),
//! and turns a rejection into that transport's status vocabulary.

pub mod http;
pub mod rpc;
