//! Mallard Protocol - shared wire types for the chat relay
//!
//! This crate defines the types that cross a process boundary:
//! - Conversation turns in the upstream duckchat wire format
//! - Decoded stream frames
//! - Inbound request/response bodies for the proxy surface

mod api;
mod chat;
mod frame;

pub use api::*;
pub use chat::*;
pub use frame::*;
