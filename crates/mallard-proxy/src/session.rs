//! Ephemeral conversation sessions.
//!
//! A session ties a VQD token to the turn history it was issued for, plus a
//! crude running token count. Sessions live only in memory and die with the
//! process; the store trait is the seam where a TTL-based cache would slot
//! in.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use mallard_protocol::ChatTurn;

/// Approximate input cost: one token per four characters, rounded up.
/// A length proxy, not a tokenizer.
pub(crate) fn approx_input_tokens(message: &str) -> u64 {
    (message.len() as u64).div_ceil(4)
}

#[derive(Debug, Clone)]
pub struct Session {
    /// Current VQD token, if one has been acquired for this conversation.
    pub vqd: Option<String>,
    pub turns: Vec<ChatTurn>,
    /// Approximate cumulative token count across all turns.
    pub tokens: u64,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            vqd: None,
            turns: Vec::new(),
            tokens: 0,
            created_at: Utc::now(),
        }
    }

    /// Append the caller's message and charge its approximate input cost.
    pub fn push_user(&mut self, content: &str) {
        self.tokens += approx_input_tokens(content);
        self.turns.push(ChatTurn::user(content));
    }

    /// Append the assistant reply and charge one token per character.
    pub fn push_assistant(&mut self, content: &str) {
        self.tokens += content.len() as u64;
        self.turns.push(ChatTurn::assistant(content));
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyed session storage, injected into the request handlers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Option<Session>;
    async fn put(&self, id: &str, session: Session);
}

/// The in-memory store: a lock around a map, nothing more.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn put(&self, id: &str, session: Session) {
        self.sessions.write().await.insert(id.to_string(), session);
    }
}
