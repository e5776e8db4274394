//! Bounded per-user conversation memory.
//!
//! [`ConversationMemory`] maps user IDs to independent ring buffers of
//! [`ConversationEntry`] values. Each log sits behind its own `Mutex`, so
//! concurrent requests for one user are serialized while different users
//! never contend beyond the brief map lookup.
//!
//! Logs live until [`ConversationMemory::clear`] or
//! [`ConversationMemory::evict_idle`] removes them.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{RagError, Result};

/// Default number of entries kept per user.
pub const DEFAULT_MEMORY_BOUND: usize = 10;

/// Who authored a conversation entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The student asking questions.
    User,
    /// The tutor's answers.
    Assistant,
}

impl Role {
    /// Lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a user's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationEntry {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ConversationEntry {
    /// Create an entry.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// A FIFO ring buffer of conversation entries.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    entries: VecDeque<ConversationEntry>,
    bound: usize,
    last_active: Instant,
}

impl ConversationLog {
    fn new(bound: usize) -> Self {
        Self { entries: VecDeque::with_capacity(bound), bound, last_active: Instant::now() }
    }

    /// Append an entry, evicting the oldest ones beyond the bound.
    pub fn push(&mut self, entry: ConversationEntry) {
        self.last_active = Instant::now();
        self.entries.push_back(entry);
        while self.entries.len() > self.bound {
            self.entries.pop_front();
        }
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ConversationEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries kept.
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Time since the log was created or last appended to.
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }
}

/// Shared handle to one user's log.
pub type ConversationHandle = Arc<Mutex<ConversationLog>>;

/// Keyed store of per-user conversation logs.
///
/// # Example
///
/// ```rust,ignore
/// use tutor_rag::{ConversationMemory, Role};
///
/// let memory = ConversationMemory::default();
/// memory.append("student-1", Role::User, "What is ATP?").await;
/// let last_two = memory.recent("student-1", 2).await;
/// ```
#[derive(Debug)]
pub struct ConversationMemory {
    bound: usize,
    logs: RwLock<HashMap<String, ConversationHandle>>,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self { bound: DEFAULT_MEMORY_BOUND, logs: RwLock::default() }
    }
}

impl ConversationMemory {
    /// Create a memory keeping at most `bound` entries per user.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `bound` is zero.
    pub fn new(bound: usize) -> Result<Self> {
        if bound == 0 {
            return Err(RagError::ConfigError("memory bound must be greater than zero".into()));
        }
        Ok(Self { bound, logs: RwLock::default() })
    }

    /// Per-user entry bound.
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Handle to the user's log, created empty on first access.
    pub async fn get(&self, user_id: &str) -> ConversationHandle {
        if let Some(handle) = self.logs.read().await.get(user_id) {
            return Arc::clone(handle);
        }
        let mut logs = self.logs.write().await;
        let handle = logs.entry(user_id.to_string()).or_insert_with(|| {
            debug!(user_id, "created conversation log");
            Arc::new(Mutex::new(ConversationLog::new(self.bound)))
        });
        Arc::clone(handle)
    }

    /// Append one message to the user's log.
    pub async fn append(&self, user_id: &str, role: Role, content: impl Into<String>) {
        let handle = self.get(user_id).await;
        handle.lock().await.push(ConversationEntry::new(role, content));
    }

    /// Append a question and its answer under a single lock acquisition, so
    /// racing requests for the same user never interleave their halves.
    pub async fn append_exchange(&self, user_id: &str, question: &str, answer: &str) {
        let handle = self.get(user_id).await;
        let mut log = handle.lock().await;
        log.push(ConversationEntry::new(Role::User, question));
        log.push(ConversationEntry::new(Role::Assistant, answer));
    }

    /// The most recent `n` entries of the user's log, oldest first.
    ///
    /// Unknown users have no history; no log is created for them.
    pub async fn recent(&self, user_id: &str, n: usize) -> Vec<ConversationEntry> {
        let handle = match self.logs.read().await.get(user_id) {
            Some(handle) => Arc::clone(handle),
            None => return Vec::new(),
        };
        let log = handle.lock().await;
        log.recent(n)
    }

    /// Remove the user's log entirely; the next access starts fresh.
    pub async fn clear(&self, user_id: &str) {
        if self.logs.write().await.remove(user_id).is_some() {
            debug!(user_id, "cleared conversation log");
        }
    }

    /// Remove logs idle for longer than `max_idle`. Logs locked by an
    /// in-flight request are kept. Returns the number of removed logs.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut logs = self.logs.write().await;
        let before = logs.len();
        logs.retain(|_, handle| match handle.try_lock() {
            Ok(log) => log.idle_for() <= max_idle,
            Err(_) => true,
        });
        let evicted = before - logs.len();
        if evicted > 0 {
            debug!(evicted, remaining = logs.len(), "evicted idle conversation logs");
        }
        evicted
    }

    /// Number of users with a live log.
    pub async fn active_users(&self) -> usize {
        self.logs.read().await.len()
    }
}
