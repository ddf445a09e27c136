//! In-memory chat transcript.
//!
//! The [`MessageStore`] maps [`MessageKey`] to [`ChatMessage`]. Writes under
//! an existing key replace the old value (last-write-wins). There is no
//! deletion and no size bound: the transcript grows for the lifetime of the
//! service and is carried across restarts by the snapshot.

use std::collections::BTreeMap;

use parley_proto::message::{ChatMessage, MessageKey, Role};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Transcript {
    messages: BTreeMap<MessageKey, ChatMessage>,
    last_key: Option<MessageKey>,
}

/// Keyed chat transcript, ordered by key.
///
/// Thread-safe via [`RwLock`]. Each write is a single replace under the
/// write lock, so interleaved writers never observe a torn entry.
#[derive(Debug, Default)]
pub struct MessageStore {
    inner: RwLock<Transcript>,
}

impl MessageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from snapshot entries.
    ///
    /// Consumes the entries; the flat form has no further use once the live
    /// store exists.
    #[must_use]
    pub fn restore(entries: Vec<(MessageKey, ChatMessage)>) -> Self {
        let messages: BTreeMap<_, _> = entries.into_iter().collect();
        let last_key = messages.keys().next_back().copied();
        Self {
            inner: RwLock::new(Transcript { messages, last_key }),
        }
    }

    /// Inserts or overwrites the message under `key`.
    pub async fn put(&self, key: MessageKey, message: ChatMessage) {
        let mut inner = self.inner.write().await;
        inner.messages.insert(key, message);
        if inner.last_key.is_none_or(|last| key > last) {
            inner.last_key = Some(key);
        }
    }

    /// Stores a new message under a fresh key derived from `now_nanos`.
    ///
    /// The key is strictly greater than every key handed out before, so two
    /// appends in the same clock tick never overwrite each other.
    pub async fn append(&self, role: Role, content: String, now_nanos: u64) -> ChatMessage {
        let mut inner = self.inner.write().await;
        let key = MessageKey::after(inner.last_key, now_nanos);
        let message = ChatMessage {
            role,
            content,
            timestamp: key,
        };
        inner.messages.insert(key, message.clone());
        inner.last_key = Some(key);
        drop(inner);
        message
    }

    /// Returns the message stored under `key`, if any.
    pub async fn get(&self, key: MessageKey) -> Option<ChatMessage> {
        let inner = self.inner.read().await;
        inner.messages.get(&key).cloned()
    }

    /// Returns every message in key order.
    pub async fn list_all(&self) -> Vec<ChatMessage> {
        let inner = self.inner.read().await;
        inner.messages.values().cloned().collect()
    }

    /// Returns the number of stored messages.
    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    /// Returns `true` if the transcript is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.messages.is_empty()
    }

    /// Captures every entry as a flat key/value sequence.
    pub async fn snapshot(&self) -> Vec<(MessageKey, ChatMessage)> {
        let inner = self.inner.read().await;
        inner
            .messages
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }
}
