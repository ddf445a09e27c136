//! Chat transcript types.
//!
//! A [`ChatMessage`] is immutable once created. Its [`MessageKey`] is a
//! nanosecond clock reading that doubles as the store key, so keys must be
//! unique; see [`MessageKey::after`] for how uniqueness is kept when two
//! messages land in the same clock tick.

use serde::{Deserialize, Serialize};

/// Who authored a message in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by an authorized caller.
    User,
    /// Reply produced by the generation backend (or the fallback text).
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Nanosecond timestamp identifying a message.
///
/// Ordered and hashable so it can key an ordered map directly. Rendered
/// externally as decimal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageKey(u64);

impl MessageKey {
    /// Wraps a raw nanosecond reading.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the raw nanosecond value.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the key for a clock reading of `now_nanos` taken after `prev`.
    ///
    /// The result is strictly greater than `prev` even if the clock has not
    /// advanced (or went backwards) since `prev` was issued. The one
    /// exception is `prev == u64::MAX` (the year 2554 in nanoseconds), where
    /// the key saturates and repeats `prev`.
    #[must_use]
    pub fn after(prev: Option<Self>, now_nanos: u64) -> Self {
        match prev {
            Some(prev) if now_nanos <= prev.0 => Self(prev.0.saturating_add(1)),
            _ => Self(now_nanos),
        }
    }
}

impl std::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Nanosecond timestamp; equal to the message's store key.
    pub timestamp: MessageKey,
}

impl ChatMessage {
    /// Creates a message authored by a caller.
    #[must_use]
    pub fn user(content: impl Into<String>, timestamp: MessageKey) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
        }
    }

    /// Creates a message authored by the assistant.
    #[must_use]
    pub fn assistant(content: impl Into<String>, timestamp: MessageKey) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
        }
    }
}
