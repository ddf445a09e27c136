//! Caller authorization.
//!
//! The [`IdentityGate`] holds a map from caller identity to a permission
//! flag. Only an explicit `true` entry confers access. A single root
//! identity, fixed at construction, is the only caller allowed to grant
//! new entries; there is no delegation and no revocation.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::RwLock;

use crate::error::ServiceError;

/// Opaque identity of a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(String);

impl CallerId {
    /// Creates a caller identity from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity used when a request carries none. Never authorized unless
    /// explicitly granted.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self(String::new())
    }

    /// Returns the string form of this identity.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<anonymous>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Authorization map plus the root of trust allowed to extend it.
pub struct IdentityGate {
    root: CallerId,
    entries: RwLock<HashMap<String, bool>>,
}

impl IdentityGate {
    /// Creates a gate with no authorized callers.
    #[must_use]
    pub fn new(root: CallerId) -> Self {
        Self {
            root,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuilds a gate from snapshot entries.
    #[must_use]
    pub fn restore(root: CallerId, entries: Vec<(String, bool)>) -> Self {
        Self {
            root,
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }

    /// Returns the identity allowed to grant authorization.
    #[must_use]
    pub const fn root(&self) -> &CallerId {
        &self.root
    }

    /// Returns `true` iff `caller` has an explicit `true` entry.
    pub async fn is_authorized(&self, caller: &CallerId) -> bool {
        let entries = self.entries.read().await;
        entries.get(caller.as_str()).copied().unwrap_or(false)
    }

    /// Grants `target` access. Only the root identity may do this.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] if `granter` is not the root;
    /// the map is left untouched in that case.
    pub async fn add_authorized_user(
        &self,
        granter: &CallerId,
        target: &CallerId,
    ) -> Result<(), ServiceError> {
        if granter != &self.root {
            tracing::warn!(granter = %granter, user = %target, "grant rejected: not root");
            return Err(ServiceError::Unauthorized);
        }
        let mut entries = self.entries.write().await;
        entries.insert(target.as_str().to_string(), true);
        drop(entries);
        tracing::info!(user = %target, "caller authorized");
        Ok(())
    }

    /// Flattens the map into entries sorted by identity.
    pub async fn snapshot(&self) -> Vec<(String, bool)> {
        let entries = self.entries.read().await;
        let mut out: Vec<_> = entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
        drop(entries);
        out.sort();
        out
    }
}
