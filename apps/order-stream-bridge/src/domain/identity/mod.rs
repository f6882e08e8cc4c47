//! Submitter Identities
//!
//! The read-only directory mapping submitter tokens to identities. It is built
//! once at startup and shared behind an `Arc` by every processing loop; it has
//! no mutating API after construction, so reads need no locking.

use std::collections::HashMap;
use std::fmt;

/// Characters of a token that may appear in logs.
const TOKEN_PREVIEW_CHARS: usize = 4;

/// An identity allowed to submit orders.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    name: String,
    secret: String,
}

impl IdentityRecord {
    /// Create a new identity record.
    #[must_use]
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }

    /// Identity name used in client order ids and order tracking.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session-scoped secret material.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("name", &self.name)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Immutable token → identity lookup.
#[derive(Clone, Default)]
pub struct IdentityDirectory {
    by_token: HashMap<String, IdentityRecord>,
}

impl IdentityDirectory {
    /// Build a directory from token/record pairs. Later duplicates win.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (String, IdentityRecord)>) -> Self {
        Self {
            by_token: entries.into_iter().collect(),
        }
    }

    /// Look up the identity for a submitter token.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<&IdentityRecord> {
        self.by_token.get(token)
    }

    /// Number of known identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    /// Whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

impl fmt::Debug for IdentityDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityDirectory")
            .field("identities", &self.by_token.len())
            .finish()
    }
}

/// Log-safe rendering of a submitter token: a short prefix and the length.
#[must_use]
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_PREVIEW_CHARS).collect();
    format!("{prefix}...(len={})", token.len())
}
