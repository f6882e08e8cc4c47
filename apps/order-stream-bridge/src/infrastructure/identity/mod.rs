//! JSON Identity Store
//!
//! Loads the submitter identities from a JSON file at startup:
//!
//! ```json
//! [
//!   { "token": "tok1", "name": "alice", "secret": "s3cret" },
//!   { "token": "tok2", "name": "bob",   "secret": "hunter2" }
//! ]
//! ```
//!
//! The result is an immutable [`IdentityDirectory`]; nothing reloads it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::identity::{IdentityDirectory, IdentityRecord, token_preview};

/// Error loading the identity file.
#[derive(Debug, thiserror::Error)]
pub enum IdentityStoreError {
    /// The file could not be read.
    #[error("failed to read identity file {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not a valid identity list.
    #[error("invalid identity file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// Two entries share a token.
    #[error("duplicate identity token {token_preview}")]
    DuplicateToken {
        /// Log-safe token preview.
        token_preview: String,
    },

    /// An entry has an empty token or name.
    #[error("identity entry {index} has an empty {field}")]
    EmptyField {
        /// Position in the list.
        index: usize,
        /// Field name.
        field: &'static str,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IdentityEntry {
    token: String,
    name: String,
    #[serde(default)]
    secret: String,
}

/// Identity store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonIdentityStore {
    path: PathBuf,
}

impl JsonIdentityStore {
    /// Create a store for `path`. Nothing is read until [`Self::load`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or malformed, or if any
    /// entry is empty or repeats a token.
    pub fn load(&self) -> Result<IdentityDirectory, IdentityStoreError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| IdentityStoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let directory = Self::parse(&raw).map_err(|e| match e {
            ParseFailure::Json(source) => IdentityStoreError::Parse {
                path: self.path.clone(),
                source,
            },
            ParseFailure::Invalid(err) => err,
        })?;

        tracing::info!(
            path = %self.path.display(),
            identities = directory.len(),
            "Identity directory loaded"
        );
        Ok(directory)
    }

    fn parse(raw: &str) -> Result<IdentityDirectory, ParseFailure> {
        let entries: Vec<IdentityEntry> = serde_json::from_str(raw).map_err(ParseFailure::Json)?;

        let mut seen = HashSet::with_capacity(entries.len());
        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            if entry.token.is_empty() {
                return Err(ParseFailure::Invalid(IdentityStoreError::EmptyField {
                    index,
                    field: "token",
                }));
            }
            if entry.name.is_empty() {
                return Err(ParseFailure::Invalid(IdentityStoreError::EmptyField {
                    index,
                    field: "name",
                }));
            }
            if !seen.insert(entry.token.clone()) {
                return Err(ParseFailure::Invalid(IdentityStoreError::DuplicateToken {
                    token_preview: token_preview(&entry.token),
                }));
            }
            records.push((entry.token, IdentityRecord::new(entry.name, entry.secret)));
        }

        Ok(IdentityDirectory::new(records))
    }
}

enum ParseFailure {
    Json(serde_json::Error),
    Invalid(IdentityStoreError),
}
