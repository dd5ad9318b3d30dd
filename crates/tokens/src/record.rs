//! Token record and its derived lifecycle state

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// All stored tokens, keyed by token id
pub type TokenMap = HashMap<String, TokenRecord>;

/// One shareable file: the path it serves plus creation and activation times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Absolute path of the shared file
    pub path: PathBuf,
    /// When the token was registered
    pub created_at: DateTime<Utc>,
    /// When the file was first downloaded; `None` until then
    pub activated_at: Option<DateTime<Utc>>,
}

/// Lifecycle state of a token at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Never downloaded; the validity countdown has not started
    Fresh,
    /// Downloaded at least once and still inside the validity window
    Activated,
    /// First download is older than the validity window
    Expired,
}

impl TokenRecord {
    /// A fresh, unactivated record for `path`
    pub fn new(path: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            path,
            created_at: now,
            activated_at: None,
        }
    }

    /// Lifecycle state at `now` under the given validity window.
    ///
    /// A token whose activation is exactly `validity` old is still
    /// [`TokenState::Activated`]; expiry needs the window to be exceeded.
    pub fn state(&self, now: DateTime<Utc>, validity: Duration) -> TokenState {
        match self.activated_at {
            None => TokenState::Fresh,
            Some(at) if now.signed_duration_since(at) > validity => TokenState::Expired,
            Some(_) => TokenState::Activated,
        }
    }

    /// Stamp the first download. Once set the timestamp never moves;
    /// calling this again keeps the original instant.
    pub fn activate(&mut self, now: DateTime<Utc>) {
        if self.activated_at.is_none() {
            self.activated_at = Some(now);
        }
    }

    /// The instant downloads stop being served, once activated
    pub fn expires_at(&self, validity: Duration) -> Option<DateTime<Utc>> {
        self.activated_at.map(|at| at + validity)
    }

    /// Base name of the shared file, used in download prompts and listings
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
