//! Access decisions for download and landing-page requests
//!
//! These functions are pure over a loaded [`TokenMap`]: callers supply
//! `now` and the validity window, persist the map afterwards, and do the
//! actual file I/O. Every expiry rule stays testable without touching a
//! clock or a disk.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};

use crate::record::{TokenMap, TokenState};

/// Why a download request was refused.
///
/// Every variant is presented to the requester as the same not-found
/// response; they are only told apart in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No record under that token id
    UnknownToken,
    /// First download is older than the validity window
    Expired,
    /// The record exists but the backing file is gone
    FileMissing,
}

impl Denial {
    /// Short marker used in log lines
    pub fn reason(&self) -> &'static str {
        match self {
            Denial::UnknownToken => "unknown token",
            Denial::Expired => "expired",
            Denial::FileMissing => "missing file",
        }
    }
}

/// Decision for a download request
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// Stream the file. `first` marks this request as the activation
    /// event; the caller must then apply [`activate`] and persist.
    Granted {
        path: PathBuf,
        name: String,
        first: bool,
    },
    Denied(Denial),
}

/// Decide whether a download of `id` may proceed at `now`.
///
/// Does not mutate the map. When the decision is `Granted { first: true }`
/// the caller verifies the backing file first, then applies [`activate`]
/// and persists before streaming a byte.
pub fn access(map: &TokenMap, id: &str, now: DateTime<Utc>, validity: Duration) -> Access {
    let record = match map.get(id) {
        Some(record) => record,
        None => return Access::Denied(Denial::UnknownToken),
    };
    match record.state(now, validity) {
        TokenState::Expired => Access::Denied(Denial::Expired),
        TokenState::Fresh => Access::Granted {
            path: record.path.clone(),
            name: record.file_name(),
            first: true,
        },
        TokenState::Activated => Access::Granted {
            path: record.path.clone(),
            name: record.file_name(),
            first: false,
        },
    }
}

/// Apply the activation transition to `id`.
///
/// Returns true when the record transitioned now; false when it was
/// already activated (the original timestamp is kept) or the id is gone.
pub fn activate(map: &mut TokenMap, id: &str, now: DateTime<Utc>) -> bool {
    match map.get_mut(id) {
        Some(record) if record.activated_at.is_none() => {
            record.activate(now);
            true
        }
        _ => false,
    }
}

/// What the landing page displays for one token
#[derive(Debug, Clone, PartialEq)]
pub struct Landing {
    pub path: PathBuf,
    pub name: String,
    /// Download deadline, shown once the token has been activated
    pub valid_until: Option<DateTime<Utc>>,
}

/// Read-only lookup backing the landing page.
///
/// Expired tokens still get a page until they are purged; only the
/// download route refuses them.
pub fn peek(map: &TokenMap, id: &str, validity: Duration) -> Option<Landing> {
    map.get(id).map(|record| Landing {
        path: record.path.clone(),
        name: record.file_name(),
        valid_until: record.expires_at(validity),
    })
}

/// Drop every expired record, returning the removed ids.
///
/// Unactivated and still-valid records are untouched, so running this
/// twice removes nothing the second time.
pub fn purge_expired(map: &mut TokenMap, now: DateTime<Utc>, validity: Duration) -> Vec<String> {
    let mut purged = Vec::new();
    map.retain(|id, record| match record.state(now, validity) {
        TokenState::Expired => {
            purged.push(id.clone());
            false
        }
        _ => true,
    });
    purged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TokenRecord;
    use crate::validity_window;

    fn map_with(id: &str, record: TokenRecord) -> TokenMap {
        let mut map = TokenMap::new();
        map.insert(id.to_string(), record);
        map
    }

    fn fresh_record(now: DateTime<Utc>) -> TokenRecord {
        TokenRecord::new(PathBuf::from("/srv/files/report.pdf"), now)
    }

    fn activated_record(now: DateTime<Utc>, hours_ago: i64) -> TokenRecord {
        let mut record = fresh_record(now - Duration::hours(hours_ago));
        record.activate(now - Duration::hours(hours_ago));
        record
    }

    #[test]
    fn test_access_unknown_token() {
        let map = TokenMap::new();
        assert_eq!(
            access(&map, "ab12cd34", Utc::now(), validity_window()),
            Access::Denied(Denial::UnknownToken)
        );
    }

    #[test]
    fn test_access_fresh_token_is_first() {
        let now = Utc::now();
        let map = map_with("ab12cd34", fresh_record(now));
        assert_eq!(
            access(&map, "ab12cd34", now, validity_window()),
            Access::Granted {
                path: PathBuf::from("/srv/files/report.pdf"),
                name: "report.pdf".to_string(),
                first: true,
            }
        );
    }

    #[test]
    fn test_access_activated_token_not_first() {
        let now = Utc::now();
        let map = map_with("ab12cd34", activated_record(now, 2));
        assert_eq!(
            access(&map, "ab12cd34", now, validity_window()),
            Access::Granted {
                path: PathBuf::from("/srv/files/report.pdf"),
                name: "report.pdf".to_string(),
                first: false,
            }
        );
    }

    #[test]
    fn test_access_expired_token_denied() {
        let now = Utc::now();
        let map = map_with("ab12cd34", activated_record(now, 5));
        assert_eq!(
            access(&map, "ab12cd34", now, validity_window()),
            Access::Denied(Denial::Expired)
        );
    }

    #[test]
    fn test_access_never_mutates() {
        let now = Utc::now();
        let map = map_with("ab12cd34", fresh_record(now));
        let before = map.clone();
        let _ = access(&map, "ab12cd34", now, validity_window());
        assert_eq!(map, before);
    }

    #[test]
    fn test_activate_only_once() {
        let now = Utc::now();
        let mut map = map_with("ab12cd34", fresh_record(now));

        assert!(activate(&mut map, "ab12cd34", now));
        assert_eq!(map["ab12cd34"].activated_at, Some(now));

        // Second call reports no transition and keeps the first stamp
        assert!(!activate(&mut map, "ab12cd34", now + Duration::hours(1)));
        assert_eq!(map["ab12cd34"].activated_at, Some(now));

        assert!(!activate(&mut map, "missing0", now));
    }

    #[test]
    fn test_peek_shows_deadline_once_activated() {
        let now = Utc::now();
        let mut map = map_with("ab12cd34", fresh_record(now));

        let landing = peek(&map, "ab12cd34", validity_window()).unwrap();
        assert_eq!(landing.name, "report.pdf");
        assert_eq!(landing.valid_until, None);

        activate(&mut map, "ab12cd34", now);
        let landing = peek(&map, "ab12cd34", validity_window()).unwrap();
        assert_eq!(landing.valid_until, Some(now + validity_window()));

        assert!(peek(&map, "missing0", validity_window()).is_none());
    }

    #[test]
    fn test_peek_still_answers_for_expired() {
        let now = Utc::now();
        let map = map_with("ab12cd34", activated_record(now, 5));
        let landing = peek(&map, "ab12cd34", validity_window()).unwrap();
        assert!(landing.valid_until.unwrap() < now);
    }

    #[test]
    fn test_purge_removes_only_expired() {
        let now = Utc::now();
        let mut map = TokenMap::new();
        map.insert("fresh000".to_string(), fresh_record(now));
        map.insert("active00".to_string(), activated_record(now, 2));
        map.insert("expired0".to_string(), activated_record(now, 5));
        map.insert("expired1".to_string(), activated_record(now, 50));

        let mut purged = purge_expired(&mut map, now, validity_window());
        purged.sort();
        assert_eq!(purged, vec!["expired0", "expired1"]);
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("fresh000"));
        assert!(map.contains_key("active00"));

        // Idempotent: nothing left to purge
        assert!(purge_expired(&mut map, now, validity_window()).is_empty());
        assert_eq!(map.len(), 2);
    }
}
