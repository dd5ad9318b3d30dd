//! Token records, lifecycle rules and the persisted store.
//!
//! Everything the CLI and the HTTP server share lives here: the token
//! record and its state machine, the random id generator, and the JSON
//! snapshot file the records persist in.

pub mod generate;
pub mod lifecycle;
pub mod record;
pub mod store;
pub mod utils;

pub use generate::{fresh_id, generate, TOKEN_LENGTH};
pub use lifecycle::{Access, Denial, Landing};
pub use record::{TokenMap, TokenRecord, TokenState};
pub use store::{AddedToken, StoreError, StoreLock, StoreResult, TokenStore};

use chrono::Duration;

/// How long a token stays downloadable after its first download, in hours
pub const VALIDITY_HOURS: i64 = 4;

/// The validity window as a duration
pub fn validity_window() -> Duration {
    Duration::hours(VALIDITY_HOURS)
}
