//! Shared request-handler state

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{Mutex, MutexGuard};

use tokens::TokenStore;

/// State every request handler can reach.
///
/// The mutex orders load-mutate-save sequences between concurrent
/// requests without tying up a worker in the store's blocking file lock.
/// Holding it across the whole redeem sequence is what makes the
/// activation transition happen at most once per token.
#[derive(Clone)]
pub struct ServerState {
    store: Arc<Mutex<TokenStore>>,
    validity: Duration,
}

impl ServerState {
    pub fn new(store: TokenStore, validity: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            validity,
        }
    }

    /// Lock the store for one load-mutate-save sequence
    pub async fn store(&self) -> MutexGuard<'_, TokenStore> {
        self.store.lock().await
    }

    /// The validity window downloads are honored within
    pub fn validity(&self) -> Duration {
        self.validity
    }
}
