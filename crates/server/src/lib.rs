//! HTTP server for one-time download links
//!
//! Serves the landing page and the download itself for registered tokens,
//! enforcing the activation and expiry rules from the `tokens` crate.

mod pages;
mod server;
mod state;

pub use server::ShareServer;
pub use state::ServerState;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
