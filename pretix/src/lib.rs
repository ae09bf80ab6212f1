//! # Pretix Source Client
//!
//! [`SourceClient`](ticket_sync_core::SourceClient) implementation over the
//! Pretix REST API.
//!
//! ## Example
//!
//! ```no_run
//! use ticket_sync_core::SourceClient;
//! use ticket_sync_pretix::PretixClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PretixClient::new();
//!
//!     let items = client
//!         .fetch_items("https://pretix.eu/api/v1/organizers/acme", "secret", "conf2026")
//!         .await?;
//!
//!     println!("{} items", items.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - Event, item and order endpoints, following pagination
//! - Multilingual names resolved to a single string
//! - Status codes mapped onto [`SourceError`](ticket_sync_core::SourceError)
//! - Retry of rate-limited and 5xx responses with backoff and jitter

pub mod client;
pub mod retry;
pub mod wire;

// Re-export main types for convenience
pub use client::{PretixClient, PretixConfig};
pub use retry::RetryPolicy;
