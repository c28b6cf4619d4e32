// Copyright 2025 Saorsa Labs Limited
//
// This software is dual-licensed under:
// - GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later)
// - Commercial License
//
// For AGPL-3.0 license, see LICENSE-AGPL-3.0
// For commercial licensing, contact: saorsalabs@gmail.com
//
// Unless required by applicable law or agreed to in writing, software
// distributed under these licenses is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.

// Enforce no unwrap/expect/panic in production code only (tests can use them)
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(test), warn(clippy::panic))]
#![warn(rust_2018_idioms)]

//! # Saorsa Names
//!
//! Batched, rate-limited resolution of opaque agent identifiers to
//! human-readable display strings, backed by a persistent on-disk cache.
//!
//! Lookup misses are coalesced into bounded batches (≤100 identifiers,
//! ≤100ms window) and dispatched to a remote directory capability under a
//! token-bucket budget. Resolved names land in a concurrent cache, are
//! fanned out to subscribers, and are periodically flushed to disk with
//! staleness filtering on reload.
//!
//! ## Example
//!
//! ```rust,ignore
//! use saorsa_names::{ModeSetting, NameMode, NameService, NamesConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let directory = Arc::new(MyDirectory::connect().await?);
//!     let mode = ModeSetting::new(NameMode::SmartDisplay);
//!     let service = NameService::new(NamesConfig::default(), directory, mode)?;
//!     service.start().await?;
//!
//!     // Synchronous: placeholder now, resolved on a later call.
//!     let name = service.get(agent_id);
//!     // Awaiting: resolved name or placeholder after the timeout.
//!     let name = service.get_async(agent_id).await;
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Resolution backlog and batch collection
pub mod backlog;

/// Service configuration
pub mod config;

/// Remote directory capability boundary
pub mod directory;

/// Error types
pub mod error;

/// Name-change event fan-out
pub mod events;

/// Record formatting
pub mod format;

/// On-disk cache persistence
pub mod persistence;

/// Token-bucket dispatch gate
pub mod rate_limit;

/// Batch dispatch and result merging
pub(crate) mod resolver;

/// The public name resolution service
pub mod service;

/// Concurrent record store
pub mod store;

/// Shared simple types
pub mod types;

// Re-export main types
pub use config::NamesConfig;
pub use directory::{DisplayResponse, NameDirectory};
pub use error::{NamesError, Result};
pub use events::{NameEvent, NameEventBus, Subscription};
pub use format::format_name;
pub use rate_limit::{RateConfig, TokenBucket};
pub use service::{NameCacheStats, NameService};
pub use store::RecordStore;
pub use types::{
    AgentId, LOADING_NAME, ModeSetting, NameMode, NameRecord, UNKNOWN_NAME, derive_user_name,
};

/// Saorsa Names version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
