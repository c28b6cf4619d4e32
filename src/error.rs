// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! Error types for the name resolution service.
//!
//! The lookup API never surfaces these to callers — `get` and `get_async`
//! degrade to placeholder strings instead. Errors appear only on the
//! explicit persistence and configuration operations.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NamesError>;

/// Errors produced by the name resolution service.
#[derive(Debug, Error)]
pub enum NamesError {
    /// Cache file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache file encode/decode failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// `start` was called twice on the same service
    #[error("service already started")]
    AlreadyStarted,
}
