// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! The remote directory capability boundary.
//!
//! The service treats the directory as two batch lookup capabilities plus
//! an availability probe — not a protocol. Implementations own transport,
//! framing, and authentication.

use crate::types::{AgentId, NameRecord};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Outcome of one batched display-name lookup.
#[derive(Debug, Clone, Default)]
pub struct DisplayResponse {
    /// Fully-populated records for the identifiers that resolved.
    pub records: Vec<NameRecord>,
    /// Identifiers the directory could not resolve this time.
    pub failed: Vec<AgentId>,
}

/// Remote name directory: batched, asynchronous lookups.
///
/// An `Err` from either lookup is a whole-batch failure — the service
/// logs it and leaves the identifiers unresolved; retry pressure comes
/// from later caller lookups, never from the service itself.
#[async_trait]
pub trait NameDirectory: Send + Sync {
    /// Resolve a batch to `{id → "First Last"}` legacy pairs.
    async fn resolve_legacy(&self, ids: &[AgentId]) -> Result<HashMap<AgentId, String>>;

    /// Resolve a batch to full display-name records.
    async fn resolve_display(&self, ids: &[AgentId]) -> Result<DisplayResponse>;

    /// Whether the directory currently serves display names. Consulted
    /// before every dispatch; `false` routes batches to the legacy
    /// capability.
    fn display_names_available(&self) -> bool {
        true
    }
}
