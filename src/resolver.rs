// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! Batch dispatch and result merging.
//!
//! Each deduplicated batch goes to exactly one directory capability:
//! legacy lookup when the mode is `LegacyOnly` or display names are
//! unavailable, display-name lookup otherwise. Results are merged into
//! the record store and the changed names are published. A whole-batch
//! failure is logged and the identifiers stay unresolved — retry pressure
//! comes from later caller lookups, not from here.

use crate::backlog::Backlog;
use crate::directory::NameDirectory;
use crate::events::{NameEvent, NameEventBus};
use crate::format::format_name;
use crate::store::RecordStore;
use crate::types::{AgentId, ModeSetting, NameMode, NameRecord, derive_user_name};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Routes batches to the directory and merges results into the store.
pub(crate) struct ResolverDispatcher {
    store: Arc<RecordStore>,
    backlog: Arc<Backlog>,
    directory: Arc<dyn NameDirectory>,
    events: NameEventBus,
    mode: ModeSetting,
    display_refresh: ChronoDuration,
}

impl ResolverDispatcher {
    pub(crate) fn new(
        store: Arc<RecordStore>,
        backlog: Arc<Backlog>,
        directory: Arc<dyn NameDirectory>,
        events: NameEventBus,
        mode: ModeSetting,
        display_refresh_interval: Duration,
    ) -> Self {
        Self {
            store,
            backlog,
            directory,
            events,
            mode,
            display_refresh: ChronoDuration::from_std(display_refresh_interval)
                .unwrap_or_else(|_| ChronoDuration::hours(24)),
        }
    }

    /// Issue one batch request and apply its results.
    pub(crate) async fn dispatch(&self, batch: HashSet<AgentId>) {
        let ids: Vec<AgentId> = batch.into_iter().filter(|id| !id.is_nil()).collect();
        if ids.is_empty() {
            return;
        }

        let use_legacy = self.mode.get() == NameMode::LegacyOnly
            || !self.directory.display_names_available();
        let changed = if use_legacy {
            self.dispatch_legacy(&ids).await
        } else {
            self.dispatch_display(&ids).await
        };

        // Always release the in-flight set, success or not, so the next
        // lookup for an unresolved identifier re-enqueues it.
        self.backlog.clear_pending(ids.iter());
        self.events.publish(changed);
    }

    async fn dispatch_legacy(&self, ids: &[AgentId]) -> NameEvent {
        let mut changed = NameEvent::new();
        match self.directory.resolve_legacy(ids).await {
            Ok(pairs) => {
                let now = Utc::now();
                let mode = self.mode.get();
                for (id, full_name) in pairs {
                    let (first, last) = split_legacy_name(&full_name);
                    if first.is_empty() {
                        debug!(%id, "ignoring empty legacy name");
                        continue;
                    }
                    let record =
                        self.store
                            .upsert(id, |existing| apply_legacy(existing, id, &first, &last, now));
                    changed.insert(id, format_name(&record, mode));
                }
                debug!(batch = ids.len(), resolved = changed.len(), "legacy batch applied");
            }
            Err(e) => {
                warn!(batch = ids.len(), "legacy name lookup failed: {e:#}");
            }
        }
        changed
    }

    async fn dispatch_display(&self, ids: &[AgentId]) -> NameEvent {
        let mut changed = NameEvent::new();
        match self.directory.resolve_display(ids).await {
            Ok(response) => {
                let now = Utc::now();
                let mode = self.mode.get();
                for record in response.records {
                    if !record.is_valid() {
                        debug!(id = %record.id, "rejecting invalid display name");
                        continue;
                    }
                    let id = record.id;
                    let stored = self.store.upsert(id, |existing| {
                        apply_display(existing, record, now, self.display_refresh)
                    });
                    changed.insert(id, format_name(&stored, mode));
                }
                if !response.failed.is_empty() {
                    debug!(
                        failed = response.failed.len(),
                        "directory reported unresolved identifiers"
                    );
                }
            }
            Err(e) => {
                warn!(batch = ids.len(), "display name lookup failed: {e:#}");
            }
        }
        changed
    }
}

/// Split a `"First Last"` pair; everything after the first word becomes
/// the last name.
fn split_legacy_name(full: &str) -> (String, String) {
    let mut words = full.split_whitespace();
    let first = words.next().unwrap_or_default().to_string();
    let last = words.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Merge a legacy lookup result into the cache.
///
/// Legacy fields and the derived user name always refresh; the display
/// name is only (re)set while no valid display-name data is cached, so a
/// periodic legacy refresh can never downgrade a confirmed display name.
fn apply_legacy(
    existing: Option<&NameRecord>,
    id: AgentId,
    first: &str,
    last: &str,
    now: DateTime<Utc>,
) -> NameRecord {
    match existing {
        Some(current) => {
            let mut record = current.clone();
            record.legacy_first = first.to_string();
            record.legacy_last = last.to_string();
            record.user_name = derive_user_name(first, last);
            if !(current.has_display_data() && current.is_valid()) {
                record.display_name = record.legacy_name();
                record.is_default_display_name = true;
            }
            record.updated = now.max(current.updated);
            record
        }
        None => NameRecord::from_legacy(id, first, last, now),
    }
}

/// Merge a display lookup result into the cache: wholesale replacement,
/// stamped with the resolution time and a refresh-due horizon.
fn apply_display(
    existing: Option<&NameRecord>,
    mut incoming: NameRecord,
    now: DateTime<Utc>,
    refresh: ChronoDuration,
) -> NameRecord {
    incoming.updated = match existing {
        Some(current) => now.max(current.updated),
        None => now,
    };
    if incoming.next_update.is_none() {
        incoming.next_update = Some(now + refresh);
    }
    incoming
}
