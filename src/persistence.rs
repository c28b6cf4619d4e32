// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! On-disk cache persistence.
//!
//! The cache file is owned exclusively by this module. Loading is
//! best-effort: a missing or corrupt file logs a warning and the service
//! starts with an empty store. Saves snapshot the whole store and write
//! through a temp file + atomic rename. A periodic task flushes dirty
//! state; losing the most recent interval of updates on crash is
//! acceptable by design, so there is no mandatory shutdown flush.

use crate::error::Result;
use crate::store::RecordStore;
use crate::types::{ModeSetting, NameMode, NameRecord};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bumped when the on-disk layout changes; older files are discarded.
const CACHE_FORMAT_VERSION: u32 = 1;

/// Versioned wrapper around the persisted record list.
#[derive(Debug, Serialize, Deserialize)]
struct CacheData {
    version: u32,
    saved_at: DateTime<Utc>,
    records: Vec<NameRecord>,
}

/// Loads the cache at startup and periodically flushes dirty state.
pub struct PersistenceManager {
    path: PathBuf,
    store: Arc<RecordStore>,
    mode: ModeSetting,
    flush_interval: Duration,
    max_record_age: ChronoDuration,
    last_save: parking_lot::Mutex<Option<Instant>>,
}

impl PersistenceManager {
    pub fn new(
        path: PathBuf,
        store: Arc<RecordStore>,
        mode: ModeSetting,
        flush_interval: Duration,
        max_record_age: Duration,
    ) -> Self {
        Self {
            path,
            store,
            mode,
            flush_interval,
            max_record_age: ChronoDuration::from_std(max_record_age)
                .unwrap_or_else(|_| ChronoDuration::hours(48)),
            last_save: parking_lot::Mutex::new(None),
        }
    }

    /// Load the cache file into the store, applying the staleness filter.
    ///
    /// Returns the number of records kept. Never fails: missing or
    /// corrupt files leave the store empty.
    pub fn load(&self) -> usize {
        if !self.path.exists() {
            debug!("no name cache file found, starting empty");
            return 0;
        }

        let data = match std::fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|json| serde_json::from_str::<CacheData>(&json).map_err(|e| e.to_string()))
        {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to load name cache, starting empty: {e}");
                return 0;
            }
        };

        if data.version != CACHE_FORMAT_VERSION {
            warn!(
                version = data.version,
                "unsupported name cache version, starting empty"
            );
            return 0;
        }

        let now = Utc::now();
        let mode = self.mode.get();
        let total = data.records.len();
        let mut kept = 0usize;
        for record in data.records {
            if record.id.is_nil() {
                continue;
            }
            // Legacy-only rendering never goes stale; display data does.
            if mode != NameMode::LegacyOnly && now - record.updated >= self.max_record_age {
                continue;
            }
            self.store.insert_preloaded(record);
            kept += 1;
        }

        info!(kept, total, "loaded name cache");
        kept
    }

    /// Serialize a snapshot of the store and atomically replace the cache
    /// file.
    fn save(&self) -> Result<()> {
        let records = self.store.snapshot();
        let data = CacheData {
            version: CACHE_FORMAT_VERSION,
            saved_at: Utc::now(),
            records,
        };
        let json = serde_json::to_string(&data)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("tmp");
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &self.path)?;

        debug!(records = data.records.len(), "saved name cache");
        Ok(())
    }

    /// Immediate flush, regardless of the dirty flag.
    pub fn save_now(&self) -> Result<()> {
        // Claim dirtiness before snapshotting so updates landing during
        // the write keep the flag set for the next tick.
        self.store.mark_clean();
        match self.save() {
            Ok(()) => {
                *self.last_save.lock() = Some(Instant::now());
                Ok(())
            }
            Err(e) => {
                self.store.mark_dirty();
                Err(e)
            }
        }
    }

    /// Clear the in-memory store and delete the cache file.
    pub fn clean(&self) -> Result<()> {
        self.store.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.store.mark_clean();
        info!("name cache cleared");
        Ok(())
    }

    /// One periodic flush check: save when dirty and the interval since
    /// the last save attempt has passed.
    fn flush_tick(&self) {
        if !self.store.take_dirty() {
            return;
        }

        let last_save = *self.last_save.lock();
        let due = last_save.is_none_or(|at| at.elapsed() >= self.flush_interval);
        if !due {
            self.store.mark_dirty();
            return;
        }

        if let Err(e) = self.save() {
            // Keep the flag set so the next tick retries; still record
            // the attempt time to throttle retry frequency.
            warn!("failed to save name cache: {e}");
            self.store.mark_dirty();
        }
        *self.last_save.lock() = Some(Instant::now());
    }

    /// Periodic flush loop; runs until the service lifetime token fires.
    pub(crate) async fn run_flush_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.flush_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;

        debug!("name cache flush task started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("name cache flush task shutting down");
                    break;
                }
                _ = interval.tick() => self.flush_tick(),
            }
        }
    }
}
