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

//! The name resolution service.
//!
//! `NameService` is the public face of the crate: synchronous cache
//! lookups that enqueue misses for background resolution, an awaiting
//! variant bounded by a timeout, and the lifecycle of the two background
//! tasks (batch collector + dispatcher, periodic cache flush).
//!
//! No error from the resolution pipeline ever reaches a lookup caller —
//! the worst case is a `"Loading..."` placeholder until a later batch
//! succeeds.

use crate::backlog::{Backlog, collect_batch};
use crate::config::NamesConfig;
use crate::directory::NameDirectory;
use crate::error::{NamesError, Result};
use crate::events::{NameEvent, NameEventBus, Subscription};
use crate::format::format_name;
use crate::persistence::PersistenceManager;
use crate::rate_limit::TokenBucket;
use crate::resolver::ResolverDispatcher;
use crate::store::RecordStore;
use crate::types::{AgentId, LOADING_NAME, ModeSetting, NameMode, NameRecord, UNKNOWN_NAME};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Point-in-time counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NameCacheStats {
    /// Records currently cached.
    pub records: usize,
    /// Identifiers queued or in flight.
    pub pending: usize,
    /// Whether unsaved changes exist.
    pub dirty: bool,
}

/// Resolves agent identifiers to display strings.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct NameService {
    config: NamesConfig,
    store: Arc<RecordStore>,
    backlog: Arc<Backlog>,
    backlog_rx: Mutex<Option<mpsc::UnboundedReceiver<AgentId>>>,
    bucket: Arc<TokenBucket>,
    directory: Arc<dyn NameDirectory>,
    mode: ModeSetting,
    events: NameEventBus,
    persistence: Arc<PersistenceManager>,
    shutdown: CancellationToken,
    collector_handle: Mutex<Option<JoinHandle<()>>>,
    flush_handle: Mutex<Option<JoinHandle<()>>>,
}

impl NameService {
    /// Create a stopped service. Call [`start`](Self::start) to load the
    /// disk cache and begin resolving.
    pub fn new(
        config: NamesConfig,
        directory: Arc<dyn NameDirectory>,
        mode: ModeSetting,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(RecordStore::new());
        let (backlog, backlog_rx) = Backlog::new();
        let bucket = Arc::new(TokenBucket::new(config.rate_config()));
        let events = NameEventBus::new(config.event_channel_capacity);
        let persistence = Arc::new(PersistenceManager::new(
            config.cache_path.clone(),
            store.clone(),
            mode.clone(),
            config.flush_interval(),
            config.max_record_age(),
        ));

        Ok(Self {
            config,
            store,
            backlog: Arc::new(backlog),
            backlog_rx: Mutex::new(Some(backlog_rx)),
            bucket,
            directory,
            mode,
            events,
            persistence,
            shutdown: CancellationToken::new(),
            collector_handle: Mutex::new(None),
            flush_handle: Mutex::new(None),
        })
    }

    /// Load the disk cache and spawn the background tasks.
    pub async fn start(&self) -> Result<()> {
        let Some(backlog_rx) = self.backlog_rx.lock().take() else {
            return Err(NamesError::AlreadyStarted);
        };

        let loaded = self.persistence.load();
        info!(loaded, "name service starting");

        let dispatcher = ResolverDispatcher::new(
            self.store.clone(),
            self.backlog.clone(),
            self.directory.clone(),
            self.events.clone(),
            self.mode.clone(),
            self.config.display_refresh_interval(),
        );
        let collector = Self::collector_loop(
            backlog_rx,
            dispatcher,
            self.bucket.clone(),
            self.config.batch_window(),
            self.config.max_batch,
            self.config.rate_backoff(),
            self.shutdown.clone(),
        );
        *self.collector_handle.lock() = Some(tokio::spawn(collector));

        let persistence = self.persistence.clone();
        let shutdown = self.shutdown.clone();
        *self.flush_handle.lock() = Some(tokio::spawn(persistence.run_flush_loop(shutdown)));

        Ok(())
    }

    /// Cancel the background tasks and wait for them to stop.
    ///
    /// In-flight directory requests are abandoned; their results are
    /// dropped, never applied after shutdown. There is no implicit final
    /// flush — call [`save_to_cache`](Self::save_to_cache) first if the
    /// last interval of updates matters.
    pub async fn shutdown(&self) {
        info!("name service shutting down");
        self.shutdown.cancel();

        let collector = self.collector_handle.lock().take();
        let flush = self.flush_handle.lock().take();
        Self::join_task(collector, "name collector").await;
        Self::join_task(flush, "cache flush").await;
    }

    async fn join_task(handle: Option<JoinHandle<()>>, task_name: &str) {
        let Some(handle) = handle else { return };
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                debug!("{task_name} task was cancelled during shutdown");
            }
            Err(e) if e.is_panic() => {
                warn!("{task_name} task panicked during shutdown: {e:?}");
            }
            Err(e) => {
                warn!("{task_name} task join error during shutdown: {e:?}");
            }
        }
    }

    /// The batch collector + dispatcher loop.
    async fn collector_loop(
        mut backlog_rx: mpsc::UnboundedReceiver<AgentId>,
        dispatcher: ResolverDispatcher,
        bucket: Arc<TokenBucket>,
        window: Duration,
        max_batch: usize,
        backoff: Duration,
        shutdown: CancellationToken,
    ) {
        info!("name resolution collector started");
        loop {
            // 1. Block until work arrives or the service stops.
            let first = tokio::select! {
                () = shutdown.cancelled() => break,
                received = backlog_rx.recv() => match received {
                    Some(id) => id,
                    None => break,
                },
            };

            // 2. One token per batch; back off without dropping work.
            let mut acquired = bucket.try_acquire();
            while !acquired {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(backoff) => acquired = bucket.try_acquire(),
                }
            }
            if !acquired {
                break;
            }

            // 3–5. Coalesce, then dispatch exactly one batch.
            let batch = collect_batch(&mut backlog_rx, first, window, max_batch).await;
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = dispatcher.dispatch(batch) => {}
            }
        }
        info!("name resolution collector stopped");
    }

    fn resolved_for(&self, id: &AgentId, mode: NameMode) -> Option<NameRecord> {
        let record = self.store.get(id)?;
        if mode == NameMode::LegacyOnly || record.has_display_data() {
            Some(record)
        } else {
            None
        }
    }

    fn request(&self, id: AgentId) {
        if self.backlog.enqueue(id) {
            debug!(%id, "queued name resolution");
        }
    }

    /// Formatted name for `id`, or a `"Loading..."` placeholder while a
    /// resolution request is queued.
    ///
    /// Never blocks beyond in-memory map access and never errors. The
    /// nil identifier maps to a fixed unknown string without queueing.
    pub fn get(&self, id: AgentId) -> String {
        self.get_or(id, LOADING_NAME)
    }

    /// [`get`](Self::get) with a caller-supplied unresolved placeholder.
    pub fn get_or(&self, id: AgentId, unresolved: &str) -> String {
        if id.is_nil() {
            return UNKNOWN_NAME.to_string();
        }
        let mode = self.mode.get();
        if let Some(record) = self.resolved_for(&id, mode) {
            return format_name(&record, mode);
        }
        self.request(id);
        unresolved.to_string()
    }

    /// The stable `"First Last"` legacy name.
    pub fn legacy_name(&self, id: AgentId) -> String {
        if id.is_nil() {
            return UNKNOWN_NAME.to_string();
        }
        if let Some(record) = self.store.get(&id) {
            return record.legacy_name();
        }
        self.request(id);
        LOADING_NAME.to_string()
    }

    /// The derived lowercase `first.last` user name.
    pub fn user_name(&self, id: AgentId) -> String {
        if id.is_nil() {
            return UNKNOWN_NAME.to_string();
        }
        if let Some(record) = self.store.get(&id) {
            return record.user_name;
        }
        self.request(id);
        LOADING_NAME.to_string()
    }

    /// The user-chosen display name, once display-name data is cached.
    pub fn display_name(&self, id: AgentId) -> String {
        if id.is_nil() {
            return UNKNOWN_NAME.to_string();
        }
        if let Some(record) = self.store.get(&id)
            && record.has_display_data()
        {
            return record.display_name;
        }
        self.request(id);
        LOADING_NAME.to_string()
    }

    /// Like [`get`](Self::get), but waits (up to the configured lookup
    /// timeout) for the resolution to land instead of returning the
    /// placeholder immediately.
    pub async fn get_async(&self, id: AgentId) -> String {
        self.get_async_timeout(id, self.config.lookup_timeout())
            .await
    }

    /// [`get_async`](Self::get_async) with an explicit wait budget.
    ///
    /// Dropping the returned future cancels the wait; the queued request
    /// keeps resolving in the background either way.
    pub async fn get_async_timeout(&self, id: AgentId, timeout: Duration) -> String {
        if id.is_nil() {
            return UNKNOWN_NAME.to_string();
        }
        let mode = self.mode.get();
        if let Some(record) = self.resolved_for(&id, mode) {
            return format_name(&record, mode);
        }

        // Subscribe before queueing so the resolution cannot slip
        // between the cache check and the wait.
        let mut events = self.events.subscribe();
        self.request(id);

        if let Some(name) = events
            .next_matching(timeout, |event: &NameEvent| event.get(&id).cloned())
            .await
        {
            return name;
        }

        // The update may have landed before the subscription; check once
        // more before giving up.
        let mode = self.mode.get();
        if let Some(record) = self.resolved_for(&id, mode) {
            return format_name(&record, mode);
        }
        LOADING_NAME.to_string()
    }

    /// Subscribe to name-change events (`{id → formatted string}` per
    /// resolved batch).
    pub fn subscribe(&self) -> Subscription<NameEvent> {
        self.events.subscribe()
    }

    /// Flush the cache to disk immediately.
    pub fn save_to_cache(&self) -> Result<()> {
        self.persistence.save_now()
    }

    /// Clear the in-memory store and delete the cache file.
    pub fn clean_cache(&self) -> Result<()> {
        self.persistence.clean()
    }

    /// The formatting mode currently in effect.
    pub fn mode(&self) -> NameMode {
        self.mode.get()
    }

    /// Current cache counters.
    pub fn stats(&self) -> NameCacheStats {
        NameCacheStats {
            records: self.store.len(),
            pending: self.backlog.pending_len(),
            dirty: self.store.is_dirty(),
        }
    }
}
