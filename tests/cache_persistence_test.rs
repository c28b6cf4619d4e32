//! Disk cache round-trip, staleness filtering, and cleanup.
// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use saorsa_names::persistence::PersistenceManager;
use saorsa_names::{
    AgentId, DisplayResponse, LOADING_NAME, ModeSetting, NameDirectory, NameMode, NameRecord,
    NameService, NamesConfig, RecordStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Directory that resolves every identifier to a fixed display entry and
/// counts its calls.
#[derive(Default)]
struct CountingDirectory {
    calls: std::sync::Mutex<usize>,
}

impl CountingDirectory {
    fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl NameDirectory for CountingDirectory {
    async fn resolve_legacy(&self, ids: &[AgentId]) -> AnyResult<HashMap<AgentId, String>> {
        *self.calls.lock().unwrap() += 1;
        Ok(ids.iter().map(|id| (*id, "Jane Doe".to_string())).collect())
    }

    async fn resolve_display(&self, ids: &[AgentId]) -> AnyResult<DisplayResponse> {
        *self.calls.lock().unwrap() += 1;
        Ok(DisplayResponse {
            records: ids
                .iter()
                .map(|id| NameRecord {
                    id: *id,
                    legacy_first: "Jane".to_string(),
                    legacy_last: "Doe".to_string(),
                    display_name: "Jane".to_string(),
                    user_name: "jane.doe".to_string(),
                    is_default_display_name: false,
                    updated: Utc::now(),
                    next_update: None,
                })
                .collect(),
            failed: Vec::new(),
        })
    }
}

fn test_config(dir: &tempfile::TempDir) -> NamesConfig {
    NamesConfig {
        cache_path: dir.path().join("name_cache.json"),
        ..NamesConfig::default()
    }
}

fn aged_record(id: AgentId, age: ChronoDuration) -> NameRecord {
    let updated = Utc::now() - age;
    NameRecord {
        id,
        legacy_first: "Jane".to_string(),
        legacy_last: "Doe".to_string(),
        display_name: "Jane".to_string(),
        user_name: "jane.doe".to_string(),
        is_default_display_name: false,
        updated,
        next_update: Some(updated + ChronoDuration::hours(24)),
    }
}

fn manager_for(path: std::path::PathBuf, store: Arc<RecordStore>, mode: NameMode) -> PersistenceManager {
    PersistenceManager::new(
        path,
        store,
        ModeSetting::new(mode),
        Duration::from_secs(30),
        Duration::from_secs(48 * 3600),
    )
}

#[tokio::test]
async fn resolved_names_survive_a_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let directory = Arc::new(CountingDirectory::default());
    let id = AgentId::random();

    {
        let service = NameService::new(
            test_config(&dir),
            directory.clone(),
            ModeSetting::new(NameMode::SmartDisplay),
        )
        .unwrap();
        service.start().await.unwrap();

        let name = service.get_async_timeout(id, Duration::from_secs(5)).await;
        assert_eq!(name, "Jane (jane.doe)");
        service.save_to_cache().unwrap();
        service.shutdown().await;
    }
    let calls_before_restart = directory.call_count();
    assert!(calls_before_restart >= 1);

    {
        let service = NameService::new(
            test_config(&dir),
            directory.clone(),
            ModeSetting::new(NameMode::SmartDisplay),
        )
        .unwrap();
        service.start().await.unwrap();

        // Served from the loaded cache, no directory traffic.
        assert_eq!(service.get(id), "Jane (jane.doe)");
        assert_eq!(directory.call_count(), calls_before_restart);
        service.shutdown().await;
    }
}

#[tokio::test]
async fn clean_cache_forgets_names_and_deletes_the_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let directory = Arc::new(CountingDirectory::default());
    let id = AgentId::random();

    let service = NameService::new(
        test_config(&dir),
        directory.clone(),
        ModeSetting::new(NameMode::SmartDisplay),
    )
    .unwrap();
    service.start().await.unwrap();

    let name = service.get_async_timeout(id, Duration::from_secs(5)).await;
    assert_eq!(name, "Jane (jane.doe)");
    service.save_to_cache().unwrap();
    assert!(dir.path().join("name_cache.json").exists());

    service.clean_cache().unwrap();
    assert!(!dir.path().join("name_cache.json").exists());
    assert_eq!(service.stats().records, 0);
    assert_eq!(service.get(id), LOADING_NAME);

    service.shutdown().await;
}

#[test]
fn staleness_matrix_on_reload() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("name_cache.json");
    let ids: Vec<AgentId> = (0..5).map(|_| AgentId::random()).collect();

    // Save five records aged 72h.
    let store = Arc::new(RecordStore::new());
    for id in &ids {
        store.upsert(*id, |_| aged_record(*id, ChronoDuration::hours(72)));
    }
    manager_for(path.clone(), store, NameMode::SmartDisplay)
        .save_now()
        .unwrap();

    // Non-legacy mode drops everything past the 48h horizon.
    let reloaded = Arc::new(RecordStore::new());
    let kept = manager_for(path.clone(), reloaded.clone(), NameMode::SmartDisplay).load();
    assert_eq!(kept, 0);
    assert!(reloaded.is_empty());

    // Legacy-only mode keeps every record regardless of age.
    let reloaded = Arc::new(RecordStore::new());
    let kept = manager_for(path.clone(), reloaded.clone(), NameMode::LegacyOnly).load();
    assert_eq!(kept, 5);

    // Fresh records survive in any mode.
    let store = Arc::new(RecordStore::new());
    for id in &ids {
        store.upsert(*id, |_| aged_record(*id, ChronoDuration::hours(12)));
    }
    manager_for(path.clone(), store, NameMode::SmartDisplay)
        .save_now()
        .unwrap();

    let reloaded = Arc::new(RecordStore::new());
    let kept = manager_for(path, reloaded.clone(), NameMode::SmartDisplay).load();
    assert_eq!(kept, 5);
    for id in &ids {
        assert!(reloaded.get(id).is_some());
    }
}

#[test]
fn corrupt_cache_file_starts_empty() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("name_cache.json");
    std::fs::write(&path, "{\"version\":9000,\"truncated").unwrap();

    let store = Arc::new(RecordStore::new());
    let kept = manager_for(path, store.clone(), NameMode::SmartDisplay).load();
    assert_eq!(kept, 0);
    assert!(store.is_empty());
}
