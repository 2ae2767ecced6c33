//! Graph Persistence.
//!
//! Keeps the memory graph durable across restarts by writing full snapshots
//! to a JSON file, with a single-generation backup and an advisory lock file.
//!
//! # Storage layout
//!
//! Three sibling files live in the configured storage directory:
//!
//! | file                   | content                                         |
//! |------------------------|-------------------------------------------------|
//! | `memories.json`        | `{"memories": {<id>: MemoryNode, …}}`, pretty   |
//! | `memories.backup.json` | previous `memories.json`, copied before a write |
//! | `memories.lock`        | decimal Unix-millisecond timestamp of the write |
//!
//! # Locking
//!
//! A lock younger than the staleness window (five minutes by default) means
//! another writer is active and [`PersistenceManager::save`] refuses to run.
//! An older lock is treated as abandoned and removed.  The lock is advisory:
//! two processes racing inside the window can both miss it.
//!
//! # Auto-save
//!
//! [`PersistenceManager::start_auto_save`] arms a recurring timer.  A tick
//! that fires while the previous tick's save is still running is skipped, not
//! queued.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use recall_types::RecallError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::graph::NodeSnapshot;

pub const PRIMARY_FILE: &str = "memories.json";
pub const BACKUP_FILE: &str = "memories.backup.json";
pub const LOCK_FILE: &str = "memories.lock";

/// Age after which a lock file is considered abandoned.
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Directory holding the primary, backup and lock files.
    pub storage_dir: PathBuf,
    /// Copy the primary file aside before each write and fall back to it on
    /// load failures.
    pub backup_enabled: bool,
    pub lock_stale_after: Duration,
}

impl PersistenceConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            backup_enabled: true,
            lock_stale_after: LOCK_STALE_AFTER,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// On-disk document
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GraphDocument {
    memories: NodeSnapshot,
}

#[derive(Serialize)]
struct GraphDocumentRef<'a> {
    memories: &'a NodeSnapshot,
}

fn storage_error(action: &str, path: &Path, e: impl std::fmt::Display) -> RecallError {
    RecallError::Storage(format!("failed to {action} {}: {e}", path.display()))
}

/// Read, parse and shape-check one graph document.
async fn read_snapshot(path: &Path) -> Result<NodeSnapshot, RecallError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| storage_error("read", path, e))?;
    let value: Value = serde_json::from_str(&raw).map_err(|e| storage_error("parse", path, e))?;
    if !value.get("memories").is_some_and(Value::is_object) {
        return Err(RecallError::Storage(format!(
            "{} has no \"memories\" mapping",
            path.display()
        )));
    }
    let doc: GraphDocument =
        serde_json::from_value(value).map_err(|e| storage_error("decode", path, e))?;
    Ok(doc.memories)
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Lock a handle slot, recovering the value from a poisoned mutex.
fn slot<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Clears the in-flight flag when the save task ends, however it ends.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PersistenceManager
// ─────────────────────────────────────────────────────────────────────────────

/// File-backed snapshot store for the memory graph.
pub struct PersistenceManager {
    config: PersistenceConfig,
    /// Set while a timer-driven save is running.
    save_in_flight: Arc<AtomicBool>,
    auto_save: Mutex<Option<JoinHandle<()>>>,
    /// Save task spawned by the most recent tick.
    pending_save: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PersistenceManager {
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            config,
            save_in_flight: Arc::new(AtomicBool::new(false)),
            auto_save: Mutex::new(None),
            pending_save: Arc::new(Mutex::new(None)),
        }
    }

    pub fn primary_path(&self) -> PathBuf {
        self.config.storage_dir.join(PRIMARY_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.config.storage_dir.join(BACKUP_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.config.storage_dir.join(LOCK_FILE)
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn init(&self) -> Result<(), RecallError> {
        tokio::fs::create_dir_all(&self.config.storage_dir)
            .await
            .map_err(|e| storage_error("create", &self.config.storage_dir, e))
    }

    /// Load the persisted graph.
    ///
    /// A missing primary file yields an empty snapshot.  A primary file that
    /// cannot be read, parsed or decoded is replaced by the backup when
    /// backups are enabled.
    pub async fn load(&self) -> Result<NodeSnapshot, RecallError> {
        let primary = self.primary_path();
        if !tokio::fs::try_exists(&primary).await.unwrap_or(false) {
            info!(path = %primary.display(), "no persisted memory graph; starting empty");
            return Ok(NodeSnapshot::new());
        }

        let primary_err = match read_snapshot(&primary).await {
            Ok(snapshot) => {
                info!(nodes = snapshot.len(), "memory graph loaded");
                return Ok(snapshot);
            }
            Err(e) => e,
        };
        warn!(error = %primary_err, "primary memory file unusable");

        if !self.config.backup_enabled {
            return Err(primary_err);
        }
        match read_snapshot(&self.backup_path()).await {
            Ok(snapshot) => {
                warn!(nodes = snapshot.len(), "memory graph restored from backup");
                Ok(snapshot)
            }
            Err(backup_err) => Err(RecallError::Storage(format!(
                "primary and backup both unusable ({primary_err}; {backup_err})"
            ))),
        }
    }

    /// Write `snapshot` to the primary file under the lock-file protocol.
    pub async fn save(&self, snapshot: &NodeSnapshot) -> Result<(), RecallError> {
        let lock = self.lock_path();
        self.acquire_lock(&lock).await?;

        let result = self.write_snapshot(snapshot).await;

        if let Err(e) = tokio::fs::remove_file(&lock).await
            && e.kind() != ErrorKind::NotFound
        {
            warn!(error = %e, path = %lock.display(), "failed to remove lock file");
        }
        result
    }

    async fn acquire_lock(&self, lock: &Path) -> Result<(), RecallError> {
        if let Some(age) = lock_age(lock).await {
            if age < self.config.lock_stale_after {
                return Err(RecallError::Storage(format!(
                    "storage is locked by another process ({})",
                    lock.display()
                )));
            }
            warn!(age_secs = age.as_secs(), "removing stale lock file");
            if let Err(e) = tokio::fs::remove_file(lock).await
                && e.kind() != ErrorKind::NotFound
            {
                return Err(storage_error("remove stale lock", lock, e));
            }
        }
        tokio::fs::write(lock, now_ms().to_string())
            .await
            .map_err(|e| storage_error("write lock", lock, e))
    }

    async fn write_snapshot(&self, snapshot: &NodeSnapshot) -> Result<(), RecallError> {
        let primary = self.primary_path();
        if self.config.backup_enabled && tokio::fs::try_exists(&primary).await.unwrap_or(false) {
            let backup = self.backup_path();
            tokio::fs::copy(&primary, &backup)
                .await
                .map_err(|e| storage_error("back up to", &backup, e))?;
        }
        let json = serde_json::to_string_pretty(&GraphDocumentRef { memories: snapshot })
            .map_err(|e| RecallError::Storage(format!("failed to serialize memory graph: {e}")))?;
        tokio::fs::write(&primary, json)
            .await
            .map_err(|e| storage_error("write", &primary, e))?;
        info!(nodes = snapshot.len(), "memory graph saved");
        Ok(())
    }

    // ── Auto-save ────────────────────────────────────────────────────────────

    /// Call `save` every `interval` until [`stop_auto_save`][Self::stop_auto_save].
    ///
    /// Replaces any timer already running; a save it started is left to
    /// finish.  Must be called from within a tokio runtime.  A zero interval
    /// leaves auto-save disabled.
    pub fn start_auto_save<F, Fut>(&self, interval: Duration, save: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RecallError>> + Send + 'static,
    {
        self.stop_ticker();
        if interval.is_zero() {
            warn!("auto-save interval is zero; auto-save disabled");
            return;
        }

        let in_flight = Arc::clone(&self.save_in_flight);
        let pending = Arc::clone(&self.pending_save);
        let save = Arc::new(save);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if in_flight.swap(true, Ordering::AcqRel) {
                    debug!("previous auto-save still running; skipping tick");
                    continue;
                }
                let guard = InFlight(Arc::clone(&in_flight));
                let save = Arc::clone(&save);
                let task = tokio::spawn(async move {
                    let _guard = guard;
                    if let Err(e) = save().await {
                        warn!(error = %e, "auto-save failed");
                    }
                });
                *slot(&pending) = Some(task);
            }
        });

        *slot(&self.auto_save) = Some(handle);
        info!(interval_ms = interval.as_millis() as u64, "auto-save armed");
    }

    fn stop_ticker(&self) {
        if let Some(handle) = slot(&self.auto_save).take() {
            handle.abort();
            debug!("auto-save disarmed");
        }
    }

    /// Stop the timer and cancel a save it started that is still running.
    pub fn stop_auto_save(&self) {
        self.stop_ticker();
        if let Some(task) = slot(&self.pending_save).take() {
            task.abort();
        }
    }

    pub fn is_auto_save_running(&self) -> bool {
        slot(&self.auto_save)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop the timer, wait for a save it started, then remove any lock file
    /// left behind.
    pub async fn cleanup(&self) {
        self.stop_ticker();
        let pending = slot(&self.pending_save).take();
        if let Some(task) = pending
            && let Err(e) = task.await
            && e.is_panic()
        {
            warn!("auto-save task panicked");
        }
        let lock = self.lock_path();
        if let Err(e) = tokio::fs::remove_file(&lock).await
            && e.kind() != ErrorKind::NotFound
        {
            warn!(error = %e, path = %lock.display(), "failed to remove lock file during cleanup");
        }
    }
}

impl Drop for PersistenceManager {
    fn drop(&mut self) {
        self.stop_auto_save();
    }
}

/// Age of the lock at `path`, or `None` when there is no lock.
///
/// The age comes from the timestamp written inside the lock; if that cannot
/// be parsed the file's modification time is used instead.
async fn lock_age(path: &Path) -> Option<Duration> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(_) => String::new(),
    };
    if let Ok(written_ms) = content.trim().parse::<i64>() {
        let age_ms = (now_ms() - written_ms).max(0) as u64;
        return Some(Duration::from_millis(age_ms));
    }
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => Some(modified.elapsed().unwrap_or_default()),
        // Present but unreadable: treat as abandoned.
        Err(_) => Some(Duration::MAX),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use std::sync::atomic::AtomicUsize;

    fn manager(dir: &tempfile::TempDir) -> PersistenceManager {
        PersistenceManager::new(PersistenceConfig::new(dir.path()))
    }

    fn sample_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::default();
        let a = graph.add("hello", vec![]).unwrap();
        let b = graph.add("world", vec![a.clone()]).unwrap();
        graph.get(&b, Some(1)).unwrap();
        graph
    }

    // ── init / load ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let pm = PersistenceManager::new(PersistenceConfig::new(&nested));
        pm.init().await.unwrap();
        pm.init().await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn load_without_primary_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        assert!(pm.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_reproduces_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let graph = sample_graph();
        let snapshot = graph.get_all_nodes();

        pm.save(&snapshot).await.unwrap();

        let fresh = manager(&dir);
        let loaded = fresh.load().await.unwrap();
        assert_eq!(loaded, snapshot);

        let mut restored = MemoryGraph::default();
        restored.load_nodes(loaded);
        assert_eq!(restored.get_all_nodes(), snapshot);
    }

    #[tokio::test]
    async fn saved_file_has_memories_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        pm.save(&sample_graph().get_all_nodes()).await.unwrap();
        let raw = std::fs::read_to_string(pm.primary_path()).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["memories"].as_object().unwrap().len(), 2);
        assert!(raw.contains("\n  \"memories\""), "expected indented output");
    }

    #[tokio::test]
    async fn second_save_backs_up_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let mut graph = MemoryGraph::default();
        graph.add("first", vec![]).unwrap();
        let first = graph.get_all_nodes();
        pm.save(&first).await.unwrap();
        assert!(!pm.backup_path().exists());

        graph.add("second", vec![]).unwrap();
        pm.save(&graph.get_all_nodes()).await.unwrap();

        let backup = read_snapshot(&pm.backup_path()).await.unwrap();
        assert_eq!(backup, first);
    }

    #[tokio::test]
    async fn backup_disabled_skips_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PersistenceConfig::new(dir.path());
        config.backup_enabled = false;
        let pm = PersistenceManager::new(config);
        let snapshot = sample_graph().get_all_nodes();
        pm.save(&snapshot).await.unwrap();
        pm.save(&snapshot).await.unwrap();
        assert!(!pm.backup_path().exists());
    }

    #[tokio::test]
    async fn corrupt_primary_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let snapshot = sample_graph().get_all_nodes();
        pm.save(&snapshot).await.unwrap();
        pm.save(&snapshot).await.unwrap();

        std::fs::write(pm.primary_path(), "{ not json").unwrap();
        assert_eq!(pm.load().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn wrong_shape_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let snapshot = sample_graph().get_all_nodes();
        pm.save(&snapshot).await.unwrap();
        pm.save(&snapshot).await.unwrap();

        std::fs::write(pm.primary_path(), r#"{"nodes": {}}"#).unwrap();
        assert_eq!(pm.load().await.unwrap(), snapshot);

        std::fs::write(pm.primary_path(), r#"{"memories": []}"#).unwrap();
        assert_eq!(pm.load().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn load_fails_when_primary_and_backup_are_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        std::fs::write(pm.primary_path(), "garbage").unwrap();
        std::fs::write(pm.backup_path(), "also garbage").unwrap();
        let err = pm.load().await.unwrap_err();
        assert!(matches!(err, RecallError::Storage(_)));
        assert!(err.to_string().contains("backup"));
    }

    #[tokio::test]
    async fn load_without_backup_reports_primary_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PersistenceConfig::new(dir.path());
        config.backup_enabled = false;
        let pm = PersistenceManager::new(config);
        std::fs::write(pm.primary_path(), "garbage").unwrap();
        std::fs::write(pm.backup_path(), r#"{"memories": {}}"#).unwrap();
        assert!(matches!(pm.load().await, Err(RecallError::Storage(_))));
    }

    // ── locking ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn save_removes_its_lock() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        pm.save(&NodeSnapshot::new()).await.unwrap();
        assert!(!pm.lock_path().exists());
    }

    #[tokio::test]
    async fn fresh_lock_blocks_save() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        std::fs::write(pm.lock_path(), now_ms().to_string()).unwrap();

        let err = pm.save(&sample_graph().get_all_nodes()).await.unwrap_err();
        assert!(err.to_string().contains("locked"));
        assert!(!pm.primary_path().exists());
        // Another writer's lock is left alone.
        assert!(pm.lock_path().exists());
    }

    #[tokio::test]
    async fn stale_lock_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let six_minutes_ago = now_ms() - 6 * 60 * 1000;
        std::fs::write(pm.lock_path(), six_minutes_ago.to_string()).unwrap();

        pm.save(&sample_graph().get_all_nodes()).await.unwrap();
        assert!(pm.primary_path().exists());
        assert!(!pm.lock_path().exists());
    }

    #[tokio::test]
    async fn unparsable_lock_uses_file_age() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        std::fs::write(pm.lock_path(), "not-a-timestamp").unwrap();
        // Just written, so it is fresh.
        assert!(pm.save(&NodeSnapshot::new()).await.is_err());
    }

    #[tokio::test]
    async fn lock_removed_when_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        // A directory where the primary file should be makes the write fail.
        std::fs::create_dir(pm.primary_path()).unwrap();
        let mut config = PersistenceConfig::new(dir.path());
        config.backup_enabled = false;
        let pm = PersistenceManager::new(config);

        assert!(pm.save(&NodeSnapshot::new()).await.is_err());
        assert!(!pm.lock_path().exists());
    }

    #[tokio::test]
    async fn cleanup_removes_residual_lock() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        std::fs::write(pm.lock_path(), now_ms().to_string()).unwrap();
        pm.cleanup().await;
        assert!(!pm.lock_path().exists());
    }

    // ── auto-save ────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn auto_save_fires_repeatedly_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        pm.start_auto_save(Duration::from_millis(20), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        assert!(pm.is_auto_save_running());

        tokio::time::sleep(Duration::from_millis(105)).await;
        let fired = calls.load(Ordering::SeqCst);
        assert!(fired >= 3, "expected at least 3 ticks, got {fired}");

        pm.stop_auto_save();
        assert!(!pm.is_auto_save_running());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), fired);
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_auto_save_skips_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let calls = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let (c, r, m) = (Arc::clone(&calls), Arc::clone(&running), Arc::clone(&max_running));
        pm.start_auto_save(Duration::from_millis(10), move || {
            let (c, r, m) = (Arc::clone(&c), Arc::clone(&r), Arc::clone(&m));
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(55)).await;
                r.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        pm.stop_auto_save();

        assert_eq!(max_running.load(Ordering::SeqCst), 1);
        let fired = calls.load(Ordering::SeqCst);
        assert!(fired < 10, "ticks should be skipped while a save runs, got {fired}");
        assert!(fired >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_auto_save_does_not_block_later_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        pm.start_auto_save(Duration::from_millis(10), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first save blows up");
                }
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        pm.stop_auto_save();
        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert!(!pm.save_in_flight.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_waits_for_running_save() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let calls = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let (c, f) = (Arc::clone(&calls), Arc::clone(&finished));

        pm.start_auto_save(Duration::from_millis(10), move || {
            let (c, f) = (Arc::clone(&c), Arc::clone(&f));
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                f.store(true, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        pm.cleanup().await;
        assert!(finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_running_save_and_clears_flag() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let finished = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&finished);

        pm.start_auto_save(Duration::from_millis(10), move || {
            let f = Arc::clone(&f);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                f.store(true, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(pm.save_in_flight.load(Ordering::SeqCst));
        pm.stop_auto_save();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert!(!pm.save_in_flight.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn zero_interval_disables_auto_save() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        pm.start_auto_save(Duration::ZERO, || async { Ok(()) });
        assert!(!pm.is_auto_save_running());
    }
}
