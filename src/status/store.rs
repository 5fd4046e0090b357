//! Mutex-guarded status store with JSON persistence.
//!
//! Check tasks follow a read-copy / compute / write-back discipline:
//! [`StatusStore::get`] hands out a copy, the caller derives the next state
//! from it without holding the lock, and [`StatusStore::set`] writes the
//! result back. Each URL is owned by exactly one task per run, so the lock
//! only protects the map itself, never a logical read-modify-write.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

use super::models::*;

/// Status persistence error types.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Thread-safe status store.
#[derive(Clone, Default)]
pub struct StatusStore {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StatusSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(snapshot)),
        }
    }

    /// Load the store from disk.
    ///
    /// A missing, unreadable or corrupt file yields an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No status file at {}, starting empty", path.display());
                return Self::new();
            }
            Err(e) => {
                tracing::warn!("Can't read status file {}: {}", path.display(), e);
                return Self::new();
            }
        };

        match serde_json::from_slice::<StatusSnapshot>(&bytes) {
            Ok(snapshot) => {
                tracing::debug!(
                    "Loaded status for {} targets from {}",
                    snapshot.targets.len(),
                    path.display()
                );
                Self::from_snapshot(snapshot)
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt status file {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Per-target state ---

    /// Copy of the state for `url`, or the zero state if it was never stored.
    pub fn get(&self, url: &str) -> TargetState {
        self.lock().targets.get(url).cloned().unwrap_or_default()
    }

    /// Replace the state for `url`.
    pub fn set(&self, url: &str, state: TargetState) {
        self.lock().targets.insert(url.to_string(), state);
    }

    /// Visit a snapshot of every entry in URL order.
    ///
    /// The callback runs without the lock held.
    pub fn for_each<F: FnMut(&str, &TargetState)>(&self, mut f: F) {
        for (url, state) in self.entries() {
            f(&url, &state);
        }
    }

    /// Copy of every entry in URL order.
    pub fn entries(&self) -> Vec<(String, TargetState)> {
        self.lock()
            .targets
            .iter()
            .map(|(url, state)| (url.clone(), state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- Digest bookkeeping ---

    pub fn last_digest(&self) -> Option<DateTime<Utc>> {
        self.lock().last_digest
    }

    pub fn set_last_digest(&self, time: DateTime<Utc>) {
        self.lock().last_digest = Some(time);
    }

    // --- Retention and persistence ---

    /// Drop entries of targets missing from `configured` that had no
    /// activity since `now - window`, and clear the message log of the
    /// survivors.
    ///
    /// Configured targets are always kept, whatever their interval.
    /// Returns the number of dropped entries.
    pub fn prune(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        configured: &HashSet<&str>,
    ) -> usize {
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| now.checked_sub_signed(w));

        let mut snapshot = self.lock();
        let before = snapshot.targets.len();

        snapshot.targets.retain(|url, state| {
            if configured.contains(url.as_str()) {
                return true;
            }
            match (state.activity_time(), cutoff) {
                (Some(t), Some(cutoff)) => t >= cutoff,
                (Some(_), None) => true,
                (None, _) => false,
            }
        });

        for state in snapshot.targets.values_mut() {
            state.messages.clear();
        }

        before - snapshot.targets.len()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, StatusError> {
        let snapshot = self.lock().clone();
        Ok(serde_json::to_vec_pretty(&snapshot)?)
    }

    /// Overwrite the status file.
    ///
    /// Writes a sibling temp file first and renames it into place.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StatusError> {
        let path = path.as_ref();
        let data = self.to_json()?;

        let tmp = temp_path(path);
        std::fs::write(&tmp, &data)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap() + chrono::Duration::hours(hour as i64)
    }

    fn checked_at(time: DateTime<Utc>) -> TargetState {
        TargetState {
            ok: true,
            consecutive_failures: 0,
            notify_sent: true,
            last_check: Some(time),
            first_seen: None,
            messages: vec![MessageEntry {
                time,
                subject: "OK: http://example.com".to_string(),
                body: "OK".to_string(),
            }],
        }
    }

    #[test]
    fn test_get_absent_returns_zero_state() {
        let store = StatusStore::new();
        assert_eq!(store.get("http://nowhere.example"), TargetState::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_then_get() {
        let store = StatusStore::new();
        let state = checked_at(at(1));
        store.set("http://example.com", state.clone());
        assert_eq!(store.get("http://example.com"), state);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_writers_on_distinct_keys() {
        let store = StatusStore::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let url = format!("http://site{}.example", i);
                    let mut state = store.get(&url);
                    state.consecutive_failures = i;
                    store.set(&url, state);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 16);
        assert_eq!(store.get("http://site7.example").consecutive_failures, 7);
    }

    #[test]
    fn test_prune_drops_stale_and_clears_logs() {
        let store = StatusStore::new();
        let now = at(100);

        let mut fresh = checked_at(at(90));
        fresh.consecutive_failures = 3;
        fresh.ok = false;
        store.set("http://fresh.example", fresh.clone());
        store.set("http://stale.example", checked_at(at(100 - 49)));
        store.set("http://edge.example", checked_at(at(100 - 48)));
        store.set("http://never.example", TargetState::default());

        let removed = store.prune(now, Duration::from_secs(48 * 3600), &HashSet::new());
        assert_eq!(removed, 2);

        let kept = store.get("http://fresh.example");
        assert!(kept.messages.is_empty());
        assert_eq!(kept.consecutive_failures, 3);
        assert!(!kept.ok);
        assert!(kept.notify_sent);
        assert_eq!(kept.last_check, fresh.last_check);

        assert_eq!(store.get("http://edge.example").last_check, Some(at(52)));
        assert_eq!(store.get("http://stale.example"), TargetState::default());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_prune_uses_first_seen_for_unchecked_targets() {
        let store = StatusStore::new();
        store.set(
            "http://new.example",
            TargetState {
                first_seen: Some(at(99)),
                ..Default::default()
            },
        );

        let window = Duration::from_secs(24 * 3600);
        assert_eq!(store.prune(at(100), window, &HashSet::new()), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_prune_keeps_configured_targets() {
        let store = StatusStore::new();
        let mut slow = checked_at(at(0));
        slow.ok = false;
        slow.consecutive_failures = 4;
        store.set("http://weekly.example", slow);
        store.set("http://dropped.example", checked_at(at(0)));

        let configured: HashSet<&str> = ["http://weekly.example"].into_iter().collect();
        let removed = store.prune(at(100), Duration::from_secs(48 * 3600), &configured);
        assert_eq!(removed, 1);

        let kept = store.get("http://weekly.example");
        assert_eq!(kept.consecutive_failures, 4);
        assert!(!kept.ok);
        assert!(kept.messages.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");

        let store = StatusStore::new();
        store.set("http://example.com", checked_at(at(5)));
        store.set_last_digest(at(6));
        store.save(&path).unwrap();

        let loaded = StatusStore::load(&path);
        assert_eq!(loaded.get("http://example.com"), checked_at(at(5)));
        assert_eq!(loaded.last_digest(), Some(at(6)));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = StatusStore::load(dir.path().join("absent.json"));
        assert!(store.is_empty());
        assert!(store.last_digest().is_none());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, b"{ this is not json").unwrap();

        let store = StatusStore::load(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let store = StatusStore::new();
        let result = store.save(dir.path().join("missing").join("status.json"));
        assert!(matches!(result, Err(StatusError::Io(_))));
    }

    #[test]
    fn test_for_each_visits_in_url_order() {
        let store = StatusStore::new();
        store.set("http://b.example", TargetState::default());
        store.set("http://a.example", TargetState::default());

        let mut seen = Vec::new();
        store.for_each(|url, _| seen.push(url.to_string()));
        assert_eq!(seen, vec!["http://a.example", "http://b.example"]);
    }
}
