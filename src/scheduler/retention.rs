//! End-of-run retention and persistence of the status store.

use crate::status::StatusStore;

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// How long the entry of a target removed from the configuration survives.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(48 * 3600);

/// Prune stale entries of unconfigured targets, clear message logs and
/// overwrite the status file.
///
/// Write failures are logged; the next run starts from the last file that
/// was written successfully. Returns true if the file was written.
pub fn persist_status(
    store: &StatusStore,
    path: &Path,
    now: DateTime<Utc>,
    retention: Duration,
    configured: &HashSet<&str>,
) -> bool {
    let removed = store.prune(now, retention, configured);
    if removed > 0 {
        tracing::info!("Retention: dropped {} stale status entries", removed);
    }

    match store.save(path) {
        Ok(()) => {
            tracing::debug!("Saved status for {} targets to {}", store.len(), path.display());
            true
        }
        Err(e) => {
            tracing::error!("Error while saving status to {}: {}", path.display(), e);
            false
        }
    }
}
