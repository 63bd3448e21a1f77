//! Disk-hygiene sweep.
//!
//! Deletes top-level job directories whose modified time is older than the
//! retention window. Runs independently of the job registry: the target is
//! stale disk state, including directories orphaned by earlier runs of the
//! process.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{info, warn};

pub(crate) fn spawn_sweep(
    root: PathBuf,
    retention: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            // First tick fires immediately, reclaiming orphans at startup.
            ticker.tick().await;
            let cutoff = SystemTime::now()
                .checked_sub(retention)
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if let Err(err) = sweep_once(&root, cutoff) {
                warn!(root = %root.display(), error = %err, "purge sweep failed");
            }
        }
    })
}

/// One pass: remove every direct subdirectory older than `cutoff`.
pub(crate) fn sweep_once(root: &Path, cutoff: SystemTime) -> std::io::Result<()> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(root)?.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        candidates.push((path, modified));
    }

    for path in select_expired(&candidates, cutoff) {
        match std::fs::remove_dir_all(&path) {
            Ok(()) => info!(path = %path.display(), "purged stale job directory"),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to purge directory");
            }
        }
    }
    Ok(())
}

/// Pure selection: entries strictly older than the cutoff.
pub(crate) fn select_expired(
    entries: &[(PathBuf, SystemTime)],
    cutoff: SystemTime,
) -> Vec<PathBuf> {
    entries
        .iter()
        .filter(|(_, modified)| *modified < cutoff)
        .map(|(path, _)| path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn selection_keeps_entries_newer_than_the_cutoff() {
        let cutoff = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let entries = vec![
            (
                PathBuf::from("/jobs/old"),
                SystemTime::UNIX_EPOCH + Duration::from_secs(100),
            ),
            (
                PathBuf::from("/jobs/fresh"),
                SystemTime::UNIX_EPOCH + Duration::from_secs(2_000),
            ),
            (PathBuf::from("/jobs/boundary"), cutoff),
        ];

        let expired = select_expired(&entries, cutoff);
        assert_eq!(expired, vec![PathBuf::from("/jobs/old")]);
    }

    #[test]
    fn sweep_removes_only_directories_past_the_cutoff() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir(root.path().join("job-a")).expect("mkdir");
        fs::create_dir(root.path().join("job-b")).expect("mkdir");
        fs::write(root.path().join("loose-file.txt"), b"keep me").expect("write");

        // Cutoff in the past: nothing qualifies.
        sweep_once(root.path(), SystemTime::UNIX_EPOCH).expect("sweep");
        assert!(root.path().join("job-a").exists());
        assert!(root.path().join("job-b").exists());

        // Cutoff in the future: every directory qualifies; files stay.
        let future = SystemTime::now() + Duration::from_secs(3_600);
        sweep_once(root.path(), future).expect("sweep");
        assert!(!root.path().join("job-a").exists());
        assert!(!root.path().join("job-b").exists());
        assert!(root.path().join("loose-file.txt").exists());
    }

    #[test]
    fn sweep_surfaces_missing_roots() {
        let root = tempfile::tempdir().expect("tempdir");
        let missing = root.path().join("nope");
        assert!(sweep_once(&missing, SystemTime::UNIX_EPOCH).is_err());
    }
}
