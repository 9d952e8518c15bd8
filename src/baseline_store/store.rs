use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};

use super::diff;
use super::types::{sanitize_story_id, ArtifactKey, ArtifactRecord, ArtifactStatus, DiffResult};
use crate::error_handling::types::StoreError;

const INDEX_FILE: &str = "metadata.json";
const TEMP_DIR: &str = "temp";

/// Filesystem-backed repository of captured images organized into
/// lifecycle buckets, plus a JSON-persisted metadata index.
///
/// The store exclusively owns the artifact files and the index. The
/// index is mutated in memory; callers persist it explicitly via
/// [`save_index`](BaselineStore::save_index) after a batch of writes.
/// Single-process assumption throughout: concurrent invocations against
/// the same baseline directory are unsafe.
pub struct BaselineStore {
    base_path: PathBuf,
    index: Mutex<HashMap<String, ArtifactRecord>>,
}

impl BaselineStore {
    /// Creates the bucket layout under `base_path` and loads the index
    /// if one exists.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        for status in ArtifactStatus::all() {
            fs::create_dir_all(base_path.join(status.dir_name()))?;
        }
        fs::create_dir_all(base_path.join(TEMP_DIR))?;
        let store = Self {
            base_path,
            index: Mutex::new(HashMap::new()),
        };
        store.load_index()?;
        info!("Baseline store initialized at {}", store.base_path.display());
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn index_path(&self) -> PathBuf {
        self.base_path.join(INDEX_FILE)
    }

    fn bucket_dir(&self, status: ArtifactStatus) -> PathBuf {
        self.base_path.join(status.dir_name())
    }

    pub fn artifact_path(&self, key: &ArtifactKey, status: ArtifactStatus) -> PathBuf {
        self.base_path.join(key.relative_path(status))
    }

    pub fn exists(&self, key: &ArtifactKey, status: ArtifactStatus) -> bool {
        self.artifact_path(key, status).exists()
    }

    fn lock_index(&self) -> Result<MutexGuard<'_, HashMap<String, ArtifactRecord>>, StoreError> {
        self.index
            .lock()
            .map_err(|_| StoreError::IndexCorrupt("index lock poisoned".to_string()))
    }

    /// Writes image bytes into the given bucket and records them in the
    /// in-memory index. Does not persist the index; that is a separate
    /// explicit step.
    pub fn write(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
        status: ArtifactStatus,
    ) -> Result<ArtifactRecord, StoreError> {
        let path = self.artifact_path(key, status);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        let record = ArtifactRecord {
            story_id: key.story_id.clone(),
            browser: key.browser.clone(),
            viewport: key.viewport.clone(),
            theme: key.theme.clone(),
            timestamp: Utc::now(),
            size: bytes.len() as u64,
            hash: hex::encode(Sha256::digest(bytes)),
            status,
        };
        self.lock_index()?.insert(key.index_key(), record.clone());
        debug!(
            "Wrote {} byte(s) for {} into {}",
            bytes.len(),
            key,
            status
        );
        Ok(record)
    }

    /// Moves one artifact between buckets. Rename first; copy-then-delete
    /// only as a cross-device fallback, so the exclusivity window stays
    /// a single syscall on the common path.
    pub fn move_artifact(
        &self,
        key: &ArtifactKey,
        from: ArtifactStatus,
        to: ArtifactStatus,
    ) -> Result<(), StoreError> {
        let src = self.artifact_path(key, from);
        let dst = self.artifact_path(key, to);
        if !src.exists() {
            return Err(StoreError::MissingArtifact(format!(
                "{} in {}",
                key, from
            )));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::rename_or_copy(&src, &dst)?;
        if let Some(record) = self.lock_index()?.get_mut(&key.index_key()) {
            record.status = to;
        }
        info!("Moved {} from {} to {}", key, from, to);
        Ok(())
    }

    fn rename_or_copy(src: &Path, dst: &Path) -> std::io::Result<()> {
        match fs::rename(src, dst) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(
                    "Rename {} -> {} failed ({}), falling back to copy",
                    src.display(),
                    dst.display(),
                    e
                );
                fs::copy(src, dst)?;
                fs::remove_file(src)
            }
        }
    }

    /// Reads both files and scores their visual difference.
    pub fn compare(&self, a: &Path, b: &Path) -> Result<DiffResult, StoreError> {
        let bytes_a = fs::read(a)?;
        let bytes_b = fs::read(b)?;
        Ok(diff::compare_bytes(&bytes_a, &bytes_b))
    }

    /// Whole-document read of the metadata index. A missing file is an
    /// empty index, not an error.
    pub fn load_index(&self) -> Result<(), StoreError> {
        let path = self.index_path();
        if !path.exists() {
            debug!("No metadata index at {}, starting empty", path.display());
            return Ok(());
        }
        let raw = fs::read_to_string(&path)?;
        let map: HashMap<String, ArtifactRecord> =
            serde_json::from_str(&raw).map_err(|e| StoreError::IndexCorrupt(e.to_string()))?;
        debug!("Loaded {} index record(s) from {}", map.len(), path.display());
        *self.lock_index()? = map;
        Ok(())
    }

    /// Whole-document write of the metadata index via temp-file-then-rename,
    /// so a crash mid-write cannot truncate the committed index.
    pub fn save_index(&self) -> Result<(), StoreError> {
        let snapshot = self.lock_index()?.clone();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StoreError::IndexCorrupt(e.to_string()))?;
        let tmp = self.base_path.join(TEMP_DIR).join("metadata.json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.index_path())?;
        debug!("Saved metadata index ({} record(s))", snapshot.len());
        Ok(())
    }

    pub fn record(&self, key: &ArtifactKey) -> Option<ArtifactRecord> {
        self.index
            .lock()
            .ok()
            .and_then(|idx| idx.get(&key.index_key()).cloned())
    }

    /// All .png files under a bucket, recursively. Unreadable directories
    /// are logged and skipped; the walk continues.
    pub fn bucket_files(&self, status: ArtifactStatus) -> Vec<PathBuf> {
        let mut out = Vec::new();
        Self::walk_files(&self.bucket_dir(status), &mut out);
        out
    }

    fn walk_files(dir: &Path, out: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                error!("Failed to read dir {}: {}", dir.display(), e);
                return;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    error!("Dir entry error under {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                Self::walk_files(&path, out);
            } else if path.extension().and_then(|s| s.to_str()) == Some("png") {
                out.push(path);
            }
        }
    }

    pub fn count_bucket(&self, status: ArtifactStatus) -> usize {
        self.bucket_files(status).len()
    }

    /// Moves every file in `from` into `to`, mirroring the directory
    /// structure. Per-entry failures are logged and skipped, and only
    /// records whose file actually moved are flipped in the index.
    /// Returns the number of files moved; a second run over an emptied
    /// bucket moves nothing.
    pub fn move_bucket(
        &self,
        from: ArtifactStatus,
        to: ArtifactStatus,
    ) -> Result<usize, StoreError> {
        let from_dir = self.bucket_dir(from);
        let to_dir = self.bucket_dir(to);
        let mut moved_rels = HashSet::new();
        for src in self.bucket_files(from) {
            let rel = match src.strip_prefix(&from_dir) {
                Ok(r) => r.to_path_buf(),
                Err(_) => continue,
            };
            let dst = to_dir.join(&rel);
            if let Some(parent) = dst.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create {}: {}", parent.display(), e);
                    continue;
                }
            }
            match Self::rename_or_copy(&src, &dst) {
                Ok(()) => {
                    moved_rels.insert(rel);
                }
                Err(e) => error!("Failed to move {}: {}", src.display(), e),
            }
        }
        self.reconcile_moved(from, to, &moved_rels)?;
        info!("Moved {} file(s) from {} to {}", moved_rels.len(), from, to);
        Ok(moved_rels.len())
    }

    /// Flips index records from `from` to `to` only when their file is in
    /// the set that actually moved on disk.
    fn reconcile_moved(
        &self,
        from: ArtifactStatus,
        to: ArtifactStatus,
        moved_rels: &HashSet<PathBuf>,
    ) -> Result<(), StoreError> {
        if moved_rels.is_empty() {
            return Ok(());
        }
        for record in self.lock_index()?.values_mut() {
            if record.status == from && moved_rels.contains(&record.key().bucket_relative()) {
                record.status = to;
            }
        }
        Ok(())
    }

    /// Moves rejected files whose modification time predates `cutoff`
    /// into the archive bucket. Index records are flipped per moved file,
    /// so a stuck or skipped file keeps its rejected record.
    pub fn archive_rejected(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let from_dir = self.bucket_dir(ArtifactStatus::Rejected);
        let to_dir = self.bucket_dir(ArtifactStatus::Archive);
        let mut moved_rels = HashSet::new();
        for src in self.bucket_files(ArtifactStatus::Rejected) {
            let mtime = match fs::metadata(&src).and_then(|m| m.modified()) {
                Ok(t) => DateTime::<Utc>::from(t),
                Err(e) => {
                    warn!("No modification time for {}: {}", src.display(), e);
                    continue;
                }
            };
            if mtime >= cutoff {
                continue;
            }
            let rel = match src.strip_prefix(&from_dir) {
                Ok(r) => r.to_path_buf(),
                Err(_) => continue,
            };
            let dst = to_dir.join(&rel);
            if let Some(parent) = dst.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create {}: {}", parent.display(), e);
                    continue;
                }
            }
            match Self::rename_or_copy(&src, &dst) {
                Ok(()) => {
                    moved_rels.insert(rel);
                }
                Err(e) => error!("Failed to archive {}: {}", src.display(), e),
            }
        }
        self.reconcile_moved(ArtifactStatus::Rejected, ArtifactStatus::Archive, &moved_rels)?;
        info!(
            "Archived {} rejected file(s) (cutoff: {})",
            moved_rels.len(),
            cutoff.to_rfc3339()
        );
        Ok(moved_rels.len())
    }

    /// True when any browser/viewport/theme combination of this story has
    /// an approved artifact.
    pub fn has_approved_for_story(&self, story_id: &str) -> bool {
        let target = format!("{}.png", sanitize_story_id(story_id));
        self.bucket_files(ArtifactStatus::Approved)
            .iter()
            .any(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy() == target)
                    .unwrap_or(false)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline_store::diff::solid_png;
    use chrono::Duration;
    use tempfile::TempDir;

    fn key(story: &str) -> ArtifactKey {
        ArtifactKey::new(story, "chromium", "desktop", "light")
    }

    #[test]
    fn test_write_lands_in_single_bucket() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let png = solid_png(4, 4, [1, 2, 3, 255]);
        let record = store.write(&key("button--primary"), &png, ArtifactStatus::Pending).unwrap();

        assert!(store.exists(&key("button--primary"), ArtifactStatus::Pending));
        for status in [
            ArtifactStatus::Approved,
            ArtifactStatus::Rejected,
            ArtifactStatus::Archive,
        ] {
            assert!(!store.exists(&key("button--primary"), status));
        }
        assert_eq!(record.size, png.len() as u64);
        assert_eq!(record.hash, hex::encode(Sha256::digest(&png)));
    }

    #[test]
    fn test_move_artifact_preserves_bucket_exclusivity() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let png = solid_png(4, 4, [9, 9, 9, 255]);
        store.write(&key("chip--default"), &png, ArtifactStatus::Pending).unwrap();

        store
            .move_artifact(&key("chip--default"), ArtifactStatus::Pending, ArtifactStatus::Approved)
            .unwrap();

        assert!(store.exists(&key("chip--default"), ArtifactStatus::Approved));
        assert!(!store.exists(&key("chip--default"), ArtifactStatus::Pending));
        assert_eq!(
            store.record(&key("chip--default")).unwrap().status,
            ArtifactStatus::Approved
        );
    }

    #[test]
    fn test_move_missing_artifact_errors() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let result = store.move_artifact(
            &key("ghost--story"),
            ArtifactStatus::Pending,
            ArtifactStatus::Approved,
        );
        assert!(matches!(result, Err(StoreError::MissingArtifact(_))));
    }

    #[test]
    fn test_index_roundtrip_through_disk() {
        let dir = TempDir::new().unwrap();
        {
            let store = BaselineStore::new(dir.path()).unwrap();
            store
                .write(&key("icon--default"), &solid_png(2, 2, [0, 0, 0, 255]), ArtifactStatus::Approved)
                .unwrap();
            store.save_index().unwrap();
        }
        let reopened = BaselineStore::new(dir.path()).unwrap();
        let record = reopened.record(&key("icon--default")).unwrap();
        assert_eq!(record.status, ArtifactStatus::Approved);
        assert_eq!(record.story_id, "icon--default");
    }

    #[test]
    fn test_move_bucket_then_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let png = solid_png(4, 4, [5, 5, 5, 255]);
        store.write(&key("a--one"), &png, ArtifactStatus::Pending).unwrap();
        store.write(&key("b--two"), &png, ArtifactStatus::Pending).unwrap();

        let first = store
            .move_bucket(ArtifactStatus::Pending, ArtifactStatus::Approved)
            .unwrap();
        assert_eq!(first, 2);
        assert_eq!(store.count_bucket(ArtifactStatus::Pending), 0);
        assert_eq!(store.count_bucket(ArtifactStatus::Approved), 2);

        // Second run over the emptied bucket is a no-op
        let second = store
            .move_bucket(ArtifactStatus::Pending, ArtifactStatus::Approved)
            .unwrap();
        assert_eq!(second, 0);
        assert_eq!(store.count_bucket(ArtifactStatus::Approved), 2);
    }

    #[test]
    fn test_move_bucket_partial_failure_keeps_stuck_record() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let png = solid_png(4, 4, [5, 5, 5, 255]);
        store.write(&key("stuck--story"), &png, ArtifactStatus::Pending).unwrap();
        store.write(&key("free--story"), &png, ArtifactStatus::Pending).unwrap();

        // Occupy one destination with a non-empty directory so both the
        // rename and the copy fallback fail for that file
        let blocked = store.artifact_path(&key("stuck--story"), ArtifactStatus::Approved);
        fs::create_dir_all(blocked.join("occupied")).unwrap();

        let moved = store
            .move_bucket(ArtifactStatus::Pending, ArtifactStatus::Approved)
            .unwrap();
        assert_eq!(moved, 1);

        assert!(store.exists(&key("stuck--story"), ArtifactStatus::Pending));
        assert_eq!(
            store.record(&key("stuck--story")).unwrap().status,
            ArtifactStatus::Pending
        );
        assert_eq!(
            store.record(&key("free--story")).unwrap().status,
            ArtifactStatus::Approved
        );
    }

    #[test]
    fn test_archive_partial_failure_keeps_stuck_record() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let png = solid_png(4, 4, [6, 6, 6, 255]);
        store.write(&key("stuck--story"), &png, ArtifactStatus::Rejected).unwrap();
        store.write(&key("free--story"), &png, ArtifactStatus::Rejected).unwrap();

        let blocked = store.artifact_path(&key("stuck--story"), ArtifactStatus::Archive);
        fs::create_dir_all(blocked.join("occupied")).unwrap();

        let moved = store
            .archive_rejected(Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(moved, 1);

        assert!(store.exists(&key("stuck--story"), ArtifactStatus::Rejected));
        assert_eq!(
            store.record(&key("stuck--story")).unwrap().status,
            ArtifactStatus::Rejected
        );
        assert_eq!(
            store.record(&key("free--story")).unwrap().status,
            ArtifactStatus::Archive
        );
    }

    #[test]
    fn test_archive_respects_age_cutoff() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let png = solid_png(4, 4, [7, 7, 7, 255]);
        store.write(&key("old--story"), &png, ArtifactStatus::Rejected).unwrap();

        // Cutoff in the past: the fresh file stays put
        let kept = store
            .archive_rejected(Utc::now() - Duration::hours(1))
            .unwrap();
        assert_eq!(kept, 0);
        assert!(store.exists(&key("old--story"), ArtifactStatus::Rejected));

        // Cutoff in the future: the file is older than it and moves
        let moved = store
            .archive_rejected(Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(moved, 1);
        assert!(!store.exists(&key("old--story"), ArtifactStatus::Rejected));
        assert!(store.exists(&key("old--story"), ArtifactStatus::Archive));
    }

    #[test]
    fn test_has_approved_for_story_any_combination() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let png = solid_png(2, 2, [1, 1, 1, 255]);
        let dark_mobile = ArtifactKey::new("menu--open", "chromium", "mobile", "dark");
        store.write(&dark_mobile, &png, ArtifactStatus::Approved).unwrap();

        assert!(store.has_approved_for_story("menu--open"));
        assert!(!store.has_approved_for_story("menu--closed"));
    }

    #[test]
    fn test_compare_reads_files() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let png = solid_png(4, 4, [3, 3, 3, 255]);
        let k = key("radio--checked");
        store.write(&k, &png, ArtifactStatus::Approved).unwrap();
        store.write(&k, &png, ArtifactStatus::Pending).unwrap();

        let diff = store
            .compare(
                &store.artifact_path(&k, ArtifactStatus::Approved),
                &store.artifact_path(&k, ArtifactStatus::Pending),
            )
            .unwrap();
        assert!(diff.identical);
    }
}
