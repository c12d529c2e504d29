//! Quarantine lifecycle: back up, confirm, restore, purge.

use crate::config::EngineConfig;
use crate::core::media::{mime_type_for, DeletionConfirmation, MediaAccess, RestoreTarget};
use crate::core::store::{GalleryStore, QuarantineRecord};
use crate::error::{MediaError, QuarantineError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, TryLockError};
use uuid::Uuid;

/// A backup that exists on disk but is not yet durable.
///
/// Either [`QuarantineManager::finalize`] it once the original is gone, or
/// [`QuarantineManager::discard`] it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuarantine {
    pub original_identifier: String,
    pub backup_path: PathBuf,
    /// Unix millis
    pub moved_at: i64,
    /// Unix millis
    pub expires_at: i64,
}

/// What a purge pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Expired records deleted
    pub records_purged: usize,
    /// Backup files deleted for those records
    pub files_removed: usize,
    /// Backup files that could not be deleted (left for the orphan sweep)
    pub files_failed: usize,
    /// Unreferenced backup files past retention
    pub orphans_removed: usize,
    /// Another purge was running, so this one did nothing
    pub skipped: bool,
}

/// Moves assets into a backup directory and tracks them until they are
/// restored or expire.
pub struct QuarantineManager<S: GalleryStore + ?Sized> {
    store: Arc<S>,
    backup_dir: PathBuf,
    retention_millis: i64,
    purging: Mutex<()>,
}

impl<S: GalleryStore + ?Sized> QuarantineManager<S> {
    /// A relative `backup_dir` is resolved against the current directory
    /// now, so stored backup paths stay valid if the process moves.
    pub fn new(store: Arc<S>, backup_dir: impl Into<PathBuf>, config: &EngineConfig) -> Self {
        let backup_dir = backup_dir.into();
        Self {
            store,
            backup_dir: std::path::absolute(&backup_dir).unwrap_or(backup_dir),
            retention_millis: config.retention_millis(),
            purging: Mutex::new(()),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Copy an asset's bytes into a fresh backup file.
    ///
    /// The live asset and the store are untouched. On failure any partial
    /// backup is removed.
    pub fn move_to_backup(
        &self,
        media: &dyn MediaAccess,
        identifier: &str,
        display_name: &str,
    ) -> Result<PendingQuarantine, QuarantineError> {
        fs::create_dir_all(&self.backup_dir).map_err(|source| {
            QuarantineError::BackupDirectory {
                path: self.backup_dir.clone(),
                source,
            }
        })?;

        let moved_at = chrono::Utc::now().timestamp_millis();
        let backup_path = self.backup_dir.join(backup_file_name(moved_at, display_name));
        let copy_failed = |reason: String| QuarantineError::CopyFailed {
            identifier: identifier.to_string(),
            reason,
        };

        let mut source = media
            .open_stream(identifier)
            .map_err(|e| copy_failed(e.to_string()))?;
        let mut backup = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&backup_path)
            .map_err(|e| copy_failed(e.to_string()))?;

        if let Err(e) = io::copy(&mut source, &mut backup).and_then(|_| backup.sync_all()) {
            drop(backup);
            if let Err(cleanup) = fs::remove_file(&backup_path) {
                tracing::warn!(
                    "Failed to remove partial backup {}: {}",
                    backup_path.display(),
                    cleanup
                );
            }
            return Err(copy_failed(e.to_string()));
        }

        tracing::info!("Backed up {} to {}", identifier, backup_path.display());
        Ok(PendingQuarantine {
            original_identifier: identifier.to_string(),
            backup_path,
            moved_at,
            expires_at: moved_at + self.retention_millis,
        })
    }

    /// Make a backup durable once the original is gone.
    ///
    /// Inserts the quarantine record, then removes the asset's scan record.
    pub fn finalize(&self, pending: PendingQuarantine) -> Result<QuarantineRecord, QuarantineError> {
        let mut record = QuarantineRecord {
            id: None,
            original_identifier: pending.original_identifier,
            backup_path: pending.backup_path,
            moved_at: pending.moved_at,
            expires_at: pending.expires_at,
        };

        record.id = Some(self.store.insert(&record)?);
        self.store
            .delete_by_identifiers(std::slice::from_ref(&record.original_identifier))?;

        tracing::info!(
            "Quarantined {} until {}",
            record.original_identifier,
            record.expires_at
        );
        Ok(record)
    }

    /// Throw away an unconfirmed backup. A missing file is fine.
    pub fn discard(&self, pending: PendingQuarantine) -> Result<(), QuarantineError> {
        remove_backup(&pending.backup_path).map_err(|e| QuarantineError::CopyFailed {
            identifier: pending.original_identifier.clone(),
            reason: format!("could not discard backup: {e}"),
        })?;
        tracing::debug!("Discarded backup of {}", pending.original_identifier);
        Ok(())
    }

    /// Back up, ask for deletion, then finalize or discard.
    pub fn quarantine_with_confirmation(
        &self,
        media: &dyn MediaAccess,
        confirmation: &dyn DeletionConfirmation,
        identifier: &str,
        display_name: &str,
    ) -> Result<QuarantineRecord, QuarantineError> {
        let pending = self.move_to_backup(media, identifier, display_name)?;

        match confirmation.confirm_deletion(identifier) {
            Ok(true) => self.finalize(pending).map_err(|e| {
                tracing::error!(
                    "{} was deleted but its quarantine record was not written: {}",
                    identifier,
                    e
                );
                e
            }),
            Ok(false) => {
                self.discard(pending)?;
                Err(QuarantineError::ConfirmationDenied {
                    identifier: identifier.to_string(),
                })
            }
            Err(e) => {
                self.discard(pending)?;
                Err(QuarantineError::ConfirmationFailed {
                    identifier: identifier.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Write a quarantined asset back and forget the backup.
    ///
    /// Returns the identifier of the restored asset.
    pub fn restore(
        &self,
        original_identifier: &str,
        target: &dyn RestoreTarget,
    ) -> Result<String, QuarantineError> {
        let record = self
            .store
            .find_by_original_identifier(original_identifier)?
            .ok_or_else(|| QuarantineError::NotQuarantined {
                identifier: original_identifier.to_string(),
            })?;

        let mut backup = File::open(&record.backup_path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                QuarantineError::BackupMissing {
                    path: record.backup_path.clone(),
                }
            } else {
                QuarantineError::RestoreFailed {
                    identifier: original_identifier.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let display_name = display_name_of(&record.backup_path);
        let restored = target
            .write_back(&mut backup, &display_name, mime_type_for(&display_name))
            .map_err(|e: MediaError| QuarantineError::RestoreFailed {
                identifier: original_identifier.to_string(),
                reason: e.to_string(),
            })?;
        drop(backup);

        if let Some(id) = record.id {
            self.store.delete_by_ids(&[id])?;
        }
        if let Err(e) = remove_backup(&record.backup_path) {
            tracing::warn!(
                "Restored {} but could not delete backup {}: {}",
                original_identifier,
                record.backup_path.display(),
                e
            );
        }

        tracing::info!("Restored {} as {}", original_identifier, restored);
        Ok(restored)
    }

    /// Delete every record expired at `now` (unix millis) with its backup,
    /// then sweep orphaned backups past retention.
    ///
    /// Skipped when another purge is already running.
    pub fn purge_expired(&self, now: i64) -> Result<PurgeReport, QuarantineError> {
        let _running = match self.purging.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                tracing::debug!("Purge already running; skipping");
                return Ok(PurgeReport {
                    skipped: true,
                    ..PurgeReport::default()
                });
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let mut report = PurgeReport::default();
        let expired = self.store.find_expired(now)?;
        let mut ids = Vec::with_capacity(expired.len());

        for record in &expired {
            match remove_backup(&record.backup_path) {
                Ok(()) => report.files_removed += 1,
                Err(e) => {
                    report.files_failed += 1;
                    tracing::warn!(
                        "Failed to delete backup {}: {}",
                        record.backup_path.display(),
                        e
                    );
                }
            }
            ids.extend(record.id);
        }

        report.records_purged = self.store.delete_by_ids(&ids)?;
        report.orphans_removed = self.sweep_orphans(now)?;

        if report.records_purged > 0 || report.orphans_removed > 0 {
            tracing::info!(
                "Purged {} quarantined assets and {} orphaned backups",
                report.records_purged,
                report.orphans_removed
            );
        }
        Ok(report)
    }

    /// Purge a single record, only if it has expired at `now`.
    ///
    /// Returns whether anything was purged.
    pub fn purge_one(&self, id: i64, now: i64) -> Result<bool, QuarantineError> {
        let Some(record) = self.store.find_by_id(id)? else {
            return Ok(false);
        };
        if !record.is_expired(now) {
            return Ok(false);
        }

        if let Err(e) = remove_backup(&record.backup_path) {
            tracing::warn!(
                "Failed to delete backup {}: {}",
                record.backup_path.display(),
                e
            );
        }
        self.store.delete_by_ids(&[id])?;
        tracing::info!("Purged {}", record.original_identifier);
        Ok(true)
    }

    /// Quarantined assets, most recently moved first
    pub fn list(&self) -> Result<Vec<QuarantineRecord>, QuarantineError> {
        Ok(self.store.list()?)
    }

    /// Delete backup files that no record points at and whose embedded
    /// timestamp is past retention. Younger files may belong to a pending
    /// quarantine and are left alone.
    ///
    /// Records are matched by file name. Backup names are unique, and a
    /// record may spell the backup directory differently than this manager.
    fn sweep_orphans(&self, now: i64) -> Result<usize, QuarantineError> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(QuarantineError::BackupDirectory {
                    path: self.backup_dir.clone(),
                    source,
                })
            }
        };

        let referenced: HashSet<OsString> = self
            .store
            .list()?
            .into_iter()
            .filter_map(|r| r.backup_path.file_name().map(OsStr::to_os_string))
            .collect();

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || referenced.contains(&entry.file_name()) {
                continue;
            }
            let Some(moved_at) = moved_at_of(&path) else {
                continue;
            };
            if moved_at.saturating_add(self.retention_millis) > now {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to delete orphan {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}

/// `{moved_at}-{uuid}_{name}`, unique even for same-named assets moved in
/// the same millisecond
fn backup_file_name(moved_at: i64, display_name: &str) -> String {
    let name = Path::new(display_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("asset");
    format!("{}-{}_{}", moved_at, Uuid::new_v4().simple(), name)
}

/// The original display name embedded in a backup file name
pub fn display_name_of(backup_path: &Path) -> String {
    let file_name = backup_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split_once('_') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ => file_name,
    }
}

fn moved_at_of(backup_path: &Path) -> Option<i64> {
    let file_name = backup_path.file_name()?.to_str()?;
    let (prefix, _) = file_name.split_once('-')?;
    prefix.parse().ok()
}

/// Delete a backup file; one that is already gone counts as deleted
fn remove_backup(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MILLIS_PER_DAY;
    use crate::core::media::{AutoConfirm, FsCollection, FsRestoreTarget};
    use crate::core::store::test_support::record;
    use crate::core::store::{AssetStore, InMemoryStore, QuarantineStore};
    use tempfile::TempDir;

    struct Decline;

    impl DeletionConfirmation for Decline {
        fn confirm_deletion(&self, _identifier: &str) -> Result<bool, MediaError> {
            Ok(false)
        }
    }

    struct Fixture {
        dir: TempDir,
        store: Arc<InMemoryStore>,
        manager: QuarantineManager<InMemoryStore>,
        media: FsCollection,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(InMemoryStore::new());
            let manager = QuarantineManager::new(
                Arc::clone(&store),
                dir.path().join("backups"),
                &EngineConfig::default(),
            );
            let media = FsCollection::new(dir.path());
            Self {
                dir,
                store,
                manager,
                media,
            }
        }

        fn photo(&self, name: &str, bytes: &[u8]) -> String {
            let path = self.dir.path().join(name);
            fs::write(&path, bytes).unwrap();
            let identifier = path.to_string_lossy().into_owned();
            self.store.upsert(&record(&identifier, bytes.len() as u64, 1)).unwrap();
            identifier
        }
    }

    #[test]
    fn backup_names_embed_timestamp_and_display_name() {
        let name = backup_file_name(1234, "IMG_0001.jpg");
        assert!(name.starts_with("1234-"));
        assert_eq!(display_name_of(Path::new(&name)), "IMG_0001.jpg");
        assert_eq!(moved_at_of(Path::new(&name)), Some(1234));
    }

    #[test]
    fn move_then_finalize_replaces_asset_record() {
        let fx = Fixture::new();
        let identifier = fx.photo("a.jpg", b"original bytes");

        let pending = fx
            .manager
            .move_to_backup(&fx.media, &identifier, "a.jpg")
            .unwrap();
        assert_eq!(fs::read(&pending.backup_path).unwrap(), b"original bytes");
        assert_eq!(pending.expires_at - pending.moved_at, 30 * MILLIS_PER_DAY);
        assert!(fx.store.find_by_identifier(&identifier).unwrap().is_some());

        let record = fx.manager.finalize(pending).unwrap();

        assert!(record.id.is_some());
        assert_eq!(fx.store.list().unwrap().len(), 1);
        assert!(fx.store.find_by_identifier(&identifier).unwrap().is_none());
    }

    #[test]
    fn failed_copy_leaves_no_partial_backup() {
        let fx = Fixture::new();
        let missing = fx.dir.path().join("missing.jpg");

        let result = fx
            .manager
            .move_to_backup(&fx.media, missing.to_str().unwrap(), "missing.jpg");

        assert!(matches!(result, Err(QuarantineError::CopyFailed { .. })));
        let leftovers = fs::read_dir(fx.manager.backup_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn declined_deletion_discards_backup() {
        let fx = Fixture::new();
        let identifier = fx.photo("a.jpg", b"bytes");

        let result =
            fx.manager
                .quarantine_with_confirmation(&fx.media, &Decline, &identifier, "a.jpg");

        assert!(matches!(
            result,
            Err(QuarantineError::ConfirmationDenied { .. })
        ));
        assert!(Path::new(&identifier).exists());
        assert!(fx.store.find_by_identifier(&identifier).unwrap().is_some());
        assert!(fx.store.list().unwrap().is_empty());
        assert_eq!(fs::read_dir(fx.manager.backup_dir()).unwrap().count(), 0);
    }

    #[test]
    fn confirmed_deletion_quarantines() {
        let fx = Fixture::new();
        let identifier = fx.photo("a.jpg", b"bytes");

        let record = fx
            .manager
            .quarantine_with_confirmation(&fx.media, &AutoConfirm, &identifier, "a.jpg")
            .unwrap();

        assert!(!Path::new(&identifier).exists());
        assert!(record.backup_path.exists());
        assert!(fx.store.find_by_identifier(&identifier).unwrap().is_none());
    }

    #[test]
    fn restore_writes_back_and_forgets_backup() {
        let fx = Fixture::new();
        let identifier = fx.photo("a.jpg", b"keep me");
        let record = fx
            .manager
            .quarantine_with_confirmation(&fx.media, &AutoConfirm, &identifier, "a.jpg")
            .unwrap();

        let target = FsRestoreTarget::new(fx.dir.path().join("restored"));
        let restored = fx.manager.restore(&identifier, &target).unwrap();

        assert_ne!(restored, identifier);
        assert!(restored.ends_with("a.jpg"));
        assert_eq!(fs::read(&restored).unwrap(), b"keep me");
        assert!(fx.store.list().unwrap().is_empty());
        assert!(!record.backup_path.exists());
    }

    #[test]
    fn restore_unknown_asset_fails() {
        let fx = Fixture::new();
        let target = FsRestoreTarget::new(fx.dir.path());
        let result = fx.manager.restore("/nowhere.jpg", &target);
        assert!(matches!(result, Err(QuarantineError::NotQuarantined { .. })));
    }

    #[test]
    fn restore_with_missing_backup_keeps_record() {
        let fx = Fixture::new();
        let identifier = fx.photo("a.jpg", b"bytes");
        let record = fx
            .manager
            .quarantine_with_confirmation(&fx.media, &AutoConfirm, &identifier, "a.jpg")
            .unwrap();
        fs::remove_file(&record.backup_path).unwrap();

        let target = FsRestoreTarget::new(fx.dir.path());
        let result = fx.manager.restore(&identifier, &target);

        assert!(matches!(result, Err(QuarantineError::BackupMissing { .. })));
        assert_eq!(fx.store.list().unwrap().len(), 1);
    }

    #[test]
    fn purge_removes_only_expired_records_and_files() {
        let fx = Fixture::new();
        let old = fx.photo("old.jpg", b"old");
        let record = fx
            .manager
            .quarantine_with_confirmation(&fx.media, &AutoConfirm, &old, "old.jpg")
            .unwrap();

        let before_expiry = fx.manager.purge_expired(record.expires_at - 1).unwrap();
        assert_eq!(before_expiry.records_purged, 0);
        assert!(record.backup_path.exists());

        let report = fx.manager.purge_expired(record.expires_at).unwrap();
        assert_eq!(report.records_purged, 1);
        assert_eq!(report.files_removed, 1);
        assert!(!record.backup_path.exists());
        assert!(fx.store.list().unwrap().is_empty());
    }

    #[test]
    fn purge_with_missing_file_still_deletes_record() {
        let fx = Fixture::new();
        let identifier = fx.photo("a.jpg", b"bytes");
        let record = fx
            .manager
            .quarantine_with_confirmation(&fx.media, &AutoConfirm, &identifier, "a.jpg")
            .unwrap();
        fs::remove_file(&record.backup_path).unwrap();

        let report = fx.manager.purge_expired(record.expires_at).unwrap();

        assert_eq!(report.records_purged, 1);
        assert_eq!(report.files_failed, 0);
    }

    #[test]
    fn orphan_sweep_respects_retention() {
        let fx = Fixture::new();
        let backups = fx.manager.backup_dir().to_path_buf();
        fs::create_dir_all(&backups).unwrap();
        let orphan = backups.join(backup_file_name(0, "orphan.jpg"));
        fs::write(&orphan, b"x").unwrap();

        let young = fx.manager.purge_expired(30 * MILLIS_PER_DAY - 1).unwrap();
        assert_eq!(young.orphans_removed, 0);
        assert!(orphan.exists());

        let old = fx.manager.purge_expired(30 * MILLIS_PER_DAY).unwrap();
        assert_eq!(old.orphans_removed, 1);
        assert!(!orphan.exists());
    }

    #[test]
    fn orphan_sweep_keeps_backups_of_live_records_however_spelled() {
        let fx = Fixture::new();
        let backups = fx.manager.backup_dir().to_path_buf();
        fs::create_dir_all(&backups).unwrap();
        let name = backup_file_name(0, "kept.jpg");
        fs::write(backups.join(&name), b"x").unwrap();

        // Stored under an older, longer retention and a roundabout path
        let roundabout = fx.dir.path().join("backups").join("..").join("backups").join(&name);
        fx.store
            .insert(&QuarantineRecord {
                id: None,
                original_identifier: "/photos/kept.jpg".to_string(),
                backup_path: roundabout,
                moved_at: 0,
                expires_at: 60 * MILLIS_PER_DAY,
            })
            .unwrap();

        let report = fx.manager.purge_expired(31 * MILLIS_PER_DAY).unwrap();

        assert_eq!(report.records_purged, 0);
        assert_eq!(report.orphans_removed, 0);
        assert!(backups.join(&name).exists());
        assert_eq!(fx.store.list().unwrap().len(), 1);
    }

    #[test]
    fn relative_backup_dir_is_made_absolute() {
        let manager = QuarantineManager::new(
            Arc::new(InMemoryStore::new()),
            "quarantine",
            &EngineConfig::default(),
        );
        assert!(manager.backup_dir().is_absolute());
        assert!(manager.backup_dir().ends_with("quarantine"));
    }

    #[test]
    fn purge_one_requires_expiry() {
        let fx = Fixture::new();
        let identifier = fx.photo("a.jpg", b"bytes");
        let record = fx
            .manager
            .quarantine_with_confirmation(&fx.media, &AutoConfirm, &identifier, "a.jpg")
            .unwrap();
        let id = record.id.unwrap();

        assert!(!fx.manager.purge_one(id, record.expires_at - 1).unwrap());
        assert!(fx.manager.purge_one(id, record.expires_at).unwrap());
        assert!(!fx.manager.purge_one(id, record.expires_at).unwrap());
        assert!(fx.store.find_by_id(id).unwrap().is_none());
    }

    #[test]
    fn concurrent_purge_is_skipped() {
        let fx = Fixture::new();
        let _held = fx.manager.purging.lock().unwrap();

        let report = fx.manager.purge_expired(i64::MAX).unwrap();

        assert!(report.skipped);
    }
}
