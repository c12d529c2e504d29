//! Integration tests for the quarantine lifecycle against SQLite and a real
//! backup directory.

use gallery_keeper::config::EngineConfig;
use gallery_keeper::core::media::{identifier_for, AutoConfirm, FsCollection, FsRestoreTarget};
use gallery_keeper::core::quarantine::QuarantineManager;
use gallery_keeper::core::scan::{CancellationToken, ScanDriver};
use gallery_keeper::core::store::{AssetStore, GalleryStore, QuarantineStore, SqliteStore};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct Library {
    _dir: TempDir,
    photos: PathBuf,
    store: Arc<SqliteStore>,
    manager: QuarantineManager<SqliteStore>,
    collection: FsCollection,
}

impl Library {
    fn new(retention_days: u32) -> Self {
        let dir = TempDir::new().unwrap();
        let photos = dir.path().join("photos");
        fs::create_dir(&photos).unwrap();

        let store = Arc::new(SqliteStore::open(&dir.path().join("gallery.db")).unwrap());
        let config = EngineConfig::default().retention_days(retention_days);
        let manager =
            QuarantineManager::new(Arc::clone(&store), dir.path().join("backups"), &config);
        let collection = FsCollection::new(&photos);

        Self {
            _dir: dir,
            photos,
            store,
            manager,
            collection,
        }
    }

    fn add_photo(&self, name: &str) -> String {
        let path = self.photos.join(name);
        image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]))
            .save(&path)
            .unwrap();
        identifier_for(&path).unwrap()
    }

    fn scan(&self) {
        ScanDriver::builder(Arc::clone(&self.store))
            .build()
            .run(
                &self.collection,
                &self.collection,
                &CancellationToken::new(),
                |_| {},
            )
            .unwrap();
    }
}

#[test]
fn quarantine_restore_round_trip() {
    let library = Library::new(30);
    let identifier = library.add_photo("beach.png");
    let original_bytes = fs::read(&identifier).unwrap();
    library.scan();
    assert!(library.store.find_by_identifier(&identifier).unwrap().is_some());

    let record = library
        .manager
        .quarantine_with_confirmation(&library.collection, &AutoConfirm, &identifier, "beach.png")
        .unwrap();

    assert!(!PathBuf::from(&identifier).exists());
    assert!(library.store.find_by_identifier(&identifier).unwrap().is_none());
    assert_eq!(library.store.stats().unwrap().quarantined, 1);
    assert_eq!(
        library.store.find_by_original_identifier(&identifier).unwrap(),
        Some(record.clone())
    );

    let restored = library
        .manager
        .restore(&identifier, &FsRestoreTarget::new(&library.photos))
        .unwrap();

    assert_eq!(restored, identifier);
    assert_eq!(fs::read(&restored).unwrap(), original_bytes);
    assert!(library.store.list().unwrap().is_empty());
    assert!(!record.backup_path.exists());

    library.scan();
    assert!(library.store.find_by_identifier(&restored).unwrap().is_some());
}

#[test]
fn expired_quarantine_is_purged_with_its_file() {
    let library = Library::new(1);
    let keep = library.add_photo("keep.png");
    let doomed = library.add_photo("drop.png");
    library.scan();

    let record = library
        .manager
        .quarantine_with_confirmation(&library.collection, &AutoConfirm, &doomed, "drop.png")
        .unwrap();

    let early = library.manager.purge_expired(record.moved_at).unwrap();
    assert_eq!(early.records_purged, 0);
    assert!(record.backup_path.exists());

    let report = library.manager.purge_expired(record.expires_at).unwrap();
    assert_eq!(report.records_purged, 1);
    assert!(!record.backup_path.exists());
    assert!(library.store.list().unwrap().is_empty());

    // The untouched photo is still tracked
    assert!(library.store.find_by_identifier(&keep).unwrap().is_some());
}

#[test]
fn purge_is_idempotent() {
    let library = Library::new(1);
    let identifier = library.add_photo("a.png");
    let record = library
        .manager
        .quarantine_with_confirmation(&library.collection, &AutoConfirm, &identifier, "a.png")
        .unwrap();

    let first = library.manager.purge_expired(record.expires_at).unwrap();
    let second = library.manager.purge_expired(record.expires_at).unwrap();

    assert_eq!(first.records_purged, 1);
    assert_eq!(second.records_purged, 0);
}

#[test]
fn quarantine_by_another_spelling_drops_the_scanned_record() {
    let library = Library::new(30);
    library.add_photo("a.png");

    let dotted = FsCollection::new(library.photos.join("."));
    ScanDriver::builder(Arc::clone(&library.store))
        .build()
        .run(&dotted, &dotted, &CancellationToken::new(), |_| {})
        .unwrap();
    assert_eq!(library.store.all().unwrap().len(), 1);

    let identifier = identifier_for(&library.photos.join("a.png")).unwrap();
    library
        .manager
        .quarantine_with_confirmation(&library.collection, &AutoConfirm, &identifier, "a.png")
        .unwrap();

    assert!(library.store.all().unwrap().is_empty());
    assert_eq!(library.store.list().unwrap().len(), 1);
}
