//! SQLite store backend for persistent storage.

use super::{
    AssetRecord, AssetStore, GalleryStore, QuarantineRecord, QuarantineStore, StoreStats,
};
use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const ASSET_COLUMNS: &str = "id, identifier, digest, perceptual_hash, sharpness, is_blurry,
     width, height, size_bytes, modified_at, last_scanned_at, algorithm_version";

const QUARANTINE_COLUMNS: &str = "id, original_identifier, backup_path, moved_at, expires_at";

/// SQLite-backed persistent store
///
/// Uses WAL (Write-Ahead Logging) mode so dashboard readers can proceed
/// while a scan is writing.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create a store database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, path.to_path_buf())
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS asset_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier TEXT NOT NULL UNIQUE,
                digest TEXT,
                perceptual_hash TEXT,
                sharpness REAL,
                is_blurry INTEGER,
                width INTEGER,
                height INTEGER,
                size_bytes INTEGER,
                modified_at INTEGER,
                last_scanned_at INTEGER NOT NULL,
                algorithm_version INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_asset_last_scanned
                ON asset_records(last_scanned_at DESC);
            CREATE INDEX IF NOT EXISTS idx_asset_digest ON asset_records(digest);

            CREATE TABLE IF NOT EXISTS quarantine_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                original_identifier TEXT NOT NULL,
                backup_path TEXT NOT NULL,
                moved_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_quarantine_original
                ON quarantine_records(original_identifier);
            CREATE INDEX IF NOT EXISTS idx_quarantine_expires
                ON quarantine_records(expires_at);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned {
            path: self.db_path.clone(),
        })
    }

    fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<AssetRecord> {
        Ok(AssetRecord {
            id: Some(row.get(0)?),
            identifier: row.get(1)?,
            digest: row.get(2)?,
            perceptual_hash: row.get(3)?,
            sharpness: row.get(4)?,
            is_blurry: row.get(5)?,
            width: row.get::<_, Option<i64>>(6)?.map(|v| v as u32),
            height: row.get::<_, Option<i64>>(7)?.map(|v| v as u32),
            size_bytes: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
            modified_at: row.get(9)?,
            last_scanned_at: row.get(10)?,
            algorithm_version: row.get::<_, i64>(11)? as u32,
        })
    }

    fn quarantine_from_row(row: &Row<'_>) -> rusqlite::Result<QuarantineRecord> {
        Ok(QuarantineRecord {
            id: Some(row.get(0)?),
            original_identifier: row.get(1)?,
            backup_path: PathBuf::from(row.get::<_, String>(2)?),
            moved_at: row.get(3)?,
            expires_at: row.get(4)?,
        })
    }

    fn query_assets(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<AssetRecord>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let records = stmt
            .query_map(params, Self::asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn query_quarantine(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<QuarantineRecord>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let records = stmt
            .query_map(params, Self::quarantine_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl AssetStore for SqliteStore {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<AssetRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM asset_records WHERE identifier = ?",
                    ASSET_COLUMNS
                ),
                [identifier],
                Self::asset_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn upsert(&self, record: &AssetRecord) -> Result<i64, StoreError> {
        let conn = self.lock()?;

        // A single statement, so readers see either the old or the new row
        let id = conn.query_row(
            "INSERT INTO asset_records
                (identifier, digest, perceptual_hash, sharpness, is_blurry, width, height,
                 size_bytes, modified_at, last_scanned_at, algorithm_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(identifier) DO UPDATE SET
                digest = excluded.digest,
                perceptual_hash = excluded.perceptual_hash,
                sharpness = excluded.sharpness,
                is_blurry = excluded.is_blurry,
                width = excluded.width,
                height = excluded.height,
                size_bytes = excluded.size_bytes,
                modified_at = excluded.modified_at,
                last_scanned_at = excluded.last_scanned_at,
                algorithm_version = excluded.algorithm_version
             RETURNING id",
            params![
                record.identifier,
                record.digest,
                record.perceptual_hash,
                record.sharpness,
                record.is_blurry,
                record.width.map(i64::from),
                record.height.map(i64::from),
                record.size_bytes.map(|v| v as i64),
                record.modified_at,
                record.last_scanned_at,
                i64::from(record.algorithm_version),
            ],
            |row| row.get(0),
        )?;

        Ok(id)
    }

    fn delete_where_identifier_not_in(&self, live: &HashSet<String>) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS live_identifiers (identifier TEXT PRIMARY KEY);
             DELETE FROM live_identifiers;",
        )?;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO live_identifiers (identifier) VALUES (?)")?;
            for identifier in live {
                stmt.execute([identifier])?;
            }
        }

        let removed = tx.execute(
            "DELETE FROM asset_records
             WHERE identifier NOT IN (SELECT identifier FROM live_identifiers)",
            [],
        )?;
        tx.execute("DELETE FROM live_identifiers", [])?;
        tx.commit()?;

        Ok(removed)
    }

    fn delete_by_identifiers(&self, identifiers: &[String]) -> Result<usize, StoreError> {
        if identifiers.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM asset_records WHERE identifier = ?")?;
            for identifier in identifiers {
                removed += stmt.execute([identifier])?;
            }
        }
        tx.commit()?;

        Ok(removed)
    }

    fn recent(&self, limit: usize) -> Result<Vec<AssetRecord>, StoreError> {
        let conn = self.lock()?;
        Self::query_assets(
            &conn,
            &format!(
                "SELECT {} FROM asset_records
                 ORDER BY last_scanned_at DESC, id DESC
                 LIMIT ?",
                ASSET_COLUMNS
            ),
            [limit as i64],
        )
    }

    fn all(&self) -> Result<Vec<AssetRecord>, StoreError> {
        let conn = self.lock()?;
        Self::query_assets(
            &conn,
            &format!("SELECT {} FROM asset_records ORDER BY id", ASSET_COLUMNS),
            [],
        )
    }
}

impl QuarantineStore for SqliteStore {
    fn insert(&self, record: &QuarantineRecord) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO quarantine_records
                (original_identifier, backup_path, moved_at, expires_at)
             VALUES (?, ?, ?, ?)",
            params![
                record.original_identifier,
                record.backup_path.to_string_lossy(),
                record.moved_at,
                record.expires_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_by_original_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<QuarantineRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM quarantine_records
                     WHERE original_identifier = ?
                     ORDER BY id DESC LIMIT 1",
                    QUARANTINE_COLUMNS
                ),
                [identifier],
                Self::quarantine_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<QuarantineRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM quarantine_records WHERE id = ?",
                    QUARANTINE_COLUMNS
                ),
                [id],
                Self::quarantine_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn find_expired(&self, now: i64) -> Result<Vec<QuarantineRecord>, StoreError> {
        let conn = self.lock()?;
        Self::query_quarantine(
            &conn,
            &format!(
                "SELECT {} FROM quarantine_records WHERE expires_at <= ? ORDER BY id",
                QUARANTINE_COLUMNS
            ),
            [now],
        )
    }

    fn delete_by_ids(&self, ids: &[i64]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM quarantine_records WHERE id = ?")?;
            for id in ids {
                removed += stmt.execute([id])?;
            }
        }
        tx.commit()?;

        Ok(removed)
    }

    fn list(&self) -> Result<Vec<QuarantineRecord>, StoreError> {
        let conn = self.lock()?;
        Self::query_quarantine(
            &conn,
            &format!(
                "SELECT {} FROM quarantine_records ORDER BY moved_at DESC, id DESC",
                QUARANTINE_COLUMNS
            ),
            [],
        )
    }
}

impl GalleryStore for SqliteStore {
    fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;

        let (total_assets, fingerprinted_assets, blurry_assets, oldest_scan, newest_scan) = conn
            .query_row(
                "SELECT COUNT(*),
                        COUNT(digest),
                        COALESCE(SUM(CASE WHEN is_blurry = 1 THEN 1 ELSE 0 END), 0),
                        MIN(last_scanned_at),
                        MAX(last_scanned_at)
                 FROM asset_records",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )?;

        let quarantined: i64 =
            conn.query_row("SELECT COUNT(*) FROM quarantine_records", [], |row| {
                row.get(0)
            })?;

        Ok(StoreStats {
            total_assets: total_assets as usize,
            fingerprinted_assets: fingerprinted_assets as usize,
            blurry_assets: blurry_assets as usize,
            quarantined: quarantined as usize,
            oldest_scan,
            newest_scan,
        })
    }
}
