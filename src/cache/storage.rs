//! Snapshot storage trait and SQLite implementation.
//!
//! Persists the last complete snapshot of each collection so a later run can
//! serve stale-but-available data before (or instead of) reaching the store.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::Record;

/// A persisted collection snapshot.
#[derive(Debug, Clone)]
pub struct CachedSnapshot<R> {
  /// Records in their original fetch order
  pub items: Vec<R>,
  /// When the snapshot was originally fetched
  pub cached_at: DateTime<Utc>,
}

/// Trait for snapshot storage backends.
pub trait SnapshotStorage: Send + Sync {
  /// Replace the stored snapshot for `R`'s collection.
  fn store_snapshot<R: Record>(&self, items: &[R], fetched_at: DateTime<Utc>) -> Result<()>;

  /// Load the stored snapshot for `R`'s collection, if any.
  fn load_snapshot<R: Record>(&self) -> Result<Option<CachedSnapshot<R>>>;

  /// Drop the stored snapshot for `R`'s collection.
  fn clear_snapshot<R: Record>(&self) -> Result<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when snapshot persistence is disabled.
pub struct NoopStorage;

impl SnapshotStorage for NoopStorage {
  fn store_snapshot<R: Record>(&self, _items: &[R], _fetched_at: DateTime<Utc>) -> Result<()> {
    Ok(())
  }

  fn load_snapshot<R: Record>(&self) -> Result<Option<CachedSnapshot<R>>> {
    Ok(None)
  }

  fn clear_snapshot<R: Record>(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based snapshot storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the snapshot database at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (or create) the snapshot database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("stockroom").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(SNAPSHOT_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for snapshot tables.
const SNAPSHOT_SCHEMA: &str = r#"
-- One row per persisted collection
CREATE TABLE IF NOT EXISTS snapshot_cache (
    collection TEXT PRIMARY KEY,
    fetched_at TEXT NOT NULL,
    record_count INTEGER NOT NULL
);

-- Serialized records, position preserves fetch order
CREATE TABLE IF NOT EXISTS snapshot_records (
    collection TEXT NOT NULL,
    record_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY (collection, record_id),
    FOREIGN KEY (collection) REFERENCES snapshot_cache(collection) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_snapshot_records_position
    ON snapshot_records(collection, position);
"#;

impl SnapshotStorage for SqliteStorage {
  fn store_snapshot<R: Record>(&self, items: &[R], fetched_at: DateTime<Utc>) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let collection = R::collection();

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM snapshot_records WHERE collection = ?",
      params![collection],
    )
    .map_err(|e| eyre!("Failed to delete old snapshot: {}", e))?;

    tx.execute(
      "INSERT OR REPLACE INTO snapshot_cache (collection, fetched_at, record_count)
       VALUES (?, ?, ?)",
      params![collection, fetched_at.to_rfc3339(), items.len()],
    )
    .map_err(|e| eyre!("Failed to update snapshot metadata: {}", e))?;

    for (position, record) in items.iter().enumerate() {
      let data =
        serde_json::to_vec(record).map_err(|e| eyre!("Failed to serialize record: {}", e))?;

      tx.execute(
        "INSERT OR REPLACE INTO snapshot_records (collection, record_id, position, data)
         VALUES (?, ?, ?, ?)",
        params![collection, record.id(), position, data],
      )
      .map_err(|e| eyre!("Failed to store record {}: {}", record.id(), e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn load_snapshot<R: Record>(&self) -> Result<Option<CachedSnapshot<R>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let collection = R::collection();

    let fetched_at: Option<String> = conn
      .query_row(
        "SELECT fetched_at FROM snapshot_cache WHERE collection = ?",
        params![collection],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read snapshot metadata: {}", e))?;

    let cached_at = match fetched_at {
      Some(s) => parse_datetime(&s)?,
      None => return Ok(None),
    };

    let mut stmt = conn
      .prepare(
        "SELECT data FROM snapshot_records
         WHERE collection = ?
         ORDER BY position",
      )
      .map_err(|e| eyre!("Failed to prepare snapshot query: {}", e))?;

    let rows: Vec<Vec<u8>> = stmt
      .query_map(params![collection], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query snapshot: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read snapshot rows: {}", e))?;

    // A snapshot written by an older schema is discarded rather than served partially.
    let items = match rows
      .iter()
      .map(|data| serde_json::from_slice::<R>(data))
      .collect::<serde_json::Result<Vec<R>>>()
    {
      Ok(items) => items,
      Err(_) => return Ok(None),
    };

    Ok(Some(CachedSnapshot { items, cached_at }))
  }

  fn clear_snapshot<R: Record>(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let collection = R::collection();

    conn
      .execute(
        "DELETE FROM snapshot_records WHERE collection = ?",
        params![collection],
      )
      .map_err(|e| eyre!("Failed to clear snapshot: {}", e))?;
    conn
      .execute(
        "DELETE FROM snapshot_cache WHERE collection = ?",
        params![collection],
      )
      .map_err(|e| eyre!("Failed to clear snapshot: {}", e))?;

    Ok(())
  }
}

/// Parse an RFC 3339 timestamp written by [`SqliteStorage::store_snapshot`].
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
