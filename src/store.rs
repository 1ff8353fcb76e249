//! SQLite entry store.
//!
//! One `URLS` table holding the tracked urls and their last-known
//! change-detection state:
//! - ID: store-assigned row id
//! - URL: the tracked url
//! - MODIFIED: last observed Last-Modified as unix seconds, 0 = never
//! - ETAG: last observed ETag, empty = unknown
//!
//! The store holds the database path and opens a connection per operation,
//! so the sweep's concurrent units can all go through one shared handle.
//! Every connection gets a busy timeout so simultaneous writers wait on
//! the sqlite lock instead of failing.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One tracked url plus last-known change-detection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: i64,
    pub url: String,
    pub modified: i64,
    pub etag: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store at {path}: {source}")]
    Sqlite {
        path: PathBuf,
        source: rusqlite::Error,
    },
}

/// SQLite-backed store of tracked urls.
#[derive(Debug, Clone)]
pub struct UrlStore {
    db_path: PathBuf,
}

impl UrlStore {
    /// Open the store, creating the parent directory and schema if absent.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let store = UrlStore {
            db_path: db_path.to_path_buf(),
        };
        let conn = store.connect()?;
        store.init_schema(&conn)?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path).map_err(|e| self.sqlite_err(e))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| self.sqlite_err(e))?;
        Ok(conn)
    }

    fn init_schema(&self, conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS URLS (
                ID INTEGER PRIMARY KEY AUTOINCREMENT,
                URL TEXT NOT NULL,
                MODIFIED INTEGER NOT NULL DEFAULT 0,
                ETAG TEXT NOT NULL DEFAULT ''
            )",
            [],
        )
        .map_err(|e| self.sqlite_err(e))?;
        Ok(())
    }

    /// All tracked entries, in id order.
    pub fn list(&self) -> Result<Vec<Entry>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT ID, URL, MODIFIED, ETAG FROM URLS ORDER BY ID")
            .map_err(|e| self.sqlite_err(e))?;

        let entries = stmt
            .query_map([], |row| {
                Ok(Entry {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    modified: row.get(2)?,
                    etag: row.get(3)?,
                })
            })
            .map_err(|e| self.sqlite_err(e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.sqlite_err(e))?;

        Ok(entries)
    }

    /// Number of tracked entries.
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.connect()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(ID) FROM URLS", [], |row| row.get(0))
            .map_err(|e| self.sqlite_err(e))?;
        Ok(count as u64)
    }

    /// Track a new url. Starts with modified = 0 and an empty etag so the
    /// first sweep records whatever the remote reports. Returns the
    /// assigned id.
    pub fn insert(&self, url: &str) -> Result<i64, StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO URLS (URL, MODIFIED, ETAG) VALUES (?1, 0, '')",
            params![url],
        )
        .map_err(|e| self.sqlite_err(e))?;
        Ok(conn.last_insert_rowid())
    }

    /// Remove an entry by id. Returns false when the id was not tracked.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let affected = conn
            .execute("DELETE FROM URLS WHERE ID = ?1", params![id])
            .map_err(|e| self.sqlite_err(e))?;
        Ok(affected > 0)
    }

    /// Record a newly observed Last-Modified timestamp.
    pub fn update_modified(&self, id: i64, modified: i64) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE URLS SET MODIFIED = ?1 WHERE ID = ?2",
            params![modified, id],
        )
        .map_err(|e| self.sqlite_err(e))?;
        Ok(())
    }

    /// Record a newly observed ETag.
    pub fn update_etag(&self, id: i64, etag: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE URLS SET ETAG = ?1 WHERE ID = ?2",
            params![etag, id],
        )
        .map_err(|e| self.sqlite_err(e))?;
        Ok(())
    }

    fn sqlite_err(&self, source: rusqlite::Error) -> StoreError {
        StoreError::Sqlite {
            path: self.db_path.clone(),
            source,
        }
    }
}
