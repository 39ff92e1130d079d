use rusqlite::{Connection, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed occurrence index with the system-font side table.
///
/// All writes go through a single writer connection. File-backed stores
/// also hold a read-only connection so queries observe WAL snapshots while
/// a batch is being written; in-memory stores share the writer.
pub struct IndexStore {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
}

impl IndexStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let writer = Connection::open(path)?;
        configure_pragmas(&writer)?;
        migrate_schema(&writer)?;

        let reader = Connection::open(path)?;
        reader.execute_batch(
            "PRAGMA busy_timeout = 5000;
             PRAGMA query_only = ON;",
        )?;

        debug!("Index store opened at {}", path.display());
        Ok(IndexStore {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure_pragmas(&conn)?;
        migrate_schema(&conn)?;
        Ok(IndexStore {
            writer: Mutex::new(conn),
            reader: None,
        })
    }

    pub(crate) fn writer(&self) -> MutexGuard<'_, Connection> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn reader(&self) -> MutexGuard<'_, Connection> {
        match &self.reader {
            Some(reader) => reader.lock().unwrap_or_else(|e| e.into_inner()),
            None => self.writer(),
        }
    }

    /// Empty the occurrence index and the system-font cache in one
    /// transaction, so no reader sees one cleared without the other.
    pub fn clear(&self) -> Result<()> {
        let mut conn = self.writer();
        let tx = conn.transaction()?;
        tx.execute_batch(
            "INSERT INTO font_occurrence_fts(font_occurrence_fts) VALUES ('delete-all');
             DELETE FROM font_occurrence;
             DELETE FROM system_font;",
        )?;
        tx.commit()?;
        debug!("Index store cleared");
        Ok(())
    }
}

fn configure_pragmas(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, so it cannot go through execute_batch.
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -16000;
         PRAGMA busy_timeout = 5000;",
    )?;
    debug!("SQLite pragmas configured (journal_mode={})", mode);
    Ok(())
}

/// Older schemas are dropped and recreated; the index is rebuilt on every
/// scan anyway.
fn migrate_schema(conn: &Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version < SCHEMA_VERSION {
        debug!(
            "Schema version {} < {}, dropping all tables and recreating",
            version, SCHEMA_VERSION
        );
        conn.execute_batch(
            "DROP TRIGGER IF EXISTS font_occurrence_ai;
             DROP TABLE IF EXISTS font_occurrence_fts;
             DROP TABLE IF EXISTS font_occurrence;
             DROP TABLE IF EXISTS system_font;",
        )?;
    }

    conn.execute_batch(include_str!("schema.sql"))?;
    debug!("SQLite schema initialized (version {})", SCHEMA_VERSION);
    Ok(())
}
