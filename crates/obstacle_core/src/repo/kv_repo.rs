//! Durable key-value storage contracts and implementations.
//!
//! # Responsibility
//! - Provide a minimal string key-value API for on-device persistence.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `set_item` replaces the whole value stored under a key.
//! - A missing key reads as `None`, never as an error.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Key-value storage error.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Connection exists but migrations have not brought it to the latest
    /// schema.
    SchemaNotReady { db_version: u32, expected: u32 },
    /// Backend cannot be reached at all (full disk, revoked sandbox, ...).
    ///
    /// The bundled stores never return it; `KeyValueStore` implementations
    /// outside this crate report their own backend failures through it.
    Unavailable(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::SchemaNotReady {
                db_version,
                expected,
            } => write!(
                f,
                "key-value schema version {db_version} is not migrated to {expected}"
            ),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::SchemaNotReady { .. } | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// String key-value storage that survives process restarts.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> RepoResult<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> RepoResult<()>;
    fn remove_item(&mut self, key: &str) -> RepoResult<()>;
}

/// SQLite-backed key-value storage.
pub struct SqliteKvStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKvStore<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    ///
    /// # Errors
    /// - `SchemaNotReady` when the connection was not migrated.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let db_version = current_version(conn)?;
        let expected = latest_version();
        if db_version != expected {
            return Err(RepoError::SchemaNotReady {
                db_version,
                expected,
            });
        }
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteKvStore<'_> {
    fn get_item(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value)
             VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1;", [key])?;
        Ok(())
    }
}

/// In-process key-value storage for previews and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    items: BTreeMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a store with one raw value, e.g. data written by an older build.
    pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut items = BTreeMap::new();
        items.insert(key.into(), value.into());
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get_item(&self, key: &str) -> RepoResult<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> RepoResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> RepoResult<()> {
        self.items.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyValueStore, MemoryKvStore};

    #[test]
    fn memory_store_overwrites_and_removes() {
        let mut store = MemoryKvStore::new();
        store.set_item("k", "one").unwrap();
        store.set_item("k", "two").unwrap();
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("two"));
        assert_eq!(store.len(), 1);

        store.remove_item("k").unwrap();
        store.remove_item("k").unwrap();
        assert!(store.get_item("k").unwrap().is_none());
        assert!(store.is_empty());
    }
}
