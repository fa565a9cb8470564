use obstacle_core::db::migrations::{apply_migrations, current_version, latest_version};
use obstacle_core::db::{open_db, open_db_in_memory, DbError};
use obstacle_core::{
    KeyValueStore, ObstacleDraft, ObstacleStore, RepoError, SqliteKvStore, STORAGE_KEY,
};
use rusqlite::Connection;

#[test]
fn open_in_memory_applies_latest_schema() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(current_version(&conn).unwrap(), latest_version());

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv_store';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(table_count, 1);
}

#[test]
fn migrations_are_idempotent() {
    let mut conn = open_db_in_memory().unwrap();
    apply_migrations(&mut conn).unwrap();
    apply_migrations(&mut conn).unwrap();
    assert_eq!(current_version(&conn).unwrap(), latest_version());
}

#[test]
fn newer_schema_is_rejected() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version() + 1))
        .unwrap();

    let err = apply_migrations(&mut conn).unwrap_err();
    assert!(matches!(err, DbError::UnsupportedSchemaVersion { .. }));
}

#[test]
fn unmigrated_connection_is_refused() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteKvStore::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::SchemaNotReady {
            db_version: 0,
            ..
        }
    ));
}

#[test]
fn set_item_upserts_and_remove_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let mut kv = SqliteKvStore::try_new(&conn).unwrap();

    assert!(kv.get_item("@k").unwrap().is_none());
    kv.set_item("@k", "[1]").unwrap();
    kv.set_item("@k", "[1,2]").unwrap();
    assert_eq!(kv.get_item("@k").unwrap().as_deref(), Some("[1,2]"));

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM kv_store;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);

    kv.remove_item("@k").unwrap();
    kv.remove_item("@k").unwrap();
    assert!(kv.get_item("@k").unwrap().is_none());
}

#[test]
fn obstacles_survive_reopening_the_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("obstacles.sqlite3");

    let written = {
        let conn = open_db(&path).unwrap();
        let mut store = ObstacleStore::open(SqliteKvStore::try_new(&conn).unwrap()).unwrap();
        store.add(&ObstacleDraft::new("Stairs", "No ramp")).unwrap();
        store.add(&ObstacleDraft::new("Pothole", "")).unwrap();
        store.attach_photo(2, "file:///p.jpg").unwrap();
        store.remove(1).unwrap();
        store.obstacles().to_vec()
    };

    let conn = open_db(&path).unwrap();
    let store = ObstacleStore::open(SqliteKvStore::try_new(&conn).unwrap()).unwrap();
    assert_eq!(store.obstacles(), written.as_slice());
    assert_eq!(store.obstacles()[0].id, 2);
    assert_eq!(store.obstacles()[0].photos, vec!["file:///p.jpg"]);
}

#[test]
fn store_only_touches_its_own_key() {
    let conn = open_db_in_memory().unwrap();
    let mut kv = SqliteKvStore::try_new(&conn).unwrap();
    kv.set_item("@settings", "{}").unwrap();

    let mut store = ObstacleStore::open(kv).unwrap();
    store.add(&ObstacleDraft::default()).unwrap();

    let kv = store.into_storage();
    assert_eq!(kv.get_item("@settings").unwrap().as_deref(), Some("{}"));
    assert!(kv.get_item(STORAGE_KEY).unwrap().is_some());
}
