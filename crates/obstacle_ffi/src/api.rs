//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose obstacle store operations to Dart via FRB.
//! - Map store errors to response envelopes the UI can show as-is.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Each call opens the database, runs exactly one store operation inside
//!   an immediate transaction, and commits before returning.
//! - Malformed stored data loads as an empty list instead of failing.
//! - Stored data that parsed but could not be loaded lists as empty and is
//!   never overwritten; mutations report an error instead.

use log::{info, warn};
use obstacle_core::db::open_db;
use obstacle_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, is_photo_uri,
    ping as ping_inner, Obstacle, ObstacleDraft, ObstacleStore, SqliteKvStore, StoreResult,
};
use rusqlite::{Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const DB_FILE_NAME: &str = "obstacles.sqlite3";
const DB_PATH_ENV: &str = "OBSTACLES_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and the error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One obstacle as shown by the list and photo screens.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Photo URIs in attachment order.
    pub photos: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<&Obstacle> for ObstacleItem {
    fn from(value: &Obstacle) -> Self {
        Self {
            id: value.id,
            title: value.title.clone(),
            description: value.description.clone(),
            photos: value.photos.clone(),
            latitude: value.location.map(|location| location.latitude),
            longitude: value.location.map(|location| location.longitude),
        }
    }
}

/// Response envelope shared by every obstacle call.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleResponse {
    /// Whether the operation was applied and saved.
    pub ok: bool,
    /// Full collection after the call; the stored list when `ok` is false.
    pub items: Vec<ObstacleItem>,
    /// Record the call targeted, when it still exists.
    pub obstacle: Option<ObstacleItem>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

struct Snapshot {
    items: Vec<ObstacleItem>,
    obstacle: Option<ObstacleItem>,
}

impl Snapshot {
    fn of(obstacles: &[Obstacle], target: Option<&Obstacle>) -> Self {
        Self {
            items: obstacles.iter().map(ObstacleItem::from).collect(),
            obstacle: target.map(ObstacleItem::from),
        }
    }
}

/// Lists stored obstacles in insertion order.
#[flutter_rust_bridge::frb(sync)]
pub fn obstacles_list() -> ObstacleResponse {
    list_at(&resolve_db_path())
}

/// Adds an obstacle. Empty title and description are accepted.
#[flutter_rust_bridge::frb(sync)]
pub fn obstacle_add(title: String, description: String) -> ObstacleResponse {
    add_at(&resolve_db_path(), title, description)
}

/// Replaces title and description of one obstacle. Unknown ids are a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn obstacle_edit(id: i64, title: String, description: String) -> ObstacleResponse {
    edit_at(&resolve_db_path(), id, title, description)
}

/// Removes one obstacle and its photo references. Unknown ids are a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn obstacle_remove(id: i64) -> ObstacleResponse {
    remove_at(&resolve_db_path(), id)
}

/// Appends a picker-resolved photo URI to one obstacle.
#[flutter_rust_bridge::frb(sync)]
pub fn obstacle_attach_photo(id: i64, uri: String) -> ObstacleResponse {
    attach_photo_at(&resolve_db_path(), id, uri)
}

/// Removes every occurrence of `uri` from one obstacle's photos.
#[flutter_rust_bridge::frb(sync)]
pub fn obstacle_detach_photo(id: i64, uri: String) -> ObstacleResponse {
    detach_photo_at(&resolve_db_path(), id, uri)
}

fn list_at(db_path: &Path) -> ObstacleResponse {
    respond(
        db_path,
        "obstacles_list",
        "Loaded.",
        with_store(db_path, |store| Ok(Snapshot::of(store.obstacles(), None))),
    )
}

fn add_at(db_path: &Path, title: String, description: String) -> ObstacleResponse {
    let draft = ObstacleDraft::new(title, description);
    respond(
        db_path,
        "obstacle_add",
        "Obstacle added.",
        with_store(db_path, |store| {
            let obstacles = store.add(&draft)?;
            Ok(Snapshot::of(obstacles, obstacles.last()))
        }),
    )
}

fn edit_at(db_path: &Path, id: i64, title: String, description: String) -> ObstacleResponse {
    let patch = ObstacleDraft::new(title, description);
    respond(
        db_path,
        "obstacle_edit",
        "Obstacle saved.",
        with_store(db_path, |store| {
            let obstacles = store.edit(id, &patch)?;
            let target = obstacles.iter().find(|obstacle| obstacle.id == id);
            Ok(Snapshot::of(obstacles, target))
        }),
    )
}

fn remove_at(db_path: &Path, id: i64) -> ObstacleResponse {
    respond(
        db_path,
        "obstacle_remove",
        "Obstacle removed.",
        with_store(db_path, |store| Ok(Snapshot::of(store.remove(id)?, None))),
    )
}

fn attach_photo_at(db_path: &Path, id: i64, uri: String) -> ObstacleResponse {
    if !is_photo_uri(&uri) {
        return respond(
            db_path,
            "photo_attach",
            "",
            Err("photo_attach failed: picker returned an invalid uri".to_string()),
        );
    }
    let result = with_store(db_path, |store| {
        let change = store.attach_photo(id, uri)?;
        Ok(Snapshot::of(change.obstacles, change.obstacle))
    });
    let message = photo_message(&result, "Photo added.");
    respond(db_path, "photo_attach", message, result)
}

fn detach_photo_at(db_path: &Path, id: i64, uri: String) -> ObstacleResponse {
    let result = with_store(db_path, |store| {
        let change = store.detach_photo(id, &uri)?;
        Ok(Snapshot::of(change.obstacles, change.obstacle))
    });
    let message = photo_message(&result, "Photo removed.");
    respond(db_path, "photo_detach", message, result)
}

fn photo_message(result: &Result<Snapshot, String>, applied: &'static str) -> &'static str {
    match result {
        Ok(Snapshot { obstacle: None, .. }) => "Obstacle not found; nothing changed.",
        _ => applied,
    }
}

fn respond(
    db_path: &Path,
    action: &str,
    ok_message: &str,
    result: Result<Snapshot, String>,
) -> ObstacleResponse {
    match result {
        Ok(snapshot) => {
            info!("event=ffi_call module=ffi status=ok action={action}");
            ObstacleResponse {
                ok: true,
                items: snapshot.items,
                obstacle: snapshot.obstacle,
                message: ok_message.to_string(),
            }
        }
        Err(message) => {
            warn!("event=ffi_call module=ffi status=error action={action}");
            // Show what is actually stored so the UI never displays unsaved data.
            let items = with_store(db_path, |store| Ok(Snapshot::of(store.obstacles(), None)))
                .map(|snapshot| snapshot.items)
                .unwrap_or_default();
            ObstacleResponse {
                ok: false,
                items,
                obstacle: None,
                message,
            }
        }
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn with_store<T>(
    db_path: &Path,
    f: impl FnOnce(&mut ObstacleStore<SqliteKvStore<'_>>) -> StoreResult<T>,
) -> Result<T, String> {
    let conn = open_db(db_path).map_err(|err| format!("obstacle DB open failed: {err}"))?;
    let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)
        .map_err(|err| format!("obstacle DB busy: {err}"))?;

    let value = {
        let kv = SqliteKvStore::try_new(&tx)
            .map_err(|err| format!("obstacle storage init failed: {err}"))?;
        let mut store = ObstacleStore::open_or_empty(kv);
        f(&mut store).map_err(|err| err.to_string())?
    };

    tx.commit()
        .map_err(|err| format!("changes may not be saved: {err}"))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::{
        add_at, attach_photo_at, core_version, detach_photo_at, edit_at, init_logging, list_at,
        obstacle_add, obstacles_list, ping, remove_at, resolve_db_path, DB_PATH_ENV,
    };
    use obstacle_core::db::open_db;
    use obstacle_core::STORAGE_KEY;
    use rusqlite::params;
    use std::path::{Path, PathBuf};

    fn temp_db() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("obstacles.sqlite3");
        (dir, path)
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_relative_log_dir() {
        let error = init_logging("info".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn crud_round_trip_through_envelopes() {
        let (_dir, path) = temp_db();

        let added = add_at(&path, "Pothole".to_string(), "Deep crack".to_string());
        assert!(added.ok, "{}", added.message);
        assert_eq!(added.obstacle.as_ref().map(|item| item.id), Some(1));

        let second = add_at(&path, String::new(), String::new());
        assert_eq!(second.items.len(), 2);

        let edited = edit_at(&path, 1, "Pothole".to_string(), "Filled".to_string());
        assert!(edited.ok);
        assert_eq!(edited.obstacle.unwrap().description, "Filled");

        let removed = remove_at(&path, 1);
        assert!(removed.ok);
        assert_eq!(list_at(&path).items.len(), 1);
        assert_eq!(list_at(&path).items[0].id, 2);
    }

    #[test]
    fn photo_calls_update_target_record() {
        let (_dir, path) = temp_db();
        add_at(&path, "Curb".to_string(), String::new());

        let attached = attach_photo_at(&path, 1, "file:///cache/a.jpg".to_string());
        assert!(attached.ok, "{}", attached.message);
        assert_eq!(attached.obstacle.unwrap().photos, vec!["file:///cache/a.jpg"]);

        let detached = detach_photo_at(&path, 1, "file:///cache/a.jpg".to_string());
        assert!(detached.obstacle.unwrap().photos.is_empty());
    }

    #[test]
    fn invalid_photo_uri_is_rejected_with_current_list() {
        let (_dir, path) = temp_db();
        add_at(&path, "Curb".to_string(), String::new());

        let response = attach_photo_at(&path, 1, "not a uri".to_string());
        assert!(!response.ok);
        assert_eq!(response.items.len(), 1);
        assert!(response.items[0].photos.is_empty());
    }

    #[test]
    fn unreadable_payload_lists_as_empty_and_is_overwritten() {
        let (_dir, path) = temp_db();
        seed_payload(&path, "{broken");

        let listed = list_at(&path);
        assert!(listed.ok);
        assert!(listed.items.is_empty());

        let added = add_at(&path, "Fresh".to_string(), String::new());
        assert_eq!(added.obstacle.map(|item| item.id), Some(1));
        assert_eq!(list_at(&path).items.len(), 1);
    }

    fn seed_payload(path: &Path, payload: &str) {
        let conn = open_db(path).expect("open db");
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2);",
            params![STORAGE_KEY, payload],
        )
        .expect("seed payload");
    }

    #[test]
    fn photo_calls_on_unknown_id_report_nothing_changed() {
        let (_dir, path) = temp_db();
        add_at(&path, "Curb".to_string(), String::new());

        let attached = attach_photo_at(&path, 42, "file:///cache/a.jpg".to_string());
        assert!(attached.ok);
        assert!(attached.obstacle.is_none());
        assert_eq!(attached.message, "Obstacle not found; nothing changed.");
        assert!(attached.items[0].photos.is_empty());

        let detached = detach_photo_at(&path, 42, "file:///cache/a.jpg".to_string());
        assert!(detached.ok);
        assert_eq!(detached.message, "Obstacle not found; nothing changed.");
    }

    #[test]
    fn payload_with_repeated_ids_is_never_overwritten() {
        let (_dir, path) = temp_db();
        let payload = r#"[{"id":1,"title":"keep me","description":"","photos":["file:///a.jpg"]},{"id":1,"title":"twin","description":""}]"#;
        seed_payload(&path, payload);

        let added = add_at(&path, "new".to_string(), String::new());
        assert!(!added.ok);
        assert!(added.message.contains("changes may not be saved"));

        let conn = open_db(&path).expect("open db");
        let stored: String = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1;",
                params![STORAGE_KEY],
                |row| row.get(0),
            )
            .expect("stored payload");
        assert_eq!(stored, payload);
    }

    #[test]
    fn public_calls_use_configured_db_path() {
        let (_dir, path) = temp_db();
        // Only this test reads the process-wide path, so it is still unset here.
        std::env::set_var(DB_PATH_ENV, &path);
        assert_eq!(resolve_db_path(), path);

        let added = obstacle_add("env path".to_string(), String::new());
        assert!(added.ok, "{}", added.message);
        assert_eq!(added.obstacle.map(|item| item.id), Some(1));
        assert_eq!(obstacles_list().items.len(), 1);
        assert_eq!(list_at(&path).items.len(), 1);
    }
}
