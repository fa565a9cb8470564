//! Obstacle collection store.
//!
//! # Responsibility
//! - Own the authoritative in-memory obstacle collection.
//! - Mirror every mutation to durable storage under one fixed key.
//!
//! # Invariants
//! - Every mutation performs exactly one durable write of the whole
//!   collection, including mutations that change nothing.
//! - The in-memory collection is replaced only after the durable write
//!   succeeds, so memory never runs ahead of storage.
//! - Ids stay unique: `add` refuses to create a colliding id.
//! - A persisted value that parsed but could not be loaded is never
//!   overwritten by a store that fell back to empty.

use crate::model::obstacle::{
    validate_collection, CollectionValidationError, Obstacle, ObstacleDraft, ObstacleId,
};
use crate::repo::kv_repo::{KeyValueStore, RepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Durable key holding the JSON-serialized obstacle collection.
pub const STORAGE_KEY: &str = "@obstacles";

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation errors.
#[derive(Debug)]
pub enum StoreError {
    /// Durable value could not be read.
    Read(RepoError),
    /// Durable value exists but is not a valid obstacle collection.
    InvalidData(String),
    /// Durable value holds two records with the same id.
    DuplicateId(ObstacleId),
    /// Store fell back to empty over a value it could not load; writing
    /// would destroy that value.
    Locked,
    /// Collection could not be serialized.
    Encode(serde_json::Error),
    /// Durable write failed; the in-memory collection was left unchanged.
    Write(RepoError),
    /// The id rule produced an id that already exists.
    IdCollision(ObstacleId),
    /// The id rule overflowed `i64`.
    IdExhausted,
}

impl StoreError {
    /// Stable short code used in log lines and FFI messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read(_) => "storage_read_failed",
            Self::InvalidData(_) => "storage_invalid_data",
            Self::DuplicateId(_) => "storage_duplicate_id",
            Self::Locked => "storage_locked",
            Self::Encode(_) => "encode_failed",
            Self::Write(_) => "storage_write_failed",
            Self::IdCollision(_) => "id_collision",
            Self::IdExhausted => "id_exhausted",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "failed to read obstacles: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted obstacles: {message}"),
            Self::DuplicateId(id) => write!(f, "persisted obstacles repeat id {id}"),
            Self::Locked => write!(
                f,
                "changes may not be saved: stored obstacles could not be loaded"
            ),
            Self::Encode(err) => write!(f, "failed to encode obstacles: {err}"),
            Self::Write(err) => write!(f, "changes may not be saved: {err}"),
            Self::IdCollision(id) => write!(f, "obstacle id {id} is already in use"),
            Self::IdExhausted => write!(f, "no obstacle id left to assign"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) | Self::Write(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::InvalidData(_)
            | Self::DuplicateId(_)
            | Self::Locked
            | Self::IdCollision(_)
            | Self::IdExhausted => None,
        }
    }
}

/// Rule used by `add` to pick the next id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdAssignment {
    /// Last element's id + 1. Matches ids written by earlier app versions.
    #[default]
    LastPlusOne,
    /// Largest id in the collection + 1.
    MaxPlusOne,
}

/// Store construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub id_assignment: IdAssignment,
}

/// Result of a photo attach/detach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoChange<'a> {
    /// Full collection after the change.
    pub obstacles: &'a [Obstacle],
    /// Target record after the change; `None` when the id is unknown.
    pub obstacle: Option<&'a Obstacle>,
}

/// Obstacle collection backed by durable key-value storage.
pub struct ObstacleStore<S: KeyValueStore> {
    storage: S,
    obstacles: Vec<Obstacle>,
    options: StoreOptions,
    locked: bool,
}

impl<S: KeyValueStore> ObstacleStore<S> {
    /// Creates an empty, not yet loaded store.
    pub fn new(storage: S) -> Self {
        Self::with_options(storage, StoreOptions::default())
    }

    pub fn with_options(storage: S, options: StoreOptions) -> Self {
        Self {
            storage,
            obstacles: Vec::new(),
            options,
            locked: false,
        }
    }

    /// Creates a store and loads the persisted collection.
    pub fn open(storage: S) -> StoreResult<Self> {
        Self::open_with_options(storage, StoreOptions::default())
    }

    pub fn open_with_options(storage: S, options: StoreOptions) -> StoreResult<Self> {
        let mut store = Self::with_options(storage, options);
        store.load()?;
        Ok(store)
    }

    /// Creates a store, falling back to an empty collection when the
    /// persisted value cannot be loaded.
    ///
    /// Malformed JSON stays in storage until the next mutation overwrites
    /// it. Any other load failure (unreadable storage, repeated ids) leaves
    /// the store locked: mutations fail with [`StoreError::Locked`] until a
    /// later `load` succeeds.
    pub fn open_or_empty(storage: S) -> Self {
        Self::open_or_empty_with_options(storage, StoreOptions::default())
    }

    pub fn open_or_empty_with_options(storage: S, options: StoreOptions) -> Self {
        let mut store = Self::with_options(storage, options);
        if let Err(err) = store.load() {
            store.locked = !matches!(err, StoreError::InvalidData(_));
            warn!(
                "event=obstacles_load module=store status=fallback error_code={} locked={} error={}",
                err.code(),
                store.locked,
                err
            );
        }
        store
    }

    /// Replaces the in-memory collection with the persisted one.
    ///
    /// An absent key loads as an empty collection. On error the in-memory
    /// collection is left as it was.
    pub fn load(&mut self) -> StoreResult<&[Obstacle]> {
        let loaded = self.read_persisted()?;
        info!(
            "event=obstacles_load module=store status=ok count={}",
            loaded.len()
        );
        self.obstacles = loaded;
        self.locked = false;
        Ok(&self.obstacles)
    }

    /// Reads and parses the persisted collection without touching memory.
    ///
    /// A record whose location is out of range loads without its location;
    /// the rest of the record and the collection are kept.
    pub fn read_persisted(&self) -> StoreResult<Vec<Obstacle>> {
        let raw = self.storage.get_item(STORAGE_KEY).map_err(StoreError::Read)?;
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        let mut obstacles: Vec<Obstacle> = serde_json::from_str(&raw)
            .map_err(|err| StoreError::InvalidData(format!("malformed json: {err}")))?;
        for obstacle in &mut obstacles {
            if let Err(err) = obstacle.validate() {
                warn!(
                    "event=obstacles_load module=store status=location_dropped id={} error={}",
                    obstacle.id, err
                );
                obstacle.location = None;
            }
        }
        validate_collection(&obstacles).map_err(|err| match err {
            CollectionValidationError::DuplicateId(id) => StoreError::DuplicateId(id),
            CollectionValidationError::Record(err) => StoreError::InvalidData(err.to_string()),
        })?;
        Ok(obstacles)
    }

    /// Appends a new obstacle built from `draft`.
    ///
    /// Empty titles and descriptions are accepted; titles are not required
    /// to be unique.
    pub fn add(&mut self, draft: &ObstacleDraft) -> StoreResult<&[Obstacle]> {
        let id = match self.next_id() {
            Ok(id) => id,
            Err(err) => {
                error!(
                    "event=obstacle_add module=store status=error error_code={} count={}",
                    err.code(),
                    self.obstacles.len()
                );
                return Err(err);
            }
        };

        let mut next = self.obstacles.clone();
        next.push(Obstacle::from_draft(id, draft));
        self.persist(next, "obstacle_add", id)?;
        Ok(&self.obstacles)
    }

    /// Replaces title and description of the record with `id`.
    ///
    /// Photos and location are untouched. An unknown id changes nothing and
    /// is not an error.
    pub fn edit(&mut self, id: ObstacleId, patch: &ObstacleDraft) -> StoreResult<&[Obstacle]> {
        let mut next = self.obstacles.clone();
        if let Some(target) = next.iter_mut().find(|obstacle| obstacle.id == id) {
            target.apply_draft(patch);
        }
        self.persist(next, "obstacle_edit", id)?;
        Ok(&self.obstacles)
    }

    /// Removes the record with `id`, if any.
    pub fn remove(&mut self, id: ObstacleId) -> StoreResult<&[Obstacle]> {
        let mut next = self.obstacles.clone();
        next.retain(|obstacle| obstacle.id != id);
        self.persist(next, "obstacle_remove", id)?;
        Ok(&self.obstacles)
    }

    /// Appends `uri` to the photos of the record with `id`.
    ///
    /// Duplicate URIs are kept.
    pub fn attach_photo(
        &mut self,
        id: ObstacleId,
        uri: impl Into<String>,
    ) -> StoreResult<PhotoChange<'_>> {
        let uri = uri.into();
        let mut next = self.obstacles.clone();
        if let Some(target) = next.iter_mut().find(|obstacle| obstacle.id == id) {
            target.photos.push(uri);
        }
        self.persist(next, "photo_attach", id)?;
        Ok(self.photo_change(id))
    }

    /// Removes every occurrence of `uri` from the photos of the record with
    /// `id`.
    pub fn detach_photo(&mut self, id: ObstacleId, uri: &str) -> StoreResult<PhotoChange<'_>> {
        let mut next = self.obstacles.clone();
        if let Some(target) = next.iter_mut().find(|obstacle| obstacle.id == id) {
            target.photos.retain(|photo| photo != uri);
        }
        self.persist(next, "photo_detach", id)?;
        Ok(self.photo_change(id))
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn get(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.obstacles.iter().find(|obstacle| obstacle.id == id)
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Whether mutations are refused to protect a value that failed to load.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn next_id(&self) -> StoreResult<ObstacleId> {
        let base = match self.options.id_assignment {
            IdAssignment::LastPlusOne => self.obstacles.last().map(|obstacle| obstacle.id),
            IdAssignment::MaxPlusOne => self.obstacles.iter().map(|obstacle| obstacle.id).max(),
        };
        let candidate = match base {
            None => 1,
            Some(id) => id.checked_add(1).ok_or(StoreError::IdExhausted)?,
        };
        if self.get(candidate).is_some() {
            return Err(StoreError::IdCollision(candidate));
        }
        Ok(candidate)
    }

    fn photo_change(&self, id: ObstacleId) -> PhotoChange<'_> {
        PhotoChange {
            obstacles: &self.obstacles,
            obstacle: self.get(id),
        }
    }

    fn persist(&mut self, next: Vec<Obstacle>, event: &str, id: ObstacleId) -> StoreResult<()> {
        if self.locked {
            let err = StoreError::Locked;
            error!(
                "event={} module=store status=error id={} error_code={}",
                event,
                id,
                err.code()
            );
            return Err(err);
        }
        let payload = serde_json::to_string(&next).map_err(StoreError::Encode)?;
        if let Err(err) = self.storage.set_item(STORAGE_KEY, &payload) {
            let err = StoreError::Write(err);
            error!(
                "event={} module=store status=error id={} error_code={} error={}",
                event,
                id,
                err.code(),
                err
            );
            return Err(err);
        }

        info!(
            "event={} module=store status=ok id={} count={} bytes={}",
            event,
            id,
            next.len(),
            payload.len()
        );
        self.obstacles = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{IdAssignment, ObstacleStore, StoreError, StoreOptions, STORAGE_KEY};
    use crate::model::obstacle::ObstacleDraft;
    use crate::repo::kv_repo::MemoryKvStore;

    fn seeded(json: &str, options: StoreOptions) -> ObstacleStore<MemoryKvStore> {
        ObstacleStore::open_with_options(MemoryKvStore::with_item(STORAGE_KEY, json), options)
            .expect("seed should load")
    }

    #[test]
    fn last_plus_one_follows_array_order_not_max() {
        let mut store = seeded(
            r#"[{"id":5,"title":"","description":""},{"id":2,"title":"","description":""}]"#,
            StoreOptions::default(),
        );
        let items = store.add(&ObstacleDraft::default()).unwrap();
        assert_eq!(items.last().map(|o| o.id), Some(3));
    }

    #[test]
    fn max_plus_one_uses_largest_id() {
        let mut store = seeded(
            r#"[{"id":5,"title":"","description":""},{"id":2,"title":"","description":""}]"#,
            StoreOptions {
                id_assignment: IdAssignment::MaxPlusOne,
            },
        );
        let items = store.add(&ObstacleDraft::default()).unwrap();
        assert_eq!(items.last().map(|o| o.id), Some(6));
    }

    #[test]
    fn colliding_id_is_rejected_without_write() {
        let json = r#"[{"id":3,"title":"","description":""},{"id":2,"title":"","description":""}]"#;
        let mut store = seeded(json, StoreOptions::default());
        let err = store.add(&ObstacleDraft::default()).unwrap_err();
        assert!(matches!(err, StoreError::IdCollision(3)));
        assert_eq!(store.len(), 2);
        assert_eq!(store.read_persisted().unwrap(), store.obstacles());
    }

    #[test]
    fn id_overflow_is_reported() {
        let json = format!(r#"[{{"id":{},"title":"","description":""}}]"#, i64::MAX);
        let mut store = seeded(&json, StoreOptions::default());
        assert!(matches!(
            store.add(&ObstacleDraft::default()),
            Err(StoreError::IdExhausted)
        ));
    }
}
