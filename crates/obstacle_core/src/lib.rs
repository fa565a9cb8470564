//! Core domain logic for the obstacle log.
//! This crate is the single source of truth for obstacle invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::obstacle::{
    CollectionValidationError, Location, Obstacle, ObstacleDraft, ObstacleId,
    ObstacleValidationError,
};
pub use repo::kv_repo::{KeyValueStore, MemoryKvStore, RepoError, RepoResult, SqliteKvStore};
pub use service::attachment::{
    is_photo_uri, AttachmentResolver, PhotoSource, ResolvedPhoto, ResolverError,
};
pub use service::obstacle_flow::{FlowError, FlowResult, FlowState, ObstacleFlow, PhotoOutcome};
pub use service::obstacle_store::{
    IdAssignment, ObstacleStore, PhotoChange, StoreError, StoreOptions, StoreResult, STORAGE_KEY,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
