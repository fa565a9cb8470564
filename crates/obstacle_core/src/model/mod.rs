//! Domain model for obstacle records.
//!
//! # Responsibility
//! - Define the canonical obstacle record and its durable JSON shape.
//! - Keep validation rules next to the data they guard.
//!
//! # Invariants
//! - Every record is identified by an integer `ObstacleId` unique in its
//!   collection.

pub mod obstacle;
