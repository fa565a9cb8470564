//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the durable key-value contract the obstacle store writes through.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs report transport failures; they never interpret the
//!   stored values.

pub mod kv_repo;
