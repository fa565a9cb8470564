//! Core use-case services.
//!
//! # Responsibility
//! - Keep the obstacle collection and its durable copy in lockstep.
//! - Drive add/edit/photo dialogs without leaking storage details to the UI.

pub mod attachment;
pub mod obstacle_flow;
pub mod obstacle_store;
