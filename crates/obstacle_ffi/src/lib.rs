//! Flutter bridge for the obstacle core.

pub mod api;
