//! Shared data model and restart-safe snapshot format for Parley.

pub mod message;
pub mod snapshot;
pub mod task;
