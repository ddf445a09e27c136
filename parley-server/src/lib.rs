//! Parley server library.
//!
//! Stores a chat transcript and a set of task records for authorized
//! callers and relays chat content to a text generation backend. Exposed as
//! a library for tests and embedding; the `parley-server` binary wires it to
//! configuration, logging and an HTTP listener.

pub mod auth;
pub mod clock;
pub mod completion;
pub mod config;
pub mod error;
pub mod http;
pub mod persist;
pub mod service;
pub mod store;
pub mod tasks;
