//! Debugify library crate
//!
//! Exposes the assist pipeline, response interpretation, and workspace state
//! so the server binary and tests can exercise them without going through
//! process startup.

pub mod assist;
pub mod config;
pub mod extract;
pub mod runner;
pub mod server;
pub mod store;
pub mod workspace;
