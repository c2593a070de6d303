//! Family tracker server: SQLite persistence, JSON HTTP API, and CLI.
//!
//! # Architecture
//!
//! - **db**: [`SqliteStore`], a diesel-backed `TrackerStore`
//! - **api**: axum router exposing actions and tracker views
//! - **config**: [`ServerConfig`] from TOML, `.env`, and flags
//! - **cli**: clap command definitions for the `family_tracker` binary

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod db;

pub use config::{ConfigError, DB_ENV_VAR, ServerConfig};
pub use db::{DbError, MIGRATIONS, SqliteStore};
