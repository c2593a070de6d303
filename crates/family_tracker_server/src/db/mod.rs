//! SQLite persistence for tracker configuration, state, and history.

mod error;
mod models;
mod schema;
mod store;

pub use error::DbError;
pub use models::{HistoryRow, NewHistoryRow, NewTrackerRow, StateRow, TrackerRow};
pub use store::{MIGRATIONS, SqliteStore};
