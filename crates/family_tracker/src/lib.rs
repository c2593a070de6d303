//! Family tracker core: rotation, manual, points, and random trackers.
//!
//! A tracker is a configured [`TrackerConfig`] paired with runtime
//! [`TrackerState`]. Every change goes through the [`Dispatcher`], which
//! loads both from a [`TrackerStore`], applies an [`Action`], and commits the
//! new state together with one [`HistoryEntry`].
//!
//! # Architecture
//!
//! - **Model**: tracker configuration, state, and the append-only history log
//! - **Engines**: turn, points, and random-pick transitions
//! - **Dispatch**: mode routing, per-tracker serialization, versioned writes
//! - **Store**: the persistence trait plus an in-memory implementation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use family_tracker::{
//!     Action, ActionOutcome, Actor, Dispatcher, MemoryStore, Mode, Participants,
//!     TrackerConfig, TrackerId,
//! };
//!
//! # fn main() -> Result<(), family_tracker::ActionError> {
//! let dispatcher = Dispatcher::new(Arc::new(MemoryStore::new()));
//! let id = TrackerId::new(1)?;
//! let config = TrackerConfig::new(
//!     "Dishes".to_string(),
//!     Mode::Manual,
//!     None,
//!     Participants::parse("Jacey, Simon")?,
//! );
//! dispatcher.configure(id, config)?;
//!
//! let outcome = dispatcher.dispatch(id, &Action::AdvanceTurn, &Actor::guest())?;
//! assert_eq!(
//!     outcome,
//!     ActionOutcome::Turn { new_participant_name: "Simon".to_string() }
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod dispatcher;
mod error;
mod history;
mod memory;
pub mod points;
pub mod random;
mod state;
mod store;
mod tracker;
pub mod turn;
mod view;

pub use action::{Action, ActionOutcome, ActionRequest, Effect, PointDirection};
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use error::{ActionError, BackendError, ErrorKind, StoreError};
pub use history::{ActionKind, Actor, HistoryEntry, HistoryLog};
pub use memory::MemoryStore;
pub use state::{PointsTable, TrackerState};
pub use store::{StoredState, TrackerStore, ensure_append_only};
pub use tracker::{Mode, Participants, RotationInterval, TrackerConfig, TrackerId};
pub use view::{ScoreLine, TrackerView};
