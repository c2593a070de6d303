//! SQLite-backed tracker store.

use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use family_tracker::{
    HistoryEntry, HistoryLog, StoreError, StoredState, TrackerConfig, TrackerId, TrackerState,
    TrackerStore, ensure_append_only,
};
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, HistoryRow, NewHistoryRow, NewTrackerRow, StateRow, TrackerRow, schema};

/// Migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure inside a write transaction: either a store verdict or a database error.
#[derive(Debug, derive_more::From)]
enum TxError {
    Store(StoreError),
    Db(DbError),
}

impl From<diesel::result::Error> for TxError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::Db(DbError::from(err))
    }
}

impl From<TxError> for StoreError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Store(e) => e,
            TxError::Db(e) => e.into(),
        }
    }
}

/// [`TrackerStore`] persisted in a SQLite file.
///
/// A fresh connection is opened per call, so every handle to the same path
/// (in this process or another) sees the same data. `":memory:"` would give
/// each call an empty database and is not supported.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: String,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Creates a store for the database at `db_path` without touching it.
    #[instrument(skip(db_path), fields(db_path = %db_path.as_ref()))]
    pub fn new(db_path: impl AsRef<str>) -> Self {
        info!("Creating SqliteStore");
        Self {
            db_path: db_path.as_ref().to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Opens the database at `db_path`, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be opened or migrated.
    pub fn open(db_path: impl AsRef<str>) -> Result<Self, DbError> {
        let store = Self::new(db_path);
        store.run_migrations()?;
        Ok(store)
    }

    /// Sets how long SQLite waits on a locked database before failing.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Path of the database file.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Applies any migrations not yet run.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self), fields(db_path = %self.db_path))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migrations failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))?;
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            self.busy_timeout.as_millis()
        ))?;
        Ok(conn)
    }
}

#[track_caller]
fn to_i64(value: u64, what: &str) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|_| DbError::new(format!("{} {} out of range", what, value)))
}

#[track_caller]
fn to_u64(value: i64, what: &str) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|_| DbError::new(format!("{} {} out of range", what, value)))
}

fn stored_version(conn: &mut SqliteConnection, id: TrackerId) -> Result<Option<i64>, DbError> {
    use schema::tracker_states::dsl;
    Ok(dsl::tracker_states
        .find(id.get())
        .select(dsl::version)
        .first::<i64>(conn)
        .optional()?)
}

fn history_count(conn: &mut SqliteConnection, id: TrackerId) -> Result<usize, DbError> {
    use schema::history_entries::dsl;
    let count: i64 = dsl::history_entries
        .filter(dsl::tracker_id.eq(id.get()))
        .count()
        .get_result(conn)?;
    usize::try_from(count).map_err(|_| DbError::new("negative history count"))
}

fn append_history(
    conn: &mut SqliteConnection,
    id: TrackerId,
    first_seq: usize,
    entries: &[HistoryEntry],
) -> Result<(), DbError> {
    if entries.is_empty() {
        return Ok(());
    }
    let rows = entries
        .iter()
        .enumerate()
        .map(|(offset, entry)| {
            let seq = to_i64((first_seq + offset) as u64, "history seq")?;
            Ok(NewHistoryRow::from_entry(id, seq, entry))
        })
        .collect::<Result<Vec<_>, DbError>>()?;
    diesel::insert_into(schema::history_entries::table)
        .values(&rows)
        .execute(conn)?;
    debug!(appended = rows.len(), "History appended");
    Ok(())
}

/// Writes turn index, points, and the next version, guarded by `current`.
fn write_state(
    conn: &mut SqliteConnection,
    id: TrackerId,
    state: &TrackerState,
    current: i64,
) -> Result<i64, TxError> {
    use schema::tracker_states::dsl;
    let next = current + 1;
    let updated = diesel::update(
        dsl::tracker_states
            .find(id.get())
            .filter(dsl::version.eq(current)),
    )
    .set((
        dsl::current_turn_index.eq(to_i64(*state.current_turn_index() as u64, "turn index")?),
        dsl::points.eq(serde_json::to_string(state.points()).map_err(DbError::from)?),
        dsl::version.eq(next),
    ))
    .execute(conn)?;

    if updated == 0 {
        return Err(StoreError::VersionConflict {
            tracker_id: id,
            expected: Some(to_u64(current, "version")?),
        }
        .into());
    }
    Ok(next)
}

impl TrackerStore for SqliteStore {
    #[instrument(skip(self))]
    fn get_tracker(&self, id: TrackerId) -> Result<Option<TrackerConfig>, StoreError> {
        let mut conn = self.connection()?;
        let row = schema::trackers::table
            .find(id.get())
            .select(TrackerRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(DbError::from)?;

        let Some(row) = row else {
            debug!("Tracker not found");
            return Ok(None);
        };
        let (_, config) = row.into_config()?;
        Ok(Some(config))
    }

    #[instrument(skip(self))]
    fn get_state(&self, id: TrackerId) -> Result<Option<StoredState>, StoreError> {
        let mut conn = self.connection()?;
        // State row and history are read from one snapshot.
        let rows = conn.transaction::<_, DbError, _>(|conn| {
            let Some(row): Option<StateRow> = schema::tracker_states::table
                .find(id.get())
                .select(StateRow::as_select())
                .first(conn)
                .optional()?
            else {
                return Ok(None);
            };
            let history: Vec<HistoryRow> = schema::history_entries::table
                .filter(schema::history_entries::tracker_id.eq(id.get()))
                .order(schema::history_entries::seq.asc())
                .select(HistoryRow::as_select())
                .load(conn)?;
            Ok(Some((row, history)))
        })?;
        let Some((row, history)) = rows else {
            return Ok(None);
        };

        let history = history
            .into_iter()
            .map(HistoryRow::into_entry)
            .collect::<Result<Vec<_>, _>>()?;
        let index = usize::try_from(*row.current_turn_index())
            .map_err(|_| DbError::new("negative turn index"))?;
        let state = TrackerState::new(index, row.points_table()?, HistoryLog::from_entries(history));
        let version = to_u64(*row.version(), "version")?;
        debug!(version, history = state.history().len(), "State loaded");
        Ok(Some(StoredState::new(state, version)))
    }

    #[instrument(skip(self, state), fields(history = state.history().len()))]
    fn put_state(
        &self,
        id: TrackerId,
        state: &TrackerState,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut conn = self.connection()?;
        let version = conn.immediate_transaction::<_, TxError, _>(|conn| {
            let current =
                stored_version(conn, id)?.ok_or(StoreError::TrackerNotFound { tracker_id: id })?;
            if current != to_i64(expected_version, "version")? {
                warn!(stored = current, expected_version, "Stale state write");
                return Err(StoreError::VersionConflict {
                    tracker_id: id,
                    expected: Some(expected_version),
                }
                .into());
            }

            let stored = history_count(conn, id)?;
            ensure_append_only(id, stored, state.history().len())?;
            let next = write_state(conn, id, state, current)?;
            append_history(conn, id, stored, state.history().since(stored))?;
            Ok(next)
        })?;

        let version = to_u64(version, "version")?;
        info!(version, "State committed");
        Ok(version)
    }

    #[instrument(skip(self, config, state), fields(title = %config.title()))]
    fn save_tracker(
        &self,
        id: TrackerId,
        config: &TrackerConfig,
        state: &TrackerState,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let row = NewTrackerRow::from_config(id, config)?;
        let mut conn = self.connection()?;

        let expected = expected_version
            .map(|v| to_i64(v, "version"))
            .transpose()?;

        let version = conn.immediate_transaction::<_, TxError, _>(|conn| {
            match (stored_version(conn, id)?, expected) {
                (None, None) => {
                    diesel::insert_into(schema::trackers::table)
                        .values(&row)
                        .execute(conn)?;
                    let state_row = StateRow::new(
                        id.get(),
                        to_i64(*state.current_turn_index() as u64, "turn index")?,
                        serde_json::to_string(state.points()).map_err(DbError::from)?,
                        1,
                    );
                    diesel::insert_into(schema::tracker_states::table)
                        .values(&state_row)
                        .execute(conn)?;
                    append_history(conn, id, 0, state.history().entries())?;
                    Ok(1)
                }
                (None, Some(_)) => Err(StoreError::TrackerNotFound { tracker_id: id }.into()),
                (Some(current), Some(expected)) if current == expected => {
                    use schema::trackers::dsl;
                    let stored = history_count(conn, id)?;
                    ensure_append_only(id, stored, state.history().len())?;

                    diesel::update(dsl::trackers.find(id.get()))
                        .set((
                            dsl::title.eq(row.title()),
                            dsl::mode.eq(row.mode()),
                            dsl::rotation_interval.eq(row.rotation_interval()),
                            dsl::participants.eq(row.participants()),
                            dsl::updated_at.eq(chrono::Utc::now().naive_utc()),
                        ))
                        .execute(conn)?;
                    let next = write_state(conn, id, state, current)?;
                    append_history(conn, id, stored, state.history().since(stored))?;
                    Ok(next)
                }
                (Some(_), _) => {
                    warn!(?expected_version, "Stale tracker save");
                    Err(StoreError::VersionConflict {
                        tracker_id: id,
                        expected: expected_version,
                    }
                    .into())
                }
            }
        })?;

        let version = to_u64(version, "version")?;
        info!(version, created = expected_version.is_none(), "Tracker saved");
        Ok(version)
    }

    #[instrument(skip(self))]
    fn list_trackers(&self) -> Result<Vec<(TrackerId, TrackerConfig)>, StoreError> {
        let mut conn = self.connection()?;
        let rows = schema::trackers::table
            .order(schema::trackers::id.asc())
            .select(TrackerRow::as_select())
            .load(&mut conn)
            .map_err(DbError::from)?;
        debug!(count = rows.len(), "Trackers loaded");
        Ok(rows
            .into_iter()
            .map(TrackerRow::into_config)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
