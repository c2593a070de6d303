//! Command-line interface for family_tracker.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use family_tracker::{Mode, PointDirection, RotationInterval};

/// Family Tracker - whose turn, who's ahead, who got picked
#[derive(Parser, Debug)]
#[command(name = "family_tracker")]
#[command(about = "Track turns, points, and random picks for a household", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides config file and FAMILY_TRACKER_DB)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Login name recorded in history (defaults to guest)
    #[arg(long, global = true)]
    pub actor: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Keep trackers in memory instead of SQLite
        #[arg(long)]
        memory: bool,
    },

    /// Create or edit a tracker
    Configure {
        /// Tracker id
        id: i64,

        /// Display name
        #[arg(long)]
        title: String,

        /// Tracker mode
        #[arg(long)]
        mode: Mode,

        /// Rotation interval (rotation mode only)
        #[arg(long)]
        interval: Option<RotationInterval>,

        /// Comma-separated participants in turn order
        #[arg(long, default_value = "")]
        participants: String,
    },

    /// Pass the turn to the next participant
    Advance {
        /// Tracker id
        id: i64,
    },

    /// Add or subtract a point
    Points {
        /// Tracker id
        id: i64,

        /// Participant name (exact)
        participant: String,

        /// add or subtract
        direction: PointDirection,
    },

    /// Pick a participant at random
    Pick {
        /// Tracker id
        id: i64,
    },

    /// Jump the turn to a participant
    OverrideTurn {
        /// Tracker id
        id: i64,

        /// Participant name (any case)
        participant: String,

        /// Why the turn was changed
        #[arg(long)]
        reason: Option<String>,
    },

    /// Set a participant's score
    OverridePoints {
        /// Tracker id
        id: i64,

        /// Participant name (exact)
        participant: String,

        /// New score
        #[arg(allow_negative_numbers = true)]
        score: i64,

        /// Why the score was changed
        #[arg(long)]
        reason: Option<String>,
    },

    /// Record a winner without drawing
    OverrideRandom {
        /// Tracker id
        id: i64,

        /// Winner name
        winner: String,

        /// Why the pick was overridden
        #[arg(long)]
        reason: Option<String>,
    },

    /// Show one tracker with its history
    Show {
        /// Tracker id
        id: i64,
    },

    /// List all trackers
    List,
}
