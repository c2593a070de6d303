//! Family Tracker - Unified CLI
//!
//! Runs the HTTP API or applies a single action against the configured store.

#![warn(missing_docs)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use family_tracker::{
    Action, ActionOutcome, Actor, Dispatcher, MemoryStore, Participants, TrackerConfig,
    TrackerId, TrackerStore, TrackerView,
};
use family_tracker_server::cli::{Cli, Command};
use family_tracker_server::{ServerConfig, SqliteStore, api};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config = config.with_database_path(db);
    }
    let actor = Actor::from_optional(cli.actor.as_deref());

    match cli.command {
        Command::Serve { host, port, memory } => {
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            run_server(config, memory).await
        }
        command => tokio::task::spawn_blocking(move || run_command(&config, &actor, command))
            .await?,
    }
}

/// Opens the configured store and wraps it in a dispatcher.
#[instrument(skip(config), fields(db = %config.database_path()))]
fn open_dispatcher(config: &ServerConfig, memory: bool) -> Result<Dispatcher> {
    let store: Arc<dyn TrackerStore> = if memory {
        Arc::new(MemoryStore::new())
    } else {
        let store =
            SqliteStore::new(config.database_path()).with_busy_timeout(config.busy_timeout());
        store.run_migrations()?;
        Arc::new(store)
    };
    Ok(Dispatcher::with_settings(store, config.dispatch_settings()))
}

/// Run the HTTP API server
async fn run_server(config: ServerConfig, memory: bool) -> Result<()> {
    let dispatcher = open_dispatcher(&config, memory)?;
    info!(host = %config.host(), port = config.port(), memory, "Starting family tracker API");
    api::serve(dispatcher, config.host(), *config.port()).await?;
    Ok(())
}

/// Run a one-shot command against the store
fn run_command(config: &ServerConfig, actor: &Actor, command: Command) -> Result<()> {
    let dispatcher = open_dispatcher(config, false)?;

    let (id, action) = match command {
        Command::Serve { .. } => anyhow::bail!("serve runs on the async runtime"),
        Command::List => {
            for view in dispatcher.list()? {
                println!("{}", summary_line(&view));
            }
            return Ok(());
        }
        Command::Show { id } => {
            print_view(&dispatcher.view(TrackerId::new(id)?)?);
            return Ok(());
        }
        Command::Configure {
            id,
            title,
            mode,
            interval,
            participants,
        } => {
            let roster = Participants::parse(&participants)?;
            let config = TrackerConfig::new(title, mode, interval, roster);
            let view = dispatcher.configure(TrackerId::new(id)?, config)?;
            println!("Saved {}", summary_line(&view));
            return Ok(());
        }
        Command::Advance { id } => (id, Action::AdvanceTurn),
        Command::Points {
            id,
            participant,
            direction,
        } => (
            id,
            Action::UpdatePoints {
                participant,
                direction,
            },
        ),
        Command::Pick { id } => (id, Action::RandomPick),
        Command::OverrideTurn {
            id,
            participant,
            reason,
        } => (id, Action::OverrideTurn { participant, reason }),
        Command::OverridePoints {
            id,
            participant,
            score,
            reason,
        } => (
            id,
            Action::OverridePoints {
                participant,
                new_score: score,
                reason,
            },
        ),
        Command::OverrideRandom { id, winner, reason } => {
            (id, Action::OverrideRandom { winner, reason })
        }
    };

    let outcome = dispatcher.dispatch(TrackerId::new(id)?, &action, actor)?;
    match outcome {
        ActionOutcome::Turn {
            new_participant_name,
        } => println!("It's {}'s turn", new_participant_name),
        ActionOutcome::Points {
            participant,
            new_score,
        } => println!("{}: {}", participant, new_score),
        ActionOutcome::Pick { winner_name } => println!("Picked {}", winner_name),
    }
    Ok(())
}

fn summary_line(view: &TrackerView) -> String {
    let config = view.config();
    let current = view.current_participant().as_deref().unwrap_or("-");
    format!(
        "#{} {} [{}] current: {}",
        view.tracker_id(),
        config.title(),
        config.mode().label(),
        current
    )
}

fn print_view(view: &TrackerView) {
    println!("{}", summary_line(view));
    println!("Participants: {}", view.config().participants().to_comma_separated());
    if let Some(interval) = view.config().rotation_interval() {
        println!("Rotates: {}", interval);
    }
    for line in view.scores() {
        println!("  {}: {}", line.participant(), line.score());
    }
    if !view.history().is_empty() {
        println!("History:");
    }
    for entry in view.history() {
        println!("  {} ({})", entry.display_line(), entry.actor());
    }
}
