//! currents - drive a tracked page session from the command line
//!
//! This tool provides commands for:
//! - Checking tracking configuration and the resolved identity
//! - Sending one-off manual events
//! - Replaying scripted page sessions
//! - Running an interactive page session
//!
//! Uses XDG Base Directory specification for file locations:
//! - Identity storage: $XDG_DATA_HOME/currents/storage.json (~/.local/share/currents/storage.json)
//! - Logs: $XDG_STATE_HOME/currents/currents.log (~/.local/state/currents/currents.log)
//! - Config: $XDG_CONFIG_HOME/currents/config.toml (~/.config/currents/config.toml)

mod delivery;
mod interactive;
mod replay;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use currents_core::identity::{FileKeyStore, IdentityResolver, KeyStore, OverrideMarker};
use currents_core::session::{Session, Tracker};
use currents_core::{Config, TeardownReport};

use delivery::Delivery;
use interactive::Input;

#[derive(Parser)]
#[command(name = "currents")]
#[command(about = "Client-side interaction tracking for Currents")]
#[command(version)]
struct Args {
    /// Verbose output (writes a log file)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Collection endpoint base URL (overrides config)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Override marker value (acts as the test user cookie)
    #[arg(long, global = true)]
    marker: Option<String>,

    /// Cookie header to read the override marker from
    #[arg(long, global = true, conflicts_with = "marker")]
    cookie: Option<String>,

    /// Print deliveries instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show tracking configuration and identity
    Status,

    /// Show the identity deliveries are tagged with
    Identity {
        /// Forget the stored anonymous key first
        #[arg(long)]
        reset: bool,
    },

    /// Capture one manual event and deliver it
    Track {
        /// Event type tag (e.g. share, click, view_market)
        event_type: String,

        /// Market the event is about
        #[arg(short, long)]
        market: Option<String>,

        /// Extra fields as key=value (repeatable)
        #[arg(short, long = "extra", value_name = "KEY=VALUE")]
        extras: Vec<String>,
    },

    /// Replay a scripted page session from a TOML file
    Replay {
        /// Path to the script
        file: PathBuf,
    },

    /// Run an interactive page session reading commands from stdin
    Session {
        /// Page path loaded when the session starts
        #[arg(long)]
        path: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(endpoint) = &args.endpoint {
        config.tracking.endpoint = endpoint.clone();
        config
            .tracking
            .validate()
            .context("invalid --endpoint")?;
    }

    // Initialize logging if verbose
    let _log_guard = if args.verbose {
        Some(
            currents_core::logging::init(&config.logging)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    let marker = OverrideMarker::new(config.tracking.override_marker.clone());
    if let Some(value) = &args.marker {
        marker.set(value.clone());
    } else if let Some(header) = &args.cookie {
        if let Some(value) = currents_core::identity::cookie_value(header, marker.name()) {
            marker.set(value);
        }
    }

    let store: Arc<dyn KeyStore> = Arc::new(FileKeyStore::new(Config::storage_path()));
    let resolver = IdentityResolver::new(store.clone(), marker, config.tracking.storage_key.clone());

    match args.command {
        Command::Status => cmd_status(&config, store.as_ref(), &resolver),
        Command::Identity { reset } => cmd_identity(&resolver, reset),
        Command::Track {
            event_type,
            market,
            extras,
        } => block_on(cmd_track(
            &config,
            resolver,
            args.dry_run,
            &event_type,
            market.as_deref(),
            &extras,
        )),
        Command::Replay { file } => block_on(cmd_replay(&config, resolver, args.dry_run, &file)),
        Command::Session { path } => block_on(cmd_session(&config, resolver, args.dry_run, path)),
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(future)
}

fn cmd_status(config: &Config, store: &dyn KeyStore, resolver: &IdentityResolver) -> Result<()> {
    println!("Currents Tracking Configuration");
    println!("===============================");
    println!();

    let tracking = &config.tracking;

    println!("Endpoint:        {}", tracking.endpoint);
    println!("Batch URL:       {}", tracking.batch_url());
    println!("Beacon URL:      {}", tracking.beacon_url());
    println!("Batch Size:      {}", tracking.batch_size);
    println!("Debounce:        {}ms", tracking.debounce_ms);
    println!();
    println!("Config:          {}", Config::config_path().display());
    println!("Storage:         {}", Config::storage_path().display());
    println!("Log:             {}", Config::log_path().display());
    println!();

    let stored = store
        .get(&tracking.storage_key)
        .context("failed to read identity storage")?;

    match resolver.marker().current() {
        Some(value) => {
            println!("Identity:        {} (test user via {})", value, tracking.override_marker);
        }
        None => match stored {
            Some(key) => println!("Identity:        {} (anonymous)", key),
            None => println!("Identity:        <not yet assigned>"),
        },
    }

    Ok(())
}

fn cmd_identity(resolver: &IdentityResolver, reset: bool) -> Result<()> {
    if reset {
        resolver.reset().context("failed to reset stored identity")?;
        println!("Stored anonymous key removed");
    }

    let user_key = resolver.resolve();
    println!("User Key:        {}", user_key);
    println!("Mode:            {}", user_key.mode());
    println!("Display:         {}", user_key.display_key());

    Ok(())
}

async fn cmd_track(
    config: &Config,
    resolver: IdentityResolver,
    dry_run: bool,
    event_type: &str,
    market: Option<&str>,
    extras: &[String],
) -> Result<()> {
    let extra = interactive::parse_extra(extras.iter().map(String::as_str))?;
    let delivery = Delivery::new(&config.tracking, dry_run)?;

    let mut session = Session::new(&config.tracking, resolver, delivery.transport());
    session
        .track_event(event_type, market, Some(extra))
        .context("failed to capture event")?;

    let report = session.teardown();
    println!("Tracked {} ({} event(s) flushed)", event_type, report.flushed);

    delivery.finish().await
}

async fn cmd_replay(
    config: &Config,
    resolver: IdentityResolver,
    dry_run: bool,
    file: &std::path::Path,
) -> Result<()> {
    let script = replay::Script::load(file)?;
    let delivery = Delivery::new(&config.tracking, dry_run)?;

    println!("Replaying {} step(s) from {}", script.steps.len(), file.display());
    tracing::info!(path = %file.display(), steps = script.steps.len(), "Replay starting");

    let marker = resolver.marker().clone();
    let session = Session::new(&config.tracking, resolver, delivery.transport());
    let handle = currents_core::session::spawn(session);

    let report = replay::run(&script, &handle, &marker).await?;
    print_teardown(&report);

    delivery.finish().await
}

async fn cmd_session(
    config: &Config,
    resolver: IdentityResolver,
    dry_run: bool,
    path: Option<String>,
) -> Result<()> {
    let delivery = Delivery::new(&config.tracking, dry_run)?;
    let marker = resolver.marker().clone();
    let whoami = resolver.clone();

    let session = Session::new(&config.tracking, resolver, delivery.transport());
    let (tracker, handle) = Tracker::new(session);
    let task = tokio::spawn(tracker.run());

    // Ctrl+C tears the session down; the stdin loop notices the tracker exit
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        let handle = handle.clone();
        ctrlc::set_handler(move || {
            // A second Ctrl+C exits without waiting for delivery
            if interrupted.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            let _ = handle.request_teardown();
        })
        .context("failed to set Ctrl+C handler")?;
    }

    if let Some(path) = path {
        handle.load(path)?;
    }

    println!("Interactive session started (type 'help' for commands)");

    let mut lines = interactive::spawn_stdin_reader();
    loop {
        let line = tokio::select! {
            line = lines.recv() => line.transpose().context("failed to read stdin")?,
            _ = handle.closed() => break,
        };

        // EOF tears down like quit
        let Some(line) = line else {
            handle.request_teardown()?;
            break;
        };

        let input = match Input::parse(&line) {
            Ok(input) => input,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        let result = match input {
            Input::Load(location) => handle.load(location),
            Input::Click(target) => handle.click(target),
            Input::Track {
                event_type,
                market_id,
                extra,
            } => handle.track_event(&event_type, market_id.as_deref(), Some(extra)),
            Input::Marker(Some(value)) => {
                marker.set(value);
                Ok(())
            }
            Input::Marker(None) => {
                marker.clear();
                Ok(())
            }
            Input::Flush => handle.flush(),
            Input::WhoAmI => {
                let user_key = whoami.resolve();
                println!("{} ({})", user_key.display_key(), user_key.mode());
                Ok(())
            }
            Input::Help => {
                println!("{}", interactive::HELP);
                Ok(())
            }
            Input::Quit => {
                handle.request_teardown()?;
                break;
            }
            Input::Empty => Ok(()),
        };

        if let Err(e) = result {
            println!("error: {}", e);
        }
    }

    let report = task.await.context("tracker task failed")?;
    if interrupted.load(Ordering::SeqCst) {
        println!();
        println!("Interrupted, session torn down");
    }
    print_teardown(&report);

    delivery.finish().await
}

fn print_teardown(report: &TeardownReport) {
    println!();
    println!("Session ended");
    match &report.beacon {
        Some(beacon) => println!(
            "Beacon:          {} on {} after {}ms",
            beacon.event_type, beacon.market_id, beacon.dwell_ms
        ),
        None => println!("Beacon:          <none, no market viewed>"),
    }
    println!("Final flush:     {} event(s)", report.flushed);
}
