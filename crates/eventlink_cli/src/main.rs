//! EventLink CLI
//!
//! Command-line tools for EventLink event files.
//!
//! # Commands
//!
//! - `inspect` - Display header, cursors and usage
//! - `dump` - List stored events, oldest first
//! - `add` - Append one event
//! - `clear` - Discard all stored events
//! - `simulate` - Drain the log over a lossy loopback uplink

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// EventLink command-line event file tools.
#[derive(Parser)]
#[command(name = "eventlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the event file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Device configuration (JSON); sets the event log layout
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display header, cursors and usage
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List stored events, oldest first
    Dump {
        /// Maximum number of events to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Append one event
    Add {
        /// Command code: a name (tag-detected, time-request, time-request2,
        /// time-changed) or a number such as 0x02
        #[arg(long = "command", value_parser = commands::add::parse_command)]
        code: u8,

        /// Payload as hex
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Discard all stored events
    Clear,

    /// Drain the log over a lossy loopback uplink
    Simulate {
        /// Events to produce during the run
        #[arg(short, long, default_value = "20")]
        events: u32,

        /// Stop after this many delivery cycles
        #[arg(long, default_value = "1000")]
        cycles: u64,

        /// Probability that a frame is lost
        #[arg(short, long, default_value = "0.2")]
        loss: f64,

        /// Divide all configured intervals by this factor
        #[arg(long, default_value = "500")]
        speed: u32,

        /// Seed for the loss pattern
        #[arg(long)]
        seed: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Event file path required for inspect")?;
            commands::inspect::run(&path, &config, &format)?;
        }
        Commands::Dump { limit, format } => {
            let path = cli.path.ok_or("Event file path required for dump")?;
            commands::dump::run(&path, &config, limit, &format)?;
        }
        Commands::Add { code, data } => {
            let path = cli.path.ok_or("Event file path required for add")?;
            commands::add::run(&path, &config, code, data.as_deref())?;
        }
        Commands::Clear => {
            let path = cli.path.ok_or("Event file path required for clear")?;
            commands::clear::run(&path, &config)?;
        }
        Commands::Simulate {
            events,
            cycles,
            loss,
            speed,
            seed,
            format,
        } => {
            let path = cli.path.ok_or("Event file path required for simulate")?;
            let options = commands::simulate::Options {
                events,
                cycles,
                loss,
                speed,
                seed,
            };
            commands::simulate::run(&path, &config, &options, &format)?;
        }
        Commands::Version => {
            println!("EventLink CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
