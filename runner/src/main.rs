use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use marquee_machines::registry;
use tracing::error;

mod run;

/// Headless runner for the registered machines.
#[derive(Debug, Parser)]
#[command(name = "marquee", version)]
pub struct Cli {
    /// Machine to run (see --list).
    pub machine: Option<String>,

    /// List registered machines and exit.
    #[arg(long)]
    pub list: bool,

    /// Frames to emulate.
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    /// Machine config file (TOML).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override slices per frame from the config.
    #[arg(long)]
    pub slices: Option<u32>,

    /// Restore this save state before running.
    #[arg(long)]
    pub load_state: Option<PathBuf>,

    /// Write a save state after the last frame.
    #[arg(long)]
    pub save_state: Option<PathBuf>,

    /// Pace frames to the machine's real frame rate.
    #[arg(long)]
    pub throttle: bool,

    /// Print the effective config as TOML and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Log filter, e.g. "marquee_core=debug". Overrides RUST_LOG.
    #[arg(long)]
    pub log: Option<String>,
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => tracing_subscriber::EnvFilter::new(f),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    if cli.list {
        for entry in registry::all() {
            println!("{:<12} {}", entry.name, entry.description);
        }
        return ExitCode::SUCCESS;
    }

    if cli.print_config {
        return match run::load_config(&cli).map(|file| toml::to_string_pretty(&file)) {
            Ok(Ok(text)) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Ok(Err(e)) => {
                error!("{e}");
                ExitCode::FAILURE
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(name) = cli.machine.as_deref() else {
        eprintln!("Usage: marquee <machine> [--frames N] [--config FILE]");
        eprintln!("       marquee --list");
        return ExitCode::FAILURE;
    };

    let Some(entry) = registry::find(name) else {
        let names: Vec<_> = registry::all().iter().map(|e| e.name).collect();
        eprintln!("Unknown machine: {name}");
        eprintln!("Available: {}", names.join(", "));
        return ExitCode::FAILURE;
    };

    match run::run(entry, &cli) {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
