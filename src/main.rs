// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use resistor_scan::CameraBackendType;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "resistor-scan")]
#[command(about = "Read resistor color bands from a camera feed")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/resistor-scan/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Scan a live feed and print each reading set as a JSON line
    Scan {
        /// Capture backend (synthetic, v4l2)
        #[arg(short, long)]
        backend: Option<CameraBackendType>,

        /// Device path to open (e.g. /dev/video0)
        #[arg(short, long)]
        device: Option<String>,

        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Report these bands for every frame instead of running a model,
        /// e.g. "brown,black,red,gold"
        #[arg(long)]
        bands: Option<String>,
    },

    /// Run one detection cycle on a still image
    Analyze {
        /// Image file (PNG, JPEG, ...)
        image: PathBuf,

        /// Report these bands instead of running a model
        #[arg(long)]
        bands: Option<String>,
    },

    /// Decode a band sequence without any camera
    Decode {
        /// Comma-separated band colors, e.g. "yellow,violet,orange,gold"
        bands: String,
    },

    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=resistor_scan=debug, RUST_LOG=info
    resistor_scan::logging::init("warn");

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Scan {
            backend,
            device,
            seconds,
            bands,
        } => cli::scan(config, backend, device, seconds, bands),
        Commands::Analyze { image, bands } => cli::analyze(config, image, bands),
        Commands::Decode { bands } => cli::decode(&bands),
        Commands::Config { write } => cli::show_config(&config, cli.config.as_deref(), write),
    }
}
