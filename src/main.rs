// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use plantscan::{AppResult, i18n};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "plantscan")]
#[command(about = "Scan plant QR codes and open the plant's record")]
#[command(version = env!("PLANTSCAN_BUILD_VERSION"))]
struct Cli {
    /// Config file (default: ~/.config/plantscan/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode QR codes in an image file
    Decode {
        /// Image to scan
        image: PathBuf,
    },

    /// Run a scan session against image-backed cameras
    Scan {
        /// Signed-in user id
        #[arg(short, long)]
        user: Option<String>,

        /// Plant registry JSON (overrides the config file)
        #[arg(short, long)]
        registry: Option<PathBuf>,

        /// Image served as an environment-facing camera (repeatable)
        #[arg(short, long)]
        image: Vec<PathBuf>,

        /// Image served as a front-facing camera (repeatable)
        #[arg(long)]
        front: Vec<PathBuf>,

        /// Print the plant URL instead of opening it
        #[arg(long)]
        no_open: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> AppResult<()> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=plantscan=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    // Get the system's preferred languages.
    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();
    i18n::init(&requested_languages);

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Decode { image } => cli::decode_image(&config, &image),
        Commands::Scan {
            user,
            registry,
            image,
            front,
            no_open,
        } => cli::run_scan(
            &config,
            cli::ScanArgs {
                user,
                registry,
                image,
                front,
                no_open,
            },
        ),
        Commands::Config => cli::print_config(&config),
    }
}
