//! `xrspace` – command line front end for the reference-frame subsystem.
//!
//! Runs simulated XR sessions and prints what an application would observe:
//!
//! - `xrspace run` starts a session on a simulated headset, requests the
//!   frames of reference given with `--frame` (comma-separated fallbacks),
//!   ticks at the configured rate and prints poses and reset events.  Ctrl-C
//!   ends the run cleanly.
//! - `xrspace schema` prints the JSON schemas of the request options and of
//!   the session configuration.
//! - `xrspace config show|init` prints or writes `~/.xrspace/config.toml`.

mod config;
mod run;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use colored::Colorize;
use thiserror::Error;
use tracing::warn;
use xrspace_runtime::{SessionConfig, TelemetryConfig, init_tracing};
use xrspace_types::{
    FrameError, FrameOfReferenceOptions, SessionMode, StationarySubtype, TrackingQuality,
};

use crate::config::ConfigError;
use crate::run::{FrameRequest, RunOptions};

#[derive(Parser)]
#[command(name = "xrspace", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file [default: ~/.xrspace/config.toml]
    #[arg(short, long, global = true, env = "XRSPACE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated session
    Run(RunArgs),

    /// Print JSON schemas for frame requests and session config
    Schema,

    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Parser)]
struct RunArgs {
    /// Session mode (inline, immersive)
    #[arg(short, long, default_value = "immersive")]
    mode: SessionMode,

    /// Headset quality class; overrides the config file
    #[arg(short, long)]
    quality: Option<TrackingQuality>,

    /// Frame to request, with comma-separated fallbacks
    /// (e.g. `unbounded,stationary/eye-level`); repeatable
    #[arg(short, long = "frame")]
    frames: Vec<FrameRequest>,

    /// Frame the session cannot start without
    #[arg(long)]
    require: Option<FrameOfReferenceOptions>,

    /// Number of ticks to run; 0 runs until Ctrl-C
    #[arg(short = 'n', long, default_value_t = 720)]
    ticks: u64,

    /// Recenter the headset on this tick; repeatable
    #[arg(long)]
    recenter: Vec<u64>,

    /// Half extent of a room-scale stage; overrides the config file
    #[arg(long)]
    stage: Option<f32>,

    /// Add a tracked right-hand controller
    #[arg(long)]
    controller: bool,

    /// Enable the floor polyfill with this floor height
    #[arg(long)]
    floor_y: Option<f32>,

    /// Radius of the circle the simulated user walks
    #[arg(long, default_value_t = 0.5)]
    walk_radius: f32,

    /// Print poses every this many ticks; 0 prints resets only
    #[arg(long, default_value_t = 72)]
    print_every: u64,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Failed to render schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("Refusing to overwrite {0}; pass --force")]
    ConfigExists(PathBuf),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(config::config_path);

    let result = match cli.command {
        Commands::Run(args) => run_command(&path, args),
        Commands::Schema => schema_command(),
        Commands::Config { command } => config_command(&path, command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────────────────

fn run_command(path: &Path, args: RunArgs) -> Result<(), CliError> {
    let _guard = init_tracing(&TelemetryConfig::from_env("xrspace"));
    let cfg = config::load_or_default(path)?;

    let opts = RunOptions {
        mode: args.mode,
        quality: args.quality.unwrap_or(cfg.quality),
        frames: if args.frames.is_empty() {
            vec![FrameRequest {
                primary: FrameOfReferenceOptions::stationary(StationarySubtype::EyeLevel),
                fallbacks: Vec::new(),
            }]
        } else {
            args.frames
        },
        require: args.require,
        ticks: args.ticks,
        recenter: args.recenter,
        stage_half_extent_m: args.stage,
        controller: args.controller,
        floor_y: args.floor_y,
        walk_radius_m: args.walk_radius,
        print_every: args.print_every,
    };

    print_banner();

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – ending the session …".yellow().bold());
        stop_handler.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop the run with --ticks instead");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(run::run(&cfg, &opts, stop))?;

    println!();
    println!(
        "  {} {} ticks, {} frame(s), {} reset(s)",
        "✓".green().bold(),
        summary.ticks,
        summary.frames,
        summary.resets.len()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// schema
// ─────────────────────────────────────────────────────────────────────────────

fn schema_command() -> Result<(), CliError> {
    let options = schemars::schema_for!(FrameOfReferenceOptions);
    let session = schemars::schema_for!(SessionConfig);
    println!("{}", serde_json::to_string_pretty(&options)?);
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// config
// ─────────────────────────────────────────────────────────────────────────────

fn config_command(path: &Path, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let exists = path.exists();
            let cfg = config::load_or_default(path)?;
            let source = if exists {
                path.display().to_string().bold().to_string()
            } else {
                "defaults (no config file)".dimmed().to_string()
            };
            println!("# {}", source);
            print!("{}", toml::to_string_pretty(&cfg).map_err(ConfigError::from)?);
            Ok(())
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists(path.to_path_buf()));
            }
            config::save_to(&config::Config::default(), path)?;
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "xrspace".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Spatial reference frames on a simulated headset");
    println!();
}
