//! Mixcast CLI: run and inspect media pipelines.
//!
//! Usage:
//!   mixcast check                 Check GStreamer and required plugins
//!   mixcast layout <N>            Print the compositor grid for N inputs
//!   mixcast produce [PATH]        Run a producer and count samples
//!   mixcast composite [OPTIONS]   Run the compositor with test inputs
//!   mixcast config [--init]       Show or create the config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mixcast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "mixcast",
    about = "Media pipeline orchestration for conferencing hosts",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check GStreamer initialisation and element availability
    Check,

    /// Print the compositor layout for a number of inputs
    Layout {
        /// Number of video inputs
        inputs: usize,

        /// Print slots as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a producer pipeline and report delivered samples
    Produce {
        /// Media file to play; a test pattern is used when omitted
        path: Option<PathBuf>,

        /// Seek to this position (seconds) once playing
        #[arg(long)]
        seek: Option<f64>,
    },

    /// Run the compositor and attach test inputs
    Composite {
        /// Number of test video inputs to attach
        #[arg(short, long, default_value = "4")]
        inputs: usize,

        /// Record the composited output to an MP4 file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Publish the composited output to an RTMP URL
        #[arg(long)]
        stream: Option<String>,

        /// Do not open a local preview
        #[arg(long)]
        no_preview: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration to the config file
        #[arg(long)]
        init: bool,

        /// Overwrite an existing config file with --init
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    mixcast_common::logging::init_logging(&config.logging);
    config.validate()?;

    match cli.command {
        Commands::Check => commands::check::run(),
        Commands::Layout { inputs, json } => commands::layout::run(&config, inputs, json),
        Commands::Produce { path, seek } => commands::produce::run(&config, path, seek).await,
        Commands::Composite {
            inputs,
            save,
            stream,
            no_preview,
        } => commands::composite::run(&config, inputs, save, stream, !no_preview).await,
        Commands::Config { init, force } => commands::config::run(&config, init, force),
    }
}
