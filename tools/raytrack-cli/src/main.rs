//! Raytrack CLI: deterministic recording of a synthetic animation.
//!
//! Usage:
//!   raytrack record [OPTIONS]    Record the demo animation
//!   raytrack config [--save]     Show (and optionally persist) the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use raytrack_common::config::{AppConfig, Format};

mod commands;

#[derive(Parser)]
#[command(
    name = "raytrack",
    about = "Frame-exact capture of time-driven animations",
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
    /// Record the demo animation
    Record {
        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,

        /// Stop after this many seconds of output
        #[arg(long, default_value = "2.0")]
        seconds: f64,

        /// Motion blur samples per frame
        #[arg(long)]
        blur: Option<u32>,

        /// Output format: apng|webm|socket
        #[arg(long)]
        format: Option<Format>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base file name of the artifact
        #[arg(short, long)]
        name: Option<String>,

        /// Frame receiver address for the socket format
        #[arg(long)]
        stream_address: Option<String>,
    },

    /// Print the loaded configuration as JSON
    Config {
        /// Write the configuration to the standard location
        #[arg(long)]
        save: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut app = AppConfig::load();

    if cli.verbose {
        app.logging.level = "debug".to_string();
    }
    raytrack_common::logging::init_logging(&app.logging);

    match cli.command {
        Commands::Record {
            fps,
            frames,
            seconds,
            blur,
            format,
            output,
            name,
            stream_address,
        } => {
            let capture = &mut app.capture;
            if let Some(fps) = fps {
                capture.fps = fps;
            }
            match frames {
                Some(frames) => {
                    capture.frame_limit = frames;
                    capture.time_limit = 0.0;
                }
                None => capture.time_limit = seconds,
            }
            if let Some(blur) = blur {
                capture.motion_blur_frames = blur;
            }
            if let Some(format) = format {
                capture.format = format;
            }
            if let Some(output) = output {
                capture.output_dir = output;
            }
            if name.is_some() {
                capture.file_name = name;
            }
            if let Some(address) = stream_address {
                capture.stream_address = address;
            }
            capture.verbose = cli.verbose;
            commands::record::run(app.capture)
        }
        Commands::Config { save } => commands::config::run(&app, save),
    }
}
