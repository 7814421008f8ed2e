// src/main.rs - Command line entry point for the firmware motion tool
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use krusty_motion::config::{self, Config};
use krusty_motion::session::{self, SessionError};

#[derive(Debug, Parser)]
#[command(name = "krusty-motion", version, about = "Exercise a Klipper-style firmware socket")]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Override the firmware socket path
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Home, trace a circle, return to center (default)
    Circle {
        #[arg(long)]
        center_x: Option<f64>,
        #[arg(long)]
        center_y: Option<f64>,
        #[arg(long)]
        radius: Option<f64>,
        #[arg(long)]
        points: Option<usize>,
    },
    /// Send raw G-code lines and print the replies
    Send {
        #[arg(required = true)]
        gcode: Vec<String>,
    },
    /// Jog the table to cancel a target offset given in pixels
    Nudge {
        #[arg(long, allow_hyphen_values = true)]
        error_x: f64,
        #[arg(long, allow_hyphen_values = true)]
        error_y: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            config::load_config(path).map_err(|e| {
                tracing::error!("Failed to load config from '{}': {}", path, e);
                Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
            })?
        }
        None => Config::default(),
    };
    if let Some(socket) = cli.socket {
        config.connection.socket_path = socket;
    }

    let command = cli.command.unwrap_or(Command::Circle {
        center_x: None,
        center_y: None,
        radius: None,
        points: None,
    });

    let outcome = match command {
        Command::Circle { center_x, center_y, radius, points } => {
            let circle = &mut config.circle;
            circle.center_x = center_x.unwrap_or(circle.center_x);
            circle.center_y = center_y.unwrap_or(circle.center_y);
            circle.radius = radius.unwrap_or(circle.radius);
            circle.points = points.unwrap_or(circle.points);
            config.validate()?;
            session::run_circle(&config).await.map(|_| ())
        }
        Command::Send { gcode } => session::run_send(&config, &gcode).await.map(|replies| {
            for (command, reply) in gcode.iter().zip(replies) {
                match reply {
                    Some(text) => println!("{} -> {}", command, text.trim_end()),
                    None => println!("{} -> (no reply)", command),
                }
            }
        }),
        Command::Nudge { error_x, error_y } => session::run_nudge(&config, error_x, error_y)
            .await
            .map(|jog| {
                if let Some(jog) = jog {
                    println!("Moved by X{:.3} Y{:.3}", jog.dx, jog.dy);
                }
            }),
    };

    match outcome {
        Ok(()) => Ok(()),
        // Connection problems are already logged; the run just stops.
        Err(SessionError::Transport(_)) => Ok(()),
        Err(e) => {
            tracing::error!("{}", e);
            Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>)
        }
    }
}
