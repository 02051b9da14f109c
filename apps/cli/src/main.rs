//! Pictura CLI - teach a small image classifier from the command line
//!
//! This CLI provides a `pic` command for collecting labeled images, training a
//! classifier on them locally and checking its predictions.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pictura_core::PicturaConfig;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{
    class::{self, ClassCommand},
    image::{self, ImageCommand},
    model::{self, ModelCommand},
    predict, reset,
    train::{self, TrainArgs},
};

/// Pictura - train an image classifier on your own examples
#[derive(Parser, Debug)]
#[command(
    name = "pic",
    author,
    version,
    about = "Pictura - train an image classifier on your own examples",
    long_about = "Pictura (pic) stores labeled example images, trains a small classifier on them locally and predicts labels for new images.\nNo server or remote storage is involved."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// SQLite database file (overrides the configured one)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage classes
    #[command(subcommand)]
    Class(ClassCommand),

    /// Manage example images
    #[command(subcommand)]
    Image(ImageCommand),

    /// Train a classifier on every stored class
    ///
    /// Prints progress after each epoch. Press Ctrl+C to stop after the current
    /// epoch; the partially trained model is still saved.
    Train(TrainArgs),

    /// Classify an image with the saved model
    Predict {
        /// Image file to classify
        file: PathBuf,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect the saved model
    #[command(subcommand)]
    Model(ModelCommand),

    /// Delete all classes, images, the saved model and settings
    Reset {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

fn parse_level(level: &str) -> Level {
    match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = PicturaConfig::discover_and_load().context("Failed to load configuration")?;

    let level = args.log_level.as_deref().or(config.log_level.as_deref()).unwrap_or("warn");
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db = args.db.unwrap_or_else(|| config.database_path());

    match args.command {
        Command::Class(command) => class::execute(command, &db),
        Command::Image(command) => image::execute(command, &db),
        Command::Train(train_args) => train::execute(train_args, &config, &db).await,
        Command::Predict { file, json } => predict::execute(&file, json, &db).await,
        Command::Model(command) => model::execute(command, &db),
        Command::Reset { yes } => reset::execute(yes, &db),
    }
}
