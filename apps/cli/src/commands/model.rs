//! Saved model inspection.

use super::open_store;
use super::train::LAST_HYPERPARAMS_KEY;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use pictura_core::{ModelStatus, Store};
use serde_json::json;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum ModelCommand {
    /// Show what the saved model was trained on
    Info {
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(command: ModelCommand, db: &Path) -> Result<()> {
    match command {
        ModelCommand::Info { json } => info(db, json),
    }
}

fn info(db: &Path, json_output: bool) -> Result<()> {
    let store = open_store(db)?;
    let status = ModelStatus::check(&store)?;
    let hyperparams = store.get_setting(LAST_HYPERPARAMS_KEY)?;

    if json_output {
        let out = match &status {
            ModelStatus::Missing => json!({ "model": null }),
            ModelStatus::Current(info) | ModelStatus::Stale(info) => json!({
                "model": {
                    "runtime": info.runtime,
                    "architecture": info.architecture,
                    "classes": info.classes,
                    "epochs_trained": info.epochs_trained,
                    "metrics": info.metrics,
                    "trained_at": info.trained_at,
                },
                "stale": matches!(status, ModelStatus::Stale(_)),
                "last_hyperparams": hyperparams,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    let Some(info) = status.info() else {
        println!("  {}", "No saved model.".dimmed());
        println!("  {}", "Tip: add classes and images, then run `pic train`.".dimmed());
        return Ok(());
    };

    println!("{}", "Saved Model".bold().cyan());
    println!();
    println!("  Runtime:      {} ({})", info.runtime, info.architecture);
    println!("  Trained:      {}", info.trained_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Epochs:       {}", info.epochs_trained);
    if let Some(metrics) = &info.metrics {
        println!("  Loss:         {:.4}", metrics.loss);
        println!("  Accuracy:     {:.1}%", metrics.accuracy * 100.0);
        if let Some(val_accuracy) = metrics.val_accuracy {
            println!("  Val accuracy: {:.1}%", val_accuracy * 100.0);
        }
    }
    let names: Vec<&str> = info.classes.iter().map(|c| c.name.as_str()).collect();
    println!("  Classes:      {}", names.join(", "));

    if matches!(status, ModelStatus::Stale(_)) {
        println!();
        println!("  {}", "Images changed since this model was trained; run `pic train` again.".yellow());
    }
    println!();
    Ok(())
}
