//! Prediction command implementation.

use super::open_store;
use anyhow::{Context, Result};
use colored::Colorize;
use pictura_core::{LinearRuntime, restore_model};
use pictura_training::{ImageData, TrainingController};
use std::path::Path;
use std::sync::Arc;

const BAR_WIDTH: usize = 30;

pub async fn execute(file: &Path, json_output: bool, db: &Path) -> Result<()> {
    let store = open_store(db)?;
    let controller = TrainingController::new(Arc::new(LinearRuntime::new()));
    restore_model(&controller, &store)
        .await?
        .context("No saved model. Run `pic train` first.")?;

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let predictions = controller.predict(&ImageData::new(bytes)).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&predictions)?);
        return Ok(());
    }

    println!();
    println!("{}", file.display().to_string().bold());
    for (rank, prediction) in predictions.iter().enumerate() {
        let filled = (prediction.probability.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize;
        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
        let name = if rank == 0 { prediction.class_name.green().bold() } else { prediction.class_name.normal() };
        println!("  {:<20} {} {:>5.1}%", name, bar.dimmed(), prediction.probability * 100.0);
    }
    println!();
    Ok(())
}
