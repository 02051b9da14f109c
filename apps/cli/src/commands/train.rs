//! Training command implementation.

use super::open_store;
use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use pictura_core::{LinearRuntime, PicturaConfig, Store, TrainingDefaults, build_request, save_trained_model};
use pictura_training::{
    Architecture, ChannelCallbacks, LoggingCallbacks, Outcome, ProgressEvent, TrainingController,
    TrainingEvent,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// Setting key holding the hyperparameters of the last run.
pub const LAST_HYPERPARAMS_KEY: &str = "last_hyperparams";

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Number of epochs
    #[arg(long)]
    epochs: Option<u32>,

    /// Images per optimizer step
    #[arg(long)]
    batch_size: Option<u32>,

    /// Optimizer learning rate
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Model architecture (simple, transfer)
    #[arg(long)]
    architecture: Option<Architecture>,

    /// Fraction of images held out for validation
    #[arg(long)]
    validation_split: Option<f32>,

    /// Shuffle seed
    #[arg(long)]
    seed: Option<u64>,

    /// Do not save the trained model
    #[arg(long)]
    no_save: bool,

    /// Stream events as JSON lines
    #[arg(long)]
    json: bool,
}

impl TrainArgs {
    fn overrides(&self) -> TrainingDefaults {
        TrainingDefaults {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            architecture: self.architecture,
            validation_split: self.validation_split,
            seed: self.seed,
        }
    }
}

pub async fn execute(args: TrainArgs, config: &PicturaConfig, db: &Path) -> Result<()> {
    let mut store = open_store(db)?;

    let mut params = config.hyperparams()?;
    args.overrides().apply(&mut params);

    let request = build_request(&store, params.clone())?;
    let summary = format!(
        "{} classes, {} images, {} epochs, {} architecture",
        request.num_classes(),
        request.total_images(),
        params.epochs,
        params.architecture
    );

    let controller = TrainingController::new(Arc::new(LinearRuntime::new()));
    let (events, mut rx) = ChannelCallbacks::new();
    let handle = controller
        .start(request, (LoggingCallbacks, events))
        .context("Failed to start training")?;

    if !args.json {
        println!();
        println!("{}", "Training".bold().cyan());
        println!("  {}", summary);
        println!("  {}", "Press Ctrl+C to stop after the current epoch.".dimmed());
        println!();
    }

    let mut stopping = false;
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                render(&event, args.json)?;
                if event.is_terminal() {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c(), if !stopping => {
                signal.context("Failed to listen for Ctrl+C")?;
                stopping = true;
                controller.stop();
                if !args.json {
                    println!("{} Stopping after the current epoch...", "→".cyan());
                }
            }
        }
    }

    let outcome = handle.wait().await?;
    store.set_setting(LAST_HYPERPARAMS_KEY, &serde_json::to_value(&params)?)?;

    if let Outcome::Failed(reason) = &outcome {
        bail!("Training failed: {}", reason);
    }

    if !controller.has_model().await {
        if !args.json {
            println!("{}", "Stopped before any epoch finished; nothing to save.".yellow());
        }
        return Ok(());
    }

    if args.no_save {
        if !args.json {
            println!("{}", "Model not saved (--no-save).".dimmed());
        }
        return Ok(());
    }

    let info = save_trained_model(&controller, &mut store).await?;
    if args.json {
        println!("{}", json!({ "type": "model_saved", "epochs_trained": info.epochs_trained }));
    } else {
        println!();
        println!(
            "{} Model saved ({} epoch(s), {})",
            "✓".green(),
            info.epochs_trained,
            outcome.to_string()
        );
        println!("  Try it: {}", "pic predict <image>".dimmed());
        println!();
    }
    Ok(())
}

fn render(event: &TrainingEvent, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        TrainingEvent::EpochEnd(progress) => println!("{}", format_progress(progress)),
        TrainingEvent::BatchEnd(_) => {}
        TrainingEvent::TrainingEnd { outcome } => match outcome {
            Outcome::Completed => println!("{} Training completed", "✓".green()),
            Outcome::Stopped => println!("{} Training stopped", "■".yellow()),
            Outcome::Failed(reason) => println!("{} {}", "✗".red(), reason),
        },
        TrainingEvent::TrainingError { message } => println!("{} {}", "✗".red(), message.red()),
    }
    Ok(())
}

fn format_progress(p: &ProgressEvent) -> String {
    let mut line = format!(
        "  Epoch {:>3}/{:<3}  loss {:.4}  acc {:>5.1}%",
        p.epoch + 1,
        p.epochs,
        p.loss,
        p.accuracy * 100.0
    );
    if let (Some(val_loss), Some(val_accuracy)) = (p.val_loss, p.val_accuracy) {
        line.push_str(&format!("  val_loss {:.4}  val_acc {:>5.1}%", val_loss, val_accuracy * 100.0));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_progress() {
        let event = ProgressEvent {
            epoch: 2,
            epochs: 10,
            loss: 0.5,
            accuracy: 0.875,
            val_loss: Some(0.25),
            val_accuracy: Some(1.0),
        };
        let line = format_progress(&event);
        assert!(line.contains("Epoch   3/10"));
        assert!(line.contains("acc  87.5%"));
        assert!(line.contains("val_acc 100.0%"));
    }
}
