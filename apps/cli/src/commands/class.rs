//! Class management commands.

use super::open_store;
use anyhow::{Result, bail};
use clap::Subcommand;
use colored::Colorize;
use pictura_core::Store;
use serde_json::json;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum ClassCommand {
    /// Add a class
    Add {
        /// Display name
        name: String,
    },

    /// List classes with their image counts
    List {
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rename a class
    Rename {
        /// Class id or current name
        class: String,

        /// New name
        name: String,
    },

    /// Delete a class and all of its images
    Delete {
        /// Class id or name
        class: String,
    },
}

pub fn execute(command: ClassCommand, db: &Path) -> Result<()> {
    let mut store = open_store(db)?;
    match command {
        ClassCommand::Add { name } => {
            let id = store.add_class(&name)?;
            println!("{} Added class {} (id {})", "✓".green(), name.trim().cyan(), id);
        }
        ClassCommand::List { json: json_output } => list(&store, json_output)?,
        ClassCommand::Rename { class, name } => {
            let record = store.find_class(&class)?;
            if !store.update_class_name(record.id, &name)? {
                bail!("Class '{}' no longer exists", class);
            }
            println!("{} Renamed {} to {}", "✓".green(), record.name.dimmed(), name.trim().cyan());
        }
        ClassCommand::Delete { class } => {
            let record = store.find_class(&class)?;
            let images = store.count_images(record.id)?;
            store.delete_class(record.id)?;
            println!("{} Deleted class {} and {} image(s)", "✓".green(), record.name.cyan(), images);
        }
    }
    Ok(())
}

fn list(store: &dyn Store, json_output: bool) -> Result<()> {
    let classes = store.get_classes()?;
    let counts = classes
        .iter()
        .map(|c| store.count_images(c.id))
        .collect::<Result<Vec<_>, _>>()?;

    if json_output {
        let out: Vec<_> = classes
            .iter()
            .zip(&counts)
            .map(|(c, count)| {
                json!({
                    "id": c.id,
                    "name": c.name,
                    "images": count,
                    "created_at": c.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Classes ({})", classes.len()).bold().cyan());
    println!();

    if classes.is_empty() {
        println!("  {}", "No classes yet.".dimmed());
        println!("  {}", "Tip: add one with `pic class add <name>`.".dimmed());
        return Ok(());
    }

    println!("{:<6} {:<24} {}", "ID", "Name", "Images");
    println!("{}", "─".repeat(40));
    for (class, count) in classes.iter().zip(&counts) {
        println!("{:<6} {:<24} {}", class.id, class.name.cyan(), count);
    }
    println!();
    Ok(())
}
