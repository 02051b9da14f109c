//! Example image commands.

use super::open_store;
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::Colorize;
use pictura_core::Store;
use pictura_core::runtime::features;
use pictura_training::{ImageData, ImageId};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

#[derive(Subcommand, Debug)]
pub enum ImageCommand {
    /// Add image files to a class
    ///
    /// Directories are searched recursively for image files.
    Add {
        /// Class id or name
        class: String,

        /// Image files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List the images of a class
    List {
        /// Class id or name
        class: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an image
    Delete {
        /// Image id
        id: i64,
    },
}

pub fn execute(command: ImageCommand, db: &Path) -> Result<()> {
    match command {
        ImageCommand::Add { class, paths } => add(db, &class, &paths),
        ImageCommand::List { class, json } => list(db, &class, json),
        ImageCommand::Delete { id } => {
            let mut store = open_store(db)?;
            if !store.delete_image(ImageId(id))? {
                bail!("No image with id {}", id);
            }
            println!("{} Deleted image {}", "✓".green(), id);
            Ok(())
        }
    }
}

fn mime_of(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first_raw()
        .filter(|m| m.starts_with("image/"))
        .map(str::to_string)
}

/// Expands directories into the image files beneath them, sorted by path.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file() && mime_of(e.path()).is_some())
                .map(walkdir::DirEntry::into_path)
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn add(db: &Path, class: &str, paths: &[PathBuf]) -> Result<()> {
    let mut store = open_store(db)?;
    let record = store.find_class(class)?;

    let mut added = 0;
    let mut skipped = 0;
    for file in collect_files(paths) {
        let bytes =
            std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
        if let Err(e) = features::decode(&bytes) {
            warn!(path = %file.display(), error = %e, "Skipping undecodable image");
            println!("  {} {} ({})", "skip".yellow(), file.display(), e);
            skipped += 1;
            continue;
        }

        let mut data = ImageData::new(bytes);
        if let Some(mime) = mime_of(&file) {
            data = data.with_mime_type(mime);
        }
        let id = store.add_image(record.id, &data)?;
        println!("  {} {} {}", "+".green(), file.display(), format!("(id {id})").dimmed());
        added += 1;
    }

    if added == 0 && skipped == 0 {
        bail!("No image files found");
    }
    println!();
    println!("{} Added {} image(s) to {}", "✓".green(), added, record.name.cyan());
    if skipped > 0 {
        println!("  {}", format!("{skipped} file(s) could not be decoded").yellow());
    }
    Ok(())
}

fn list(db: &Path, class: &str, json_output: bool) -> Result<()> {
    let store = open_store(db)?;
    let record = store.find_class(class)?;
    let images = store.get_images_by_class(record.id)?;

    if json_output {
        let out: Vec<_> = images
            .iter()
            .map(|i| {
                json!({
                    "id": i.id,
                    "class_id": i.class_id,
                    "bytes": i.data.bytes.len(),
                    "mime_type": i.data.mime_type,
                    "created_at": i.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Images in {} ({})", record.name, images.len()).bold().cyan());
    println!();
    if images.is_empty() {
        println!("  {}", "No images yet.".dimmed());
        return Ok(());
    }

    println!("{:<6} {:<12} {:<12} {}", "ID", "Type", "Size", "Added");
    println!("{}", "─".repeat(60));
    for image in &images {
        println!(
            "{:<6} {:<12} {:<12} {}",
            image.id,
            image.data.mime_type.as_deref().unwrap_or("-"),
            format!("{} B", image.data.bytes.len()),
            image.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
        );
    }
    println!();
    Ok(())
}
