//! Reset command implementation.

use super::open_store;
use anyhow::{Result, bail};
use colored::Colorize;
use pictura_core::Store;
use std::path::Path;

pub fn execute(yes: bool, db: &Path) -> Result<()> {
    if !yes {
        bail!("This deletes every class, image and the saved model. Re-run with --yes to confirm.");
    }
    let mut store = open_store(db)?;
    store.clear_all()?;
    println!("{} Cleared all data in {}", "✓".green(), db.display());
    Ok(())
}
