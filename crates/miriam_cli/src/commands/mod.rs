//! Subcommand implementations. Every command prints JSON on stdout.

pub mod collection;
pub mod draft;
pub mod health;

use anyhow::{Context, Result};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
