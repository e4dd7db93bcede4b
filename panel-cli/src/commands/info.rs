//! Info command implementation - summarise inputs without rendering

use anyhow::{Context, Result};
use panel_core::{load_table, page_count, Cursor, GridShape, ImageStore, Table};
use std::path::PathBuf;

use crate::config::Config;

pub fn execute(
    config: &Config,
    table_path: PathBuf,
    images: Option<PathBuf>,
    rows: Option<usize>,
    cols: Option<usize>,
) -> Result<()> {
    let table = load_table(&table_path, &config.columns)
        .with_context(|| format!("Failed to load record table {}", table_path.display()))?;
    let shape = GridShape::new(rows.unwrap_or(config.layout.rows), cols.unwrap_or(config.layout.cols))
        .context("Invalid grid shape")?;

    println!("Table: {}", table_path.display());
    println!("  records: {}", table.len());
    println!("  columns: {}", table.columns().join(", "));
    println!(
        "  pages:   {} at {}x{}",
        page_count(table.len(), Cursor::START, shape.len()),
        shape.rows,
        shape.cols
    );

    if let Some(images) = images {
        let store = ImageStore::open(&images)
            .with_context(|| format!("Failed to load image cube {}", images.display()))?;
        println!("Images: {}", images.display());
        println!("  count: {}", store.len());
        if let Some((h, w, c)) = store.image_shape() {
            println!("  shape: {}x{} with {} channel(s)", h, w, c);
        }

        let missing = missing_keys(&table, store.len());
        if missing.is_empty() {
            println!("  every record has an image");
        } else {
            log::warn!("{} records point past the end of the image cube", missing.len());
            println!("  records without an image: {:?}", missing);
        }
    }

    Ok(())
}

/// Table rows whose image key has no image in a cube of `count` images
fn missing_keys(table: &Table, count: usize) -> Vec<usize> {
    table
        .iter()
        .filter(|r| r.image_key < 0 || r.image_key as u64 >= count as u64)
        .map(|r| r.row)
        .collect()
}
