//! Inspect command - load a source and describe it.

use ogcterrain::capabilities;
use ogcterrain::source::SourceSummary;
use tracing::info;

use super::common::SourceArgs;
use crate::error::CliError;

/// Run the inspect command.
pub async fn run(source_args: &SourceArgs, json: bool) -> Result<(), CliError> {
    let options = source_args.resolve_options()?;
    let fetcher = source_args.fetcher()?;

    info!(
        layer = %options.layer_name,
        service = %options.service,
        "Inspecting source"
    );
    let source = capabilities::load_source(&options, &fetcher)
        .await
        .map_err(|e| CliError::Terrain(e.into()))?;
    let summary = source.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &SourceSummary) {
    println!(
        "Layer:          {} ({})",
        summary.layer_name, summary.service
    );
    let ready = if summary.ready { "yes" } else { "no" };
    println!("Ready:          {}", ready);
    println!("CRS:            {}", summary.crs.as_deref().unwrap_or("-"));
    if let Some((x, y)) = summary.level_zero_tiles {
        println!("Level 0 tiles:  {} x {}", x, y);
    }
    println!(
        "Height map:     {} x {} samples",
        summary.height_map.width, summary.height_map.height
    );
    if let Some(size) = summary.image_size {
        println!("Raster size:    {} x {} pixels", size.width, size.height);
    }
    println!("Levels:         0..{}", summary.maximum_level);
    println!(
        "Elevation:      offset {}, accepted ({}, {})",
        summary.limits.offset, summary.limits.lowest, summary.limits.highest
    );
    if let Some(style) = &summary.style_name {
        println!("Style:          {}", style);
    }
    println!(
        "Image format:   {}",
        summary.image_format.as_deref().unwrap_or("-")
    );
    println!(
        "Array format:   {}",
        summary.array_format.as_deref().unwrap_or("-")
    );
}
