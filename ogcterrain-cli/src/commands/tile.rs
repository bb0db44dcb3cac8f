//! Tile command - fetch one height tile and print its statistics.

use std::time::Instant;

use ogcterrain::terrain::{HeightTile, TerrainAdapter, TileResponse};
use serde_json::json;

use super::common::SourceArgs;
use crate::error::CliError;

/// Arguments for the tile command.
pub struct TileArgs {
    pub x: u32,
    pub y: u32,
    pub level: u32,
    pub json: bool,
}

/// Run the tile command.
pub async fn run(source_args: &SourceArgs, args: TileArgs) -> Result<(), CliError> {
    let options = source_args.resolve_options()?;
    let adapter = TerrainAdapter::connect(&options, source_args.fetcher()?).await?;

    if !adapter.is_tile_available(args.x, args.y, args.level) {
        eprintln!(
            "Note: tile {}/{}/{} is outside the advertised data",
            args.level, args.x, args.y
        );
    }

    let start = Instant::now();
    let tile = match adapter.request_tile(args.x, args.y, args.level).await? {
        TileResponse::Ready(tile) => tile,
        // No in-flight limit is configured for a single request
        TileResponse::Busy => return Err(CliError::Config("source reported busy".to_string())),
    };
    let elapsed = start.elapsed();

    if args.json {
        let report = json!({
            "x": args.x,
            "y": args.y,
            "level": args.level,
            "width": tile.width,
            "height": tile.height,
            "samples": tile.samples.len(),
            "min": tile.min(),
            "max": tile.max(),
            "mean": tile.mean(),
            "child_mask": tile.child_mask,
            "geometric_error": adapter.level_maximum_geometric_error(args.level),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_tile(&adapter, &args, &tile);
        println!("Fetched in {:.2}s", elapsed.as_secs_f64());
    }
    Ok(())
}

fn print_tile<F: ogcterrain::fetch::TileFetcher>(
    adapter: &TerrainAdapter<F>,
    args: &TileArgs,
    tile: &HeightTile,
) {
    let stat = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    let min = stat(tile.min().map(|v| v.to_string()));
    let max = stat(tile.max().map(|v| v.to_string()));
    let mean = stat(tile.mean().map(|v| format!("{:.1}", v)));

    println!("Tile:            {}/{}/{}", args.level, args.x, args.y);
    println!(
        "Samples:         {} ({} x {})",
        tile.samples.len(),
        tile.width,
        tile.height
    );
    println!("Min:             {}", min);
    println!("Max:             {}", max);
    println!("Mean:            {}", mean);
    println!("Child mask:      {:#06b}", tile.child_mask);
    println!(
        "Geometric error: {:.1} m",
        adapter.level_maximum_geometric_error(args.level)
    );
}
