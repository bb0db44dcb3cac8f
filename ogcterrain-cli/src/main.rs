//! OGC Terrain CLI - Command-line interface
//!
//! Inspects OGC elevation services and fetches height tiles through the
//! ogcterrain library.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use ogcterrain::logging::{default_log_dir, default_log_file, init_logging};

use commands::common::SourceArgs;
use commands::tile::TileArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "ogcterrain")]
#[command(version = ogcterrain::VERSION)]
#[command(about = "Elevation tiles from OGC WMS, TMS and WMTS services")]
#[command(long_about = None)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the capabilities document and describe the terrain source
    Inspect {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch one tile and print its height statistics
    Tile {
        /// Tile column
        #[arg(long)]
        x: u32,

        /// Tile row, counted from the north
        #[arg(long)]
        y: u32,

        /// Quadtree level
        #[arg(long, default_value = "0")]
        level: u32,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _logging = match init_logging(default_log_dir(), default_log_file()) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let result = match cli.command {
        Commands::Inspect { json } => commands::inspect::run(&cli.source, json).await,
        Commands::Tile { x, y, level, json } => {
            commands::tile::run(&cli.source, TileArgs { x, y, level, json }).await
        }
    };

    if let Err(e) = result {
        e.exit();
    }
}
