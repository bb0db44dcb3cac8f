//! CLI error handling with user-friendly messages.

use std::fmt;
use std::io;
use std::process;

use ogcterrain::capabilities::CapabilitiesError;
use ogcterrain::config::ConfigError;
use ogcterrain::fetch::FetchError;
use ogcterrain::terrain::TerrainError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to create the HTTP client
    HttpClient(FetchError),
    /// Failed to read a capabilities file
    FileRead { path: String, error: io::Error },
    /// Failed to load the terrain source or a tile
    Terrain(TerrainError),
    /// Failed to serialize output
    Output(serde_json::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Terrain(TerrainError::NotReady) => {
                eprintln!();
                eprintln!("The server does not offer the layer in a usable form. Check that:");
                eprintln!("  1. The layer name matches the capabilities document exactly");
                eprintln!("  2. The layer advertises EPSG:4326, CRS:84 or EPSG:3857");
                eprintln!("  3. The server offers image/png or image/bil for GetMap/GetTile");
            }
            CliError::Terrain(TerrainError::Capabilities(CapabilitiesError::Fetch { .. })) => {
                eprintln!();
                eprintln!("Run with RUST_LOG=debug to see the requested URLs.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::HttpClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path, error)
            }
            CliError::Terrain(e) => write!(f, "{}", e),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::HttpClient(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Terrain(e) => Some(e),
            CliError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TerrainError> for CliError {
    fn from(e: TerrainError) -> Self {
        CliError::Terrain(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e)
    }
}
