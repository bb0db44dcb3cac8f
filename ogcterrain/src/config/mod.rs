//! Source configuration.
//!
//! [`TerrainOptions`] describes which layer to load and how to sanitize its
//! heights. Options can be built in code or read from an INI file with
//! [`load_options`].

mod file;
mod options;

pub use file::{default_config_path, load_options, parse_ini};
pub use options::{
    Proxy, ServiceKind, TerrainOptions, DEFAULT_HEIGHT_MAP_SIZE, DEFAULT_HIGHEST, DEFAULT_LOWEST,
    DEFAULT_MAX_LEVEL, DEFAULT_OFFSET,
};

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or validating a configuration.
///
/// These are fatal: no source is created when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// No layer name was configured.
    #[error("A layer name is required")]
    MissingLayerName,

    /// Neither a service URL nor a capabilities document was configured.
    #[error("Either a service URL or a capabilities document is required")]
    MissingSource,

    /// Service type is not one of WMS, TMS or WMTS.
    #[error("Unsupported service type '{0}' (expected WMS, TMS or WMTS)")]
    UnsupportedService(String),

    /// Height map too small to sample.
    #[error("Height map must be at least 2×2, got {width}×{height}")]
    InvalidHeightMapSize { width: u32, height: u32 },

    /// Config file could not be read or parsed.
    #[error("Failed to read config file {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    /// A config value could not be interpreted.
    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}
