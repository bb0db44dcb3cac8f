//! OGC Terrain - elevation tiles from OGC raster services
//!
//! Reads WMS, TMS or WMTS capability documents, normalizes them into a
//! [`source::TerrainSource`] and serves per-tile height grids decoded from
//! the server's binary arrays or elevation-encoded images.
//!
//! # High-Level API
//!
//! The [`terrain`] module is the entry point for most callers:
//!
//! ```ignore
//! use ogcterrain::config::TerrainOptions;
//! use ogcterrain::fetch::{AsyncReqwestClient, HttpTileFetcher};
//! use ogcterrain::terrain::{TerrainAdapter, TileResponse};
//!
//! let options = TerrainOptions::new("srtm30").with_url("https://example.org/geoserver/wms");
//! let fetcher = HttpTileFetcher::new(AsyncReqwestClient::new()?);
//! let adapter = TerrainAdapter::connect(&options, fetcher).await?;
//!
//! if let TileResponse::Ready(tile) = adapter.request_tile(0, 0, 0).await? {
//!     println!("{} samples, child mask {}", tile.samples.len(), tile.child_mask);
//! }
//! ```

pub mod capabilities;
pub mod config;
pub mod crs;
pub mod decode;
pub mod fetch;
pub mod format;
pub mod logging;
pub mod pipeline;
pub mod source;
pub mod terrain;
pub mod tiling;

pub use config::{ServiceKind, TerrainOptions};
pub use source::TerrainSource;
pub use terrain::{HeightTile, TerrainAdapter, TerrainError, TileResponse};

/// Version of the library and CLI, shared across the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
