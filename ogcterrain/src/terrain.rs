//! Terrain adapter.
//!
//! The surface a terrain client talks to: per-tile height grids with a
//! child availability mask, geometric error per level and tile
//! availability.

use std::f64::consts::PI;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::capabilities::{self, CapabilitiesError};
use crate::config::TerrainOptions;
use crate::decode::{self, DecodeError};
use crate::fetch::TileFetcher;
use crate::pipeline::{TileRequest, TileRequestPipeline};
use crate::source::TerrainSource;

/// Errors surfaced by the terrain adapter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TerrainError {
    #[error(transparent)]
    Capabilities(#[from] CapabilitiesError),

    #[error("Terrain source is not ready")]
    NotReady,

    #[error("Tile decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Height samples of one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightTile {
    /// Row-major samples in meters.
    pub samples: Vec<i16>,
    pub width: u32,
    pub height: u32,
    /// Bits 0..3: children (2x,2y), (2x+1,2y), (2x,2y+1), (2x+1,2y+1).
    pub child_mask: u8,
    /// 255 where the sample is at or below zero.
    pub water_mask: Option<Vec<u8>>,
}

impl HeightTile {
    pub fn min(&self) -> Option<i16> {
        self.samples.iter().copied().min()
    }

    pub fn max(&self) -> Option<i16> {
        self.samples.iter().copied().max()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|&s| f64::from(s)).sum();
        Some(sum / self.samples.len() as f64)
    }
}

/// Outcome of a tile request.
#[derive(Debug, Clone, PartialEq)]
pub enum TileResponse {
    Ready(HeightTile),
    /// Too many requests in flight; retry later.
    Busy,
}

/// Adapts a [`TerrainSource`] to a terrain client.
pub struct TerrainAdapter<F: TileFetcher> {
    pipeline: TileRequestPipeline<F>,
    level_zero_error: f64,
    water_mask: bool,
    in_flight: Option<Semaphore>,
}

impl<F: TileFetcher> TerrainAdapter<F> {
    /// Loads the source described by `options` and wraps it.
    pub async fn connect(options: &TerrainOptions, fetcher: F) -> Result<Self, TerrainError> {
        let source = capabilities::load_source(options, &fetcher).await?;
        let mut adapter = Self::new(source, Arc::new(fetcher))?;
        adapter.water_mask = options.water_mask;
        adapter.in_flight = options.max_in_flight.map(Semaphore::new);
        Ok(adapter)
    }

    /// Wraps a parsed source. Fails when the source is not ready.
    pub fn new(source: TerrainSource, fetcher: Arc<F>) -> Result<Self, TerrainError> {
        let Some(scheme) = source.tiling_scheme().filter(|_| source.is_ready()) else {
            return Err(TerrainError::NotReady);
        };

        let level_zero_error = level_zero_maximum_geometric_error(
            scheme.ellipsoid().maximum_radius(),
            source.height_map_size().width,
            scheme.x_tiles_at_level(0),
        );
        info!(
            layer = source.layer_name(),
            level_zero_error = level_zero_error,
            "Terrain adapter ready"
        );

        Ok(Self {
            pipeline: TileRequestPipeline::new(Arc::new(source), fetcher),
            level_zero_error,
            water_mask: false,
            in_flight: None,
        })
    }

    /// Attaches a water mask to every returned tile.
    pub fn with_water_mask(mut self, enabled: bool) -> Self {
        self.water_mask = enabled;
        self
    }

    /// Answers [`TileResponse::Busy`] once `limit` requests are in flight.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.in_flight = Some(Semaphore::new(limit));
        self
    }

    pub fn source(&self) -> &TerrainSource {
        self.pipeline.source()
    }

    pub fn level_zero_maximum_geometric_error(&self) -> f64 {
        self.level_zero_error
    }

    /// Geometric error of a tile at `level`, halving per level.
    pub fn level_maximum_geometric_error(&self, level: u32) -> f64 {
        self.level_zero_error / 2f64.powi(level.min(i32::MAX as u32) as i32)
    }

    pub fn is_tile_available(&self, x: u32, y: u32, level: u32) -> bool {
        self.source().is_tile_available(x, y, level)
    }

    /// Availability bits of the four children of `request`.
    pub fn child_mask(&self, request: TileRequest) -> u8 {
        request
            .children()
            .iter()
            .enumerate()
            .filter(|(_, child)| self.is_tile_available(child.x, child.y, child.level))
            .fold(0, |mask, (bit, _)| mask | (1 << bit))
    }

    /// Fetches and decodes one tile.
    pub async fn request_tile(
        &self,
        x: u32,
        y: u32,
        level: u32,
    ) -> Result<TileResponse, TerrainError> {
        let request = TileRequest::new(x, y, level);

        let _permit = match &self.in_flight {
            Some(semaphore) => match semaphore.try_acquire() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    debug!(tile = %request, "Too many tile requests in flight");
                    return Ok(TileResponse::Busy);
                }
            },
            None => None,
        };

        let samples = self.pipeline.fetch_samples(request).await?;
        let grid = self.source().height_map_size();
        let water_mask = self.water_mask.then(|| decode::water_mask(&samples));

        Ok(TileResponse::Ready(HeightTile {
            samples,
            width: grid.width,
            height: grid.height,
            child_mask: self.child_mask(request),
            water_mask,
        }))
    }
}

/// Geometric error estimate for level zero.
///
/// One quarter of the equator, spread over the samples of the level-zero
/// tile row.
pub fn level_zero_maximum_geometric_error(
    maximum_radius: f64,
    height_map_width: u32,
    x_tiles_at_level_zero: u32,
) -> f64 {
    let samples_per_row = f64::from(height_map_width) * f64::from(x_tiles_at_level_zero);
    maximum_radius * 2.0 * PI * 0.25 / samples_per_row
}
