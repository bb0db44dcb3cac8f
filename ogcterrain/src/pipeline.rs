//! Tile request pipeline.
//!
//! For one tile address: compute the tile rectangle, widen it by half a
//! sample spacing on every edge, render the source's URL template, fetch
//! through the [`TileFetcher`] and decode the result.
//!
//! The array transport is preferred over the image transport when a source
//! has both. Fetch failures never surface: the tile degrades to an all-zero
//! grid of the expected size. A binary buffer of the wrong size is still an
//! error, since it means client and server disagree on the grid.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::decode::{self, GridSize};
use crate::fetch::TileFetcher;
use crate::source::TerrainSource;
use crate::terrain::TerrainError;
use crate::tiling::{Rectangle, TilingScheme};

/// Address of one quadtree tile.
///
/// Rows increase southward from the northern edge of the tiling scheme.
///
/// # Example
///
/// ```
/// use ogcterrain::pipeline::TileRequest;
///
/// let request = TileRequest::new(3, 1, 2);
/// assert_eq!(request.x, 3);
/// assert_eq!(request.to_string(), "2/3/1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRequest {
    pub x: u32,
    pub y: u32,
    pub level: u32,
}

impl TileRequest {
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { x, y, level }
    }

    /// The four children at `level + 1`, in child-mask bit order.
    pub fn children(&self) -> [TileRequest; 4] {
        let x = self.x.saturating_mul(2);
        let y = self.y.saturating_mul(2);
        let level = self.level.saturating_add(1);
        [
            TileRequest::new(x, y, level),
            TileRequest::new(x.saturating_add(1), y, level),
            TileRequest::new(x, y.saturating_add(1), level),
            TileRequest::new(x.saturating_add(1), y.saturating_add(1), level),
        ]
    }
}

impl fmt::Display for TileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

/// Per-tile values substituted into a URL template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePlaceholders {
    /// Tile rectangle widened by half a sample spacing.
    pub rectangle: Rectangle,
    pub x: u32,
    pub y: u32,
    /// Row counted from the southern edge.
    pub tms_y: u32,
}

impl TilePlaceholders {
    /// Computes the placeholders of `request` for a `grid`-sized output.
    pub fn compute(scheme: &dyn TilingScheme, request: TileRequest, grid: GridSize) -> Self {
        let rect = scheme.tile_to_native_rectangle(request.x, request.y, request.level);
        let half_x = half_spacing(rect.width(), grid.width);
        let half_y = half_spacing(rect.height(), grid.height);

        let y_tiles = scheme.y_tiles_at_level(request.level);
        Self {
            rectangle: Rectangle::new(
                rect.west - half_x,
                rect.south - half_y,
                rect.east + half_x,
                rect.north + half_y,
            ),
            x: request.x,
            y: request.y,
            tms_y: y_tiles.saturating_sub(request.y).saturating_sub(1),
        }
    }
}

// Samples sit on cell centers; the server expects edge-to-edge extents.
fn half_spacing(extent: f64, samples: u32) -> f64 {
    if samples > 1 {
        extent / f64::from(samples - 1) * 0.5
    } else {
        0.0
    }
}

/// Substitutes the per-tile tokens of a URL template.
///
/// Tokens: `{west}`, `{south}`, `{east}`, `{north}`, `{x}`, `{y}`, `{tmsY}`.
/// Only the first occurrence of each token is replaced.
pub fn render_url(template: &str, placeholders: &TilePlaceholders) -> String {
    let rect = &placeholders.rectangle;
    template
        .replacen("{west}", &rect.west.to_string(), 1)
        .replacen("{south}", &rect.south.to_string(), 1)
        .replacen("{east}", &rect.east.to_string(), 1)
        .replacen("{north}", &rect.north.to_string(), 1)
        .replacen("{x}", &placeholders.x.to_string(), 1)
        .replacen("{y}", &placeholders.y.to_string(), 1)
        .replacen("{tmsY}", &placeholders.tms_y.to_string(), 1)
}

/// Which transport a tile request goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Array,
    Image,
}

/// Fetches and decodes tiles of one source.
pub struct TileRequestPipeline<F: TileFetcher> {
    source: Arc<TerrainSource>,
    fetcher: Arc<F>,
}

impl<F: TileFetcher> TileRequestPipeline<F> {
    pub fn new(source: Arc<TerrainSource>, fetcher: Arc<F>) -> Self {
        Self { source, fetcher }
    }

    pub fn source(&self) -> &Arc<TerrainSource> {
        &self.source
    }

    /// Transport used for every request of this source.
    pub fn transport(&self) -> Option<Transport> {
        if self.source.array().is_some() {
            Some(Transport::Array)
        } else if self.source.image().is_some() {
            Some(Transport::Image)
        } else {
            None
        }
    }

    /// Concrete, proxied URL for a tile, or `None` when the source renders
    /// no URL for it.
    pub fn url_for(&self, request: TileRequest) -> Result<Option<String>, TerrainError> {
        let source = &self.source;
        let scheme = source.tiling_scheme().ok_or(TerrainError::NotReady)?;
        let template = match self.transport().ok_or(TerrainError::NotReady)? {
            Transport::Array => source.array_template(request.x, request.y, request.level),
            Transport::Image => source.image_template(request.x, request.y, request.level),
        };

        Ok(template.map(|template| {
            let placeholders =
                TilePlaceholders::compute(scheme.as_ref(), request, source.height_map_size());
            source.proxied(&render_url(&template, &placeholders))
        }))
    }

    /// Fetches and decodes the sample grid of a tile.
    pub async fn fetch_samples(&self, request: TileRequest) -> Result<Vec<i16>, TerrainError> {
        let transport = self.transport().ok_or(TerrainError::NotReady)?;
        let grid = self.source.height_map_size();

        let Some(url) = self.url_for(request)? else {
            debug!(tile = %request, "No URL for tile, using empty grid");
            return Ok(empty_grid(grid));
        };
        trace!(tile = %request, url = %url, "Requesting tile");

        match transport {
            Transport::Array => self.fetch_array(request, &url, grid).await,
            Transport::Image => Ok(self.fetch_image(request, &url, grid).await),
        }
    }

    async fn fetch_array(
        &self,
        request: TileRequest,
        url: &str,
        grid: GridSize,
    ) -> Result<Vec<i16>, TerrainError> {
        let Some(array) = self.source.array() else {
            return Err(TerrainError::NotReady);
        };

        match self.fetcher.fetch_bytes(url).await {
            Ok(buffer) => {
                let format = &array.transport.format;
                Ok(format.decode(&buffer, grid, self.source.limits())?)
            }
            Err(e) => {
                warn!(
                    tile = %request,
                    url = url,
                    error = %e,
                    "Tile fetch failed, using empty grid"
                );
                Ok(empty_grid(grid))
            }
        }
    }

    async fn fetch_image(&self, request: TileRequest, url: &str, grid: GridSize) -> Vec<i16> {
        match self.fetcher.fetch_image(url).await {
            Ok(pixels) => decode::decode_image_pixels(
                &pixels,
                grid,
                self.source.limits(),
                self.source.has_styled_image(),
            ),
            Err(e) => {
                warn!(
                    tile = %request,
                    url = url,
                    error = %e,
                    "Tile fetch failed, using empty grid"
                );
                empty_grid(grid)
            }
        }
    }
}

fn empty_grid(grid: GridSize) -> Vec<i16> {
    vec![0; grid.cell_count()]
}
