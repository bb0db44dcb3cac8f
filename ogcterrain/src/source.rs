//! Normalized terrain source.
//!
//! Every capabilities parser produces a [`TerrainSource`]. The source is
//! immutable once built and is shared by all concurrent tile requests.
//!
//! URL templates are plain data ([`UrlTemplate`]) rendered per tile address,
//! and tile availability is a plain predicate description ([`Availability`])
//! evaluated against the source's tiling scheme.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{Proxy, ServiceKind, TerrainOptions};
use crate::decode::{ElevationLimits, GridSize};
use crate::format::{ArrayTransport, ImageTransport};
use crate::tiling::{Rectangle, TilingScheme};

/// Token replaced by the per-level matrix identifier in WMTS templates.
pub const TILE_MATRIX_TOKEN: &str = "{TileMatrix}";

/// URL template for one transport.
///
/// Templates still contain the per-tile tokens (`{west}`, `{x}`, `{tmsY}`, ...)
/// which the request pipeline substitutes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UrlTemplate {
    /// The same template for every tile.
    Fixed(String),
    /// One template per level, keyed by level.
    PerLevel(BTreeMap<u32, String>),
    /// One template whose `{TileMatrix}` token is the identifier of the
    /// matrix serving each level. Index in `matrix_ids` is the level.
    Matrix {
        template: String,
        matrix_ids: Vec<String>,
    },
}

impl UrlTemplate {
    /// Template for tiles of `level`, or `None` when the level has none.
    pub fn for_level(&self, level: u32) -> Option<String> {
        match self {
            UrlTemplate::Fixed(template) => Some(template.clone()),
            UrlTemplate::PerLevel(levels) => levels.get(&level).cloned(),
            UrlTemplate::Matrix {
                template,
                matrix_ids,
            } => matrix_ids
                .get(level as usize)
                .map(|id| template.replacen(TILE_MATRIX_TOKEN, id, 1)),
        }
    }
}

/// Explicit row/column range of a tile matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileMatrixLimits {
    pub min_tile_row: u32,
    pub max_tile_row: u32,
    pub min_tile_col: u32,
    pub max_tile_col: u32,
}

/// One WMTS tile matrix, in level order once parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileMatrix {
    pub id: String,
    /// Number of tile columns.
    pub matrix_width: u32,
    /// Number of tile rows.
    pub matrix_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub scale_denominator: f64,
    /// Set when the layer publishes limits for this matrix.
    pub limits: Option<TileMatrixLimits>,
}

impl TileMatrix {
    /// True when the matrix holds tile `(x, y)`.
    ///
    /// Matrices with limits are bounded by them (inclusive); others only by
    /// their width and height.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        match &self.limits {
            Some(limits) => {
                (limits.min_tile_row..=limits.max_tile_row).contains(&y)
                    && (limits.min_tile_col..=limits.max_tile_col).contains(&x)
            }
            None => x < self.matrix_width && y < self.matrix_height,
        }
    }
}

/// Tile availability predicate of a source.
///
/// Every variant is false at or above `max_level`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Availability {
    /// Tiles intersecting a reference bounding box (WMS).
    Extent { bounds: Rectangle, max_level: u32 },
    /// Tiles intersecting a bounding box on a published level (TMS).
    TileSets {
        bounds: Rectangle,
        max_level: u32,
        levels: Vec<u32>,
    },
    /// Tiles inside the matrix serving their level (WMTS).
    Matrices {
        max_level: u32,
        matrices: Vec<TileMatrix>,
    },
}

impl Availability {
    /// Evaluates the predicate for tile `(x, y)` at `level`.
    pub fn is_available(&self, scheme: &dyn TilingScheme, x: u32, y: u32, level: u32) -> bool {
        match self {
            Availability::Extent { bounds, max_level } => {
                level < *max_level
                    && bounds.intersects(&scheme.tile_to_native_rectangle(x, y, level))
            }
            Availability::TileSets {
                bounds,
                max_level,
                levels,
            } => {
                level < *max_level
                    && levels.contains(&level)
                    && bounds.intersects(&scheme.tile_to_native_rectangle(x, y, level))
            }
            Availability::Matrices {
                max_level,
                matrices,
            } => {
                level < *max_level
                    && matrices
                        .get(level as usize)
                        .is_some_and(|matrix| matrix.contains(x, y))
            }
        }
    }
}

/// Image transport chosen for a source, with its URL template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageEndpoint {
    pub transport: ImageTransport,
    pub template: UrlTemplate,
}

/// Array transport chosen for a source, with its URL template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayEndpoint {
    pub transport: ArrayTransport,
    pub template: UrlTemplate,
}

/// A service layer normalized for quadtree tile requests.
#[derive(Debug, Clone)]
pub struct TerrainSource {
    pub(crate) service: ServiceKind,
    pub(crate) layer_name: String,
    pub(crate) ready: bool,
    pub(crate) crs: Option<String>,
    pub(crate) tiling_scheme: Option<Arc<dyn TilingScheme>>,
    pub(crate) height_map: GridSize,
    pub(crate) maximum_level: u32,
    pub(crate) limits: ElevationLimits,
    pub(crate) has_styled_image: bool,
    pub(crate) style_name: Option<String>,
    pub(crate) image: Option<ImageEndpoint>,
    pub(crate) array: Option<ArrayEndpoint>,
    pub(crate) availability: Option<Availability>,
    pub(crate) image_size: Option<GridSize>,
    pub(crate) proxy: Option<Proxy>,
}

impl TerrainSource {
    /// Creates a not-ready source carrying the option values every
    /// parser copies unchanged.
    pub(crate) fn from_options(options: &TerrainOptions) -> Self {
        Self {
            service: options.service,
            layer_name: options.layer_name.clone(),
            ready: false,
            crs: None,
            tiling_scheme: None,
            height_map: options.height_map_size(),
            maximum_level: options.max_level,
            limits: options.limits(),
            has_styled_image: options.styled_image(),
            style_name: None,
            image: None,
            array: None,
            availability: None,
            image_size: None,
            proxy: options.proxy.clone(),
        }
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    /// True once a CRS, a transport format and a tiling scheme were found.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Name of the selected CRS.
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn tiling_scheme(&self) -> Option<&Arc<dyn TilingScheme>> {
        self.tiling_scheme.as_ref()
    }

    /// Output grid dimensions.
    pub fn height_map_size(&self) -> GridSize {
        self.height_map
    }

    pub fn maximum_level(&self) -> u32 {
        self.maximum_level
    }

    pub fn limits(&self) -> &ElevationLimits {
        &self.limits
    }

    pub fn has_styled_image(&self) -> bool {
        self.has_styled_image
    }

    /// Style requested from the server, if it was advertised.
    pub fn style_name(&self) -> Option<&str> {
        self.style_name.as_deref()
    }

    pub fn image(&self) -> Option<&ImageEndpoint> {
        self.image.as_ref()
    }

    pub fn array(&self) -> Option<&ArrayEndpoint> {
        self.array.as_ref()
    }

    pub fn availability(&self) -> Option<&Availability> {
        self.availability.as_ref()
    }

    /// Raster size requested from the server, when uniform.
    pub fn image_size(&self) -> Option<GridSize> {
        self.image_size
    }

    /// Applies the source's proxy, if any, to a tile URL.
    pub fn proxied(&self, url: &str) -> String {
        match &self.proxy {
            Some(proxy) => proxy.url_for(url),
            None => url.to_string(),
        }
    }

    /// True when tile `(x, y)` at `level` has data.
    ///
    /// Always false for a source that is not ready.
    pub fn is_tile_available(&self, x: u32, y: u32, level: u32) -> bool {
        match (&self.tiling_scheme, &self.availability) {
            (Some(scheme), Some(availability)) => {
                availability.is_available(scheme.as_ref(), x, y, level)
            }
            _ => false,
        }
    }

    /// Image URL template for a tile, before token substitution.
    pub fn image_template(&self, x: u32, y: u32, level: u32) -> Option<String> {
        let endpoint = self.image.as_ref()?;
        self.gated_template(&endpoint.template, x, y, level)
    }

    /// Array URL template for a tile, before token substitution.
    pub fn array_template(&self, x: u32, y: u32, level: u32) -> Option<String> {
        let endpoint = self.array.as_ref()?;
        self.gated_template(&endpoint.template, x, y, level)
    }

    // Matrix templates only render for tiles inside their matrix.
    fn gated_template(&self, template: &UrlTemplate, x: u32, y: u32, level: u32) -> Option<String> {
        if matches!(template, UrlTemplate::Matrix { .. }) && !self.is_tile_available(x, y, level) {
            return None;
        }
        template.for_level(level)
    }

    /// Serializable overview of the source.
    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            service: self.service,
            layer_name: self.layer_name.clone(),
            ready: self.ready,
            crs: self.crs.clone(),
            level_zero_tiles: self
                .tiling_scheme
                .as_ref()
                .map(|scheme| (scheme.x_tiles_at_level(0), scheme.y_tiles_at_level(0))),
            height_map: self.height_map,
            image_size: self.image_size,
            maximum_level: self.maximum_level,
            limits: self.limits,
            has_styled_image: self.has_styled_image,
            style_name: self.style_name.clone(),
            image_format: self.image.as_ref().map(|e| e.transport.format.mime.clone()),
            array_format: self.array.as_ref().map(|e| e.transport.format.mime.clone()),
        }
    }
}

/// Flat, serializable description of a [`TerrainSource`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub service: ServiceKind,
    pub layer_name: String,
    pub ready: bool,
    pub crs: Option<String>,
    pub level_zero_tiles: Option<(u32, u32)>,
    pub height_map: GridSize,
    pub image_size: Option<GridSize>,
    pub maximum_level: u32,
    pub limits: ElevationLimits,
    pub has_styled_image: bool,
    pub style_name: Option<String>,
    pub image_format: Option<String>,
    pub array_format: Option<String>,
}
