//! Tiling scheme capability.
//!
//! A tiling scheme maps a quadtree tile address to a rectangle expressed in
//! the native units of its CRS: degrees for geographic schemes, meters for
//! Web Mercator. Parsers pick a scheme through the CRS registry and the rest
//! of the crate only talks to the [`TilingScheme`] trait.

mod geographic;
mod web_mercator;

pub use geographic::GeographicTilingScheme;
pub use web_mercator::WebMercatorTilingScheme;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Reference ellipsoid used by a tiling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ellipsoid {
    /// Radius along the X axis in meters.
    pub radius_x: f64,
    /// Radius along the Y axis in meters.
    pub radius_y: f64,
    /// Radius along the Z (polar) axis in meters.
    pub radius_z: f64,
}

impl Ellipsoid {
    /// WGS84 ellipsoid.
    pub const WGS84: Ellipsoid = Ellipsoid {
        radius_x: 6_378_137.0,
        radius_y: 6_378_137.0,
        radius_z: 6_356_752.314_245_179,
    };

    /// Largest of the three radii.
    pub fn maximum_radius(&self) -> f64 {
        self.radius_x.max(self.radius_y).max(self.radius_z)
    }
}

/// Axis-aligned rectangle in the native units of a tiling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rectangle {
    /// Creates a rectangle from its four edges.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Width in native units.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height in native units.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Returns the overlap of two rectangles.
    ///
    /// Rectangles that only touch along an edge or a corner do not intersect.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let west = self.west.max(other.west);
        let east = self.east.min(other.east);
        let south = self.south.max(other.south);
        let north = self.north.min(other.north);

        if east > west && north > south {
            Some(Rectangle::new(west, south, east, north))
        } else {
            None
        }
    }

    /// Returns true when the two rectangles share a non-empty area.
    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.intersection(other).is_some()
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.west, self.south, self.east, self.north
        )
    }
}

/// Maps tile addresses to native rectangles for one CRS.
///
/// Implementations must be cheap to call: the availability predicate and the
/// request pipeline invoke them once per tile (and four more times for the
/// child mask).
pub trait TilingScheme: Send + Sync + fmt::Debug {
    /// Ellipsoid the scheme is defined on.
    fn ellipsoid(&self) -> &Ellipsoid;

    /// Number of tile columns at `level`.
    fn x_tiles_at_level(&self, level: u32) -> u32;

    /// Number of tile rows at `level`.
    fn y_tiles_at_level(&self, level: u32) -> u32;

    /// Native rectangle covered by tile `(x, y)` at `level`.
    ///
    /// Rows increase southward: row 0 touches the northern edge.
    fn tile_to_native_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle;
}

/// Kind of tiling scheme a CRS is tiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TilingKind {
    /// Equirectangular lon/lat grid, two root tiles by default.
    Geographic,
    /// Spherical Web Mercator grid, one root tile by default.
    WebMercator,
}

impl TilingKind {
    /// Builds a scheme with the default number of root tiles.
    pub fn build(self, ellipsoid: Ellipsoid) -> Arc<dyn TilingScheme> {
        match self {
            TilingKind::Geographic => Arc::new(GeographicTilingScheme::new(ellipsoid)),
            TilingKind::WebMercator => Arc::new(WebMercatorTilingScheme::new(ellipsoid)),
        }
    }

    /// Builds a scheme whose level zero has `root_x` × `root_y` tiles.
    ///
    /// Zero counts are raised to one.
    pub fn build_with_root(
        self,
        ellipsoid: Ellipsoid,
        root_x: u32,
        root_y: u32,
    ) -> Arc<dyn TilingScheme> {
        let root_x = root_x.max(1);
        let root_y = root_y.max(1);
        match self {
            TilingKind::Geographic => Arc::new(GeographicTilingScheme::with_root_tiles(
                ellipsoid, root_x, root_y,
            )),
            TilingKind::WebMercator => Arc::new(WebMercatorTilingScheme::with_root_tiles(
                ellipsoid, root_x, root_y,
            )),
        }
    }
}

/// Tiles along one axis at `level`, saturating instead of overflowing.
pub(crate) fn tiles_at_level(root: u32, level: u32) -> u32 {
    root.checked_shl(level)
        .filter(|count| count >> level == root)
        .unwrap_or(u32::MAX)
}
