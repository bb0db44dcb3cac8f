//! Equirectangular (lon/lat) tiling scheme.
//!
//! Native units are degrees. The full extent is `[-180, -90, 180, 90]` and
//! level zero is split into two tiles horizontally unless configured
//! otherwise.

use super::{tiles_at_level, Ellipsoid, Rectangle, TilingScheme};

/// Geographic tiling scheme in degrees.
#[derive(Debug, Clone)]
pub struct GeographicTilingScheme {
    ellipsoid: Ellipsoid,
    root_x: u32,
    root_y: u32,
    extent: Rectangle,
}

impl GeographicTilingScheme {
    /// Creates the default 2×1 root scheme.
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self::with_root_tiles(ellipsoid, 2, 1)
    }

    /// Creates a scheme with a custom level-zero tile layout.
    pub fn with_root_tiles(ellipsoid: Ellipsoid, root_x: u32, root_y: u32) -> Self {
        Self {
            ellipsoid,
            root_x,
            root_y,
            extent: Rectangle::new(-180.0, -90.0, 180.0, 90.0),
        }
    }
}

impl TilingScheme for GeographicTilingScheme {
    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    fn x_tiles_at_level(&self, level: u32) -> u32 {
        tiles_at_level(self.root_x, level)
    }

    fn y_tiles_at_level(&self, level: u32) -> u32 {
        tiles_at_level(self.root_y, level)
    }

    fn tile_to_native_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle {
        let tile_width = self.extent.width() / self.x_tiles_at_level(level) as f64;
        let tile_height = self.extent.height() / self.y_tiles_at_level(level) as f64;

        let west = self.extent.west + x as f64 * tile_width;
        let north = self.extent.north - y as f64 * tile_height;

        Rectangle::new(west, north - tile_height, west + tile_width, north)
    }
}
