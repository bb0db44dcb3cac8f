//! Spherical Web Mercator tiling scheme.
//!
//! Native units are projected meters. The square extent spans
//! `±π·a` on both axes, where `a` is the ellipsoid's semi-major axis.

use std::f64::consts::PI;

use super::{tiles_at_level, Ellipsoid, Rectangle, TilingScheme};

/// Web Mercator tiling scheme in meters.
#[derive(Debug, Clone)]
pub struct WebMercatorTilingScheme {
    ellipsoid: Ellipsoid,
    root_x: u32,
    root_y: u32,
    extent: Rectangle,
}

impl WebMercatorTilingScheme {
    /// Creates the default single-root-tile scheme.
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self::with_root_tiles(ellipsoid, 1, 1)
    }

    /// Creates a scheme with a custom level-zero tile layout.
    pub fn with_root_tiles(ellipsoid: Ellipsoid, root_x: u32, root_y: u32) -> Self {
        let half = ellipsoid.maximum_radius() * PI;
        Self {
            ellipsoid,
            root_x,
            root_y,
            extent: Rectangle::new(-half, -half, half, half),
        }
    }
}

impl TilingScheme for WebMercatorTilingScheme {
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
