//! Terrain source options and their defaults.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::ConfigError;
use crate::decode::{ElevationLimits, GridSize};
use crate::format::{ArrayFormat, ImageFormat};

/// Default height map width and height in samples.
pub const DEFAULT_HEIGHT_MAP_SIZE: u32 = 65;

/// Default maximum level (exclusive bound on available levels).
pub const DEFAULT_MAX_LEVEL: u32 = 11;

/// Default elevation offset in meters.
pub const DEFAULT_OFFSET: f64 = 0.0;

/// Default exclusive upper elevation bound in meters.
pub const DEFAULT_HIGHEST: f64 = 12_000.0;

/// Default exclusive lower elevation bound in meters.
pub const DEFAULT_LOWEST: f64 = -500.0;

/// OGC service protocol of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ServiceKind {
    #[default]
    Wms,
    Tms,
    Wmts,
}

impl FromStr for ServiceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WMS" => Ok(ServiceKind::Wms),
            "TMS" => Ok(ServiceKind::Tms),
            "WMTS" => Ok(ServiceKind::Wmts),
            _ => Err(ConfigError::UnsupportedService(s.to_string())),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Wms => write!(f, "WMS"),
            ServiceKind::Tms => write!(f, "TMS"),
            ServiceKind::Wmts => write!(f, "WMTS"),
        }
    }
}

/// Rewrites outbound URLs through a forwarding proxy.
///
/// A URL `u` becomes `<prefix>?<percent-encoded u>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proxy {
    prefix: String,
}

impl Proxy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the proxied form of `url`.
    pub fn url_for(&self, url: &str) -> String {
        format!("{}?{}", self.prefix, urlencoding::encode(url))
    }
}

/// Everything needed to turn a service layer into a terrain source.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainOptions {
    /// Layer (WMS/WMTS) or tile map title (TMS) to load.
    pub layer_name: String,
    /// Base URL of the server. Any query string is stripped.
    pub url: Option<String>,
    /// Capabilities document text, used instead of fetching `url`.
    pub xml: Option<String>,
    /// Service protocol.
    pub service: ServiceKind,
    /// Optional proxy for every outbound request.
    pub proxy: Option<Proxy>,
    /// Output grid width in samples.
    pub height_map_width: u32,
    /// Output grid height in samples.
    pub height_map_height: u32,
    /// Subtracted from raw samples before bounds checks.
    pub offset: f64,
    /// Exclusive upper elevation bound.
    pub highest: f64,
    /// Exclusive lower elevation bound.
    pub lowest: f64,
    /// Style to request. Unknown styles are dropped during parsing.
    pub style_name: Option<String>,
    /// Elevation is rendered through an SLD style (validity flag unreliable).
    pub has_styled_image: bool,
    /// Levels at or above this are never available.
    pub max_level: u32,
    /// Image format to use regardless of what the server advertises.
    pub format_image: Option<ImageFormat>,
    /// Array format to use regardless of what the server advertises.
    pub format_array: Option<ArrayFormat>,
    /// Attach a water mask to every returned tile.
    pub water_mask: bool,
    /// Maximum concurrent tile requests before answering `Busy`.
    pub max_in_flight: Option<usize>,
}

impl TerrainOptions {
    /// Creates options for `layer_name` with default values.
    pub fn new(layer_name: impl Into<String>) -> Self {
        Self {
            layer_name: layer_name.into(),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_xml(mut self, xml: impl Into<String>) -> Self {
        self.xml = Some(xml.into());
        self
    }

    pub fn with_service(mut self, service: ServiceKind) -> Self {
        self.service = service;
        self
    }

    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_height_map_size(mut self, width: u32, height: u32) -> Self {
        self.height_map_width = width;
        self.height_map_height = height;
        self
    }

    pub fn with_limits(mut self, offset: f64, lowest: f64, highest: f64) -> Self {
        self.offset = offset;
        self.lowest = lowest;
        self.highest = highest;
        self
    }

    pub fn with_style(mut self, style_name: impl Into<String>) -> Self {
        self.style_name = Some(style_name.into());
        self
    }

    pub fn with_styled_image(mut self, styled: bool) -> Self {
        self.has_styled_image = styled;
        self
    }

    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn with_format_image(mut self, format: ImageFormat) -> Self {
        self.format_image = Some(format);
        self
    }

    pub fn with_format_array(mut self, format: ArrayFormat) -> Self {
        self.format_array = Some(format);
        self
    }

    pub fn with_water_mask(mut self, water_mask: bool) -> Self {
        self.water_mask = water_mask;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = Some(max_in_flight);
        self
    }

    /// Checks the fatal configuration errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layer_name.trim().is_empty() {
            return Err(ConfigError::MissingLayerName);
        }
        if self.url.is_none() && self.xml.is_none() {
            return Err(ConfigError::MissingSource);
        }
        if self.height_map_width < 2 || self.height_map_height < 2 {
            return Err(ConfigError::InvalidHeightMapSize {
                width: self.height_map_width,
                height: self.height_map_height,
            });
        }
        Ok(())
    }

    /// Configured output grid size.
    pub fn height_map_size(&self) -> GridSize {
        GridSize::new(self.height_map_width, self.height_map_height)
    }

    /// Sanitation bounds for decoded samples.
    pub fn limits(&self) -> ElevationLimits {
        ElevationLimits::new(self.offset, self.lowest, self.highest)
    }

    /// True when images are styled, either explicitly or by naming a style.
    pub fn styled_image(&self) -> bool {
        self.has_styled_image || self.style_name.is_some()
    }

    /// Applies the proxy, if any, to `url`.
    pub fn proxied(&self, url: &str) -> String {
        match &self.proxy {
            Some(proxy) => proxy.url_for(url),
            None => url.to_string(),
        }
    }
}

impl Default for TerrainOptions {
    fn default() -> Self {
        Self {
            layer_name: String::new(),
            url: None,
            xml: None,
            service: ServiceKind::default(),
            proxy: None,
            height_map_width: DEFAULT_HEIGHT_MAP_SIZE,
            height_map_height: DEFAULT_HEIGHT_MAP_SIZE,
            offset: DEFAULT_OFFSET,
            highest: DEFAULT_HIGHEST,
            lowest: DEFAULT_LOWEST,
            style_name: None,
            has_styled_image: false,
            max_level: DEFAULT_MAX_LEVEL,
            format_image: None,
            format_array: None,
            water_mask: false,
            max_in_flight: None,
        }
    }
}
