//! CRS registry.
//!
//! Maps the CRS identifiers advertised by capability documents to an
//! ellipsoid, an axis-order flag and a tiling scheme kind.
//!
//! # Ordering
//!
//! Lookups walk the table in insertion order and return the first match.
//! The WMS parser relies on this: it tries each entry in turn against the
//! layer's bounding boxes and keeps the first one advertised, so table order
//! is the CRS preference order.

use serde::Serialize;

use crate::tiling::{Ellipsoid, TilingKind};

/// One supported coordinate reference system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrsDefinition {
    /// Short name used by WMS bounding boxes and TMS `SRS` nodes (e.g. `EPSG:4326`).
    pub name: String,
    /// URN used by WMTS `SupportedCRS` nodes.
    pub supported_crs: String,
    /// Reference ellipsoid.
    pub ellipsoid: Ellipsoid,
    /// True when the CRS declares latitude as its first axis.
    pub first_axis_is_latitude: bool,
    /// Tiling scheme the CRS maps to.
    pub tiling: TilingKind,
}

impl CrsDefinition {
    fn builtin(
        name: &str,
        supported_crs: &str,
        first_axis_is_latitude: bool,
        tiling: TilingKind,
    ) -> Self {
        Self {
            name: name.to_string(),
            supported_crs: supported_crs.to_string(),
            ellipsoid: Ellipsoid::WGS84,
            first_axis_is_latitude,
            tiling,
        }
    }
}

/// Ordered table of supported CRSs.
#[derive(Debug, Clone, PartialEq)]
pub struct CrsRegistry {
    entries: Vec<CrsDefinition>,
}

impl CrsRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, definition: CrsDefinition) -> Self {
        self.entries.push(definition);
        self
    }

    /// Appends a definition after every existing entry, so lookups only
    /// reach it when no earlier entry matches.
    pub fn push(&mut self, definition: CrsDefinition) {
        self.entries.push(definition);
    }

    /// All definitions in priority order.
    pub fn entries(&self) -> &[CrsDefinition] {
        &self.entries
    }

    /// First definition whose short name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&CrsDefinition> {
        self.entries.iter().find(|crs| crs.name == name)
    }

    /// First definition whose URN equals `supported_crs`.
    pub fn find_by_supported_crs(&self, supported_crs: &str) -> Option<&CrsDefinition> {
        self.entries
            .iter()
            .find(|crs| crs.supported_crs == supported_crs)
    }
}

impl Default for CrsRegistry {
    fn default() -> Self {
        Self {
            entries: vec![
                CrsDefinition::builtin(
                    "CRS:84",
                    "urn:ogc:def:crs:OGC:2:84",
                    false,
                    TilingKind::Geographic,
                ),
                CrsDefinition::builtin(
                    "EPSG:4326",
                    "urn:ogc:def:crs:EPSG::4326",
                    true,
                    TilingKind::Geographic,
                ),
                CrsDefinition::builtin(
                    "EPSG:3857",
                    "urn:ogc:def:crs:EPSG::3857",
                    false,
                    TilingKind::WebMercator,
                ),
                CrsDefinition::builtin(
                    "OSGEO:41001",
                    "urn:ogc:def:crs:EPSG::3857",
                    false,
                    TilingKind::WebMercator,
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_order() {
        let registry = CrsRegistry::default();
        let entries = registry.entries();
        let names: Vec<_> = entries.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["CRS:84", "EPSG:4326", "EPSG:3857", "OSGEO:41001"]
        );
    }

    #[test]
    fn test_find_by_name_exact_match_only() {
        let registry = CrsRegistry::default();
        assert!(registry.find_by_name("EPSG:4326").is_some());
        assert!(registry.find_by_name("epsg:4326").is_none());
        assert!(registry.find_by_name("EPSG:2154").is_none());
    }

    #[test]
    fn test_find_by_supported_crs_returns_first_entry() {
        let registry = CrsRegistry::default();
        let crs = registry
            .find_by_supported_crs("urn:ogc:def:crs:EPSG::3857")
            .unwrap();
        assert_eq!(crs.name, "EPSG:3857");
        assert_eq!(crs.tiling, TilingKind::WebMercator);
    }

    #[test]
    fn test_latitude_first_flag() {
        let registry = CrsRegistry::default();
        let geographic = registry.find_by_name("EPSG:4326").unwrap();
        assert!(geographic.first_axis_is_latitude);
        let lon_lat = registry.find_by_name("CRS:84").unwrap();
        assert!(!lon_lat.first_axis_is_latitude);
    }

    #[test]
    fn test_custom_entry_appended_last() {
        let registry = CrsRegistry::empty().with(CrsDefinition {
            name: "EPSG:900913".to_string(),
            supported_crs: "urn:ogc:def:crs:EPSG::900913".to_string(),
            ellipsoid: Ellipsoid::WGS84,
            first_axis_is_latitude: false,
            tiling: TilingKind::WebMercator,
        });
        assert_eq!(registry.entries().len(), 1);
        assert!(registry.find_by_name("EPSG:900913").is_some());
    }

    #[test]
    fn test_pushed_entry_loses_to_earlier_match() {
        let mut registry = CrsRegistry::default();
        registry.push(CrsDefinition {
            name: "EPSG:4326".to_string(),
            supported_crs: "urn:ogc:def:crs:EPSG::4326".to_string(),
            ellipsoid: Ellipsoid::WGS84,
            first_axis_is_latitude: false,
            tiling: TilingKind::WebMercator,
        });

        assert_eq!(registry.entries().len(), 5);
        let found = registry.find_by_name("EPSG:4326").unwrap();
        assert_eq!(found.tiling, TilingKind::Geographic);
        assert!(found.first_axis_is_latitude);
    }
}
