//! WMS capabilities parser.
//!
//! Versions 1.3 and later declare bounding boxes in the axis order of the
//! CRS, so latitude-first CRSs (EPSG:4326) swap the bbox axes both when
//! reading the layer extent and when writing the GetMap `bbox` parameter.
//! Older versions always use longitude first and name the parameter `srs`.

use std::sync::OnceLock;

use regex::Regex;
use roxmltree::Node;
use tracing::debug;

use super::{strip_query, xml, CapabilitiesError};
use crate::config::TerrainOptions;
use crate::crs::{CrsDefinition, CrsRegistry};
use crate::decode::GridSize;
use crate::format::{ArrayTransport, FormatRegistry, ImageTransport};
use crate::source::{ArrayEndpoint, Availability, ImageEndpoint, TerrainSource, UrlTemplate};
use crate::tiling::Rectangle;

/// bbox tokens for latitude-first axis order.
const BBOX_LATITUDE_FIRST: &str = "{south},{west},{north},{east}";

/// bbox tokens for longitude-first axis order.
const BBOX_LONGITUDE_FIRST: &str = "{west},{south},{east},{north}";

fn new_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^1\.[3-9]\.").unwrap())
}

/// True for WMS versions 1.3 and later.
pub fn is_new_version(version: &str) -> bool {
    new_version_pattern().is_match(version)
}

/// Parses a WMS capabilities document.
///
/// Returns a source with `is_ready() == false` when the layer, a supported
/// CRS, a supported format or the protocol version is missing.
pub fn parse(
    text: &str,
    options: &TerrainOptions,
    crs_registry: &CrsRegistry,
    formats: &FormatRegistry,
) -> Result<TerrainSource, CapabilitiesError> {
    let doc = xml::parse_document(text)?;
    let root = doc.root_element();
    let mut source = TerrainSource::from_options(options);
    let layer_name = options.layer_name.as_str();

    let version = xml::version(&doc);
    let new_version = version.is_some_and(is_new_version);

    let get_map = xml::descendants(root, "Request").find_map(|r| xml::child(r, "GetMap"));
    let base_url = get_map
        .and_then(|g| xml::descendant(g, "OnlineResource"))
        .and_then(xml::href)
        .map(strip_query);

    // Formats, in document order; pinned formats win
    let advertised: Vec<&str> = get_map
        .map(|g| xml::children(g, "Format").filter_map(xml::text).collect())
        .unwrap_or_default();
    let image_format = options.format_image.clone().or_else(|| {
        advertised
            .iter()
            .find_map(|mime| formats.image_by_mime(mime))
            .cloned()
    });
    let array_format = options.format_array.clone().or_else(|| {
        advertised
            .iter()
            .find_map(|mime| formats.array_by_mime(mime))
            .cloned()
    });

    let layer = xml::descendants(root, "Layer")
        .filter(|l| matches!(l.attribute("queryable"), Some("1") | Some("true")))
        .find(|l| xml::child_text(*l, "Name") == Some(layer_name));

    // Fixed sizes clamp the output grid but set the requested raster directly
    let mut height_map = options.height_map_size();
    let mut requested = height_map;
    if let Some(layer) = layer {
        let fixed = |name: &str| xml::attribute_parse::<u32>(layer, name).filter(|v| *v > 0);
        if let Some(height) = fixed("fixedHeight") {
            height_map.height = height_map.height.min(height);
            requested.height = height;
        }
        if let Some(width) = fixed("fixedWidth") {
            height_map.width = height_map.width.min(width);
            requested.width = width;
        }
    }
    source.height_map = height_map;

    let (Some(layer), Some(version)) = (layer, version) else {
        debug!(layer = layer_name, "WMS layer or version not found");
        return Ok(source);
    };

    // First registry CRS the layer advertises a bounding box for
    let selected = crs_registry.entries().iter().find_map(|crs| {
        bounding_box(layer, &crs.name)
            .and_then(|bbox| read_extent(bbox, new_version && crs.first_axis_is_latitude))
            .map(|extent| (crs, extent))
    });

    let style = options.style_name.clone().filter(|style| {
        xml::descendants(layer, "Style")
            .filter_map(|s| xml::child_text(s, "Name"))
            .any(|name| name == style.as_str())
    });

    if let Some((crs, _)) = &selected {
        if let Some(size) = vendor_tile_size(root, layer_name, crs) {
            requested = size;
        }
    }

    let ready = selected.is_some() && (image_format.is_some() || array_format.is_some());
    let (Some((crs, extent)), Some(base_url), true) = (selected, base_url, ready) else {
        debug!(layer = layer_name, "WMS layer has no usable CRS or format");
        return Ok(source);
    };

    let swap_axes = new_version && crs.first_axis_is_latitude;
    let template = get_map_template(base_url, layer_name, version, new_version, swap_axes, crs);

    if let Some(format) = image_format {
        let mut url = format!(
            "{}&format={}&width={}&height={}",
            template, format.mime, requested.width, requested.height
        );
        if let Some(style) = &style {
            url.push_str(&format!("&styles={}&style={}", style, style));
        }
        debug!(template = %url, "WMS image template");
        source.image = Some(ImageEndpoint {
            transport: ImageTransport::new(format),
            template: UrlTemplate::Fixed(url),
        });
        source.image_size = Some(requested);
    }

    if let Some(format) = array_format {
        let url = format!(
            "{}&format={}&width={}&height={}",
            template, format.mime, height_map.width, height_map.height
        );
        debug!(template = %url, "WMS array template");
        source.array = Some(ArrayEndpoint {
            transport: ArrayTransport::new(format),
            template: UrlTemplate::Fixed(url),
        });
    }

    source.tiling_scheme = Some(crs.tiling.build(crs.ellipsoid));
    source.availability = Some(Availability::Extent {
        bounds: extent,
        max_level: options.max_level,
    });
    source.crs = Some(crs.name.clone());
    source.style_name = style;
    source.ready = true;

    Ok(source)
}

/// Static part of a GetMap URL, up to and including the CRS.
fn get_map_template(
    base_url: &str,
    layer_name: &str,
    version: &str,
    new_version: bool,
    swap_axes: bool,
    crs: &CrsDefinition,
) -> String {
    let bbox = if swap_axes {
        BBOX_LATITUDE_FIRST
    } else {
        BBOX_LONGITUDE_FIRST
    };
    let crs_param = if new_version { "crs" } else { "srs" };
    format!(
        "{}?SERVICE=WMS&REQUEST=GetMap&layers={}&version={}&bbox={}&{}={}",
        base_url, layer_name, version, bbox, crs_param, crs.name
    )
}

/// Bounding box declared for `crs_name` under either `SRS` or `CRS`.
fn bounding_box<'a, 'input>(node: Node<'a, 'input>, crs_name: &str) -> Option<Node<'a, 'input>> {
    xml::descendants(node, "BoundingBox").find(|bbox| {
        bbox.attribute("SRS") == Some(crs_name) || bbox.attribute("CRS") == Some(crs_name)
    })
}

/// Reads a bounding box as west/south/east/north.
fn read_extent(bbox: Node<'_, '_>, swap_axes: bool) -> Option<Rectangle> {
    let minx: f64 = xml::attribute_parse(bbox, "minx")?;
    let miny: f64 = xml::attribute_parse(bbox, "miny")?;
    let maxx: f64 = xml::attribute_parse(bbox, "maxx")?;
    let maxy: f64 = xml::attribute_parse(bbox, "maxy")?;

    Some(if swap_axes {
        Rectangle::new(miny, minx, maxy, maxx)
    } else {
        Rectangle::new(minx, miny, maxx, maxy)
    })
}

/// Tile size of the first vendor `TileSet` serving `layer_name` in `crs`.
fn vendor_tile_size(root: Node<'_, '_>, layer_name: &str, crs: &CrsDefinition) -> Option<GridSize> {
    let tile_set = xml::descendants(root, "VendorSpecificCapabilities")
        .flat_map(|vendor| xml::children(vendor, "TileSet"))
        .find(|ts| {
            xml::child_text(*ts, "Layers") == Some(layer_name)
                && bounding_box(*ts, &crs.name).is_some()
        })?;

    let width: u32 = xml::child_parse(tile_set, "Width")?;
    let height: u32 = xml::child_parse(tile_set, "Height")?;
    debug!(width, height, "WMS vendor tile set overrides raster size");
    Some(GridSize::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ArrayEncoding, ArrayFormat, ImageFormat};
    use crate::tiling::{Ellipsoid, TilingKind};

    struct Doc<'a> {
        version: Option<&'a str>,
        bbox_attr: &'a str,
        crs: &'a str,
        bbox: (f64, f64, f64, f64),
        formats: &'a [&'a str],
        layer_attrs: &'a str,
        layer_extra: &'a str,
        extra: &'a str,
    }

    impl Default for Doc<'_> {
        fn default() -> Self {
            Self {
                version: Some("1.3.0"),
                bbox_attr: "CRS",
                crs: "CRS:84",
                bbox: (-10.0, 40.0, 10.0, 50.0),
                formats: &["image/png"],
                layer_attrs: "",
                layer_extra: "",
                extra: "",
            }
        }
    }

    impl Doc<'_> {
        fn render(&self) -> String {
            let version = self
                .version
                .map(|v| format!(" version=\"{}\"", v))
                .unwrap_or_default();
            let formats: String = self
                .formats
                .iter()
                .map(|f| format!("<Format>{}</Format>", f))
                .collect();
            let (minx, miny, maxx, maxy) = self.bbox;
            format!(
                r#"<WMS_Capabilities{version} xmlns:xlink="http://www.w3.org/1999/xlink">
  <Capability>
    <Request>
      <GetMap>
        {formats}
        <DCPType><HTTP><Get><OnlineResource xlink:href="http://example.com/geoserver/wms?key=1"/></Get></HTTP></DCPType>
      </GetMap>
    </Request>
    <Layer>
      <Title>root</Title>
      <Layer queryable="1" {attrs}>
        <Name>dem</Name>
        <BoundingBox {bbox_attr}="{crs}" minx="{minx}" miny="{miny}" maxx="{maxx}" maxy="{maxy}"/>
        <Style><Name>elevation</Name></Style>
        {layer_extra}
      </Layer>
    </Layer>
    {extra}
  </Capability>
</WMS_Capabilities>"#,
                attrs = self.layer_attrs,
                bbox_attr = self.bbox_attr,
                crs = self.crs,
                layer_extra = self.layer_extra,
                extra = self.extra,
            )
        }
    }

    fn parse_doc(doc: &Doc<'_>, options: &TerrainOptions) -> TerrainSource {
        parse(
            &doc.render(),
            options,
            &CrsRegistry::default(),
            &FormatRegistry::default(),
        )
        .unwrap()
    }

    fn image_template(source: &TerrainSource) -> String {
        source.image_template(0, 0, 0).unwrap()
    }

    #[test]
    fn test_is_new_version() {
        assert!(is_new_version("1.3.0"));
        assert!(is_new_version("1.9.1"));
        assert!(!is_new_version("1.1.1"));
        assert!(!is_new_version("2.0.0"));
        assert!(!is_new_version("1.3"));
    }

    // ==== axis order: the four version/CRS combinations ====

    #[test]
    fn test_new_version_latitude_first_swaps_axes() {
        let doc = Doc {
            crs: "EPSG:4326",
            bbox: (40.0, -10.0, 50.0, 10.0),
            ..Doc::default()
        };
        let source = parse_doc(&doc, &TerrainOptions::new("dem"));

        assert!(source.is_ready());
        let template = image_template(&source);
        assert!(template.contains("bbox={south},{west},{north},{east}&crs=EPSG:4326"));
        assert_eq!(
            source.availability(),
            Some(&Availability::Extent {
                bounds: Rectangle::new(-10.0, 40.0, 10.0, 50.0),
                max_level: 11,
            })
        );
    }

    #[test]
    fn test_new_version_longitude_first_keeps_axes() {
        let source = parse_doc(&Doc::default(), &TerrainOptions::new("dem"));

        let template = image_template(&source);
        assert!(template.contains("bbox={west},{south},{east},{north}&crs=CRS:84"));
        assert_eq!(
            source.availability(),
            Some(&Availability::Extent {
                bounds: Rectangle::new(-10.0, 40.0, 10.0, 50.0),
                max_level: 11,
            })
        );
    }

    #[test]
    fn test_old_version_latitude_first_keeps_axes() {
        let doc = Doc {
            version: Some("1.1.1"),
            bbox_attr: "SRS",
            crs: "EPSG:4326",
            ..Doc::default()
        };
        let source = parse_doc(&doc, &TerrainOptions::new("dem"));

        let template = image_template(&source);
        assert!(template.contains("bbox={west},{south},{east},{north}&srs=EPSG:4326"));
        assert_eq!(
            source.availability(),
            Some(&Availability::Extent {
                bounds: Rectangle::new(-10.0, 40.0, 10.0, 50.0),
                max_level: 11,
            })
        );
    }

    #[test]
    fn test_old_version_longitude_first_keeps_axes() {
        let doc = Doc {
            version: Some("1.1.1"),
            bbox_attr: "SRS",
            crs: "EPSG:3857",
            bbox: (-1.0e6, 4.0e6, 1.0e6, 6.0e6),
            ..Doc::default()
        };
        let source = parse_doc(&doc, &TerrainOptions::new("dem"));

        let template = image_template(&source);
        assert!(template.contains("bbox={west},{south},{east},{north}&srs=EPSG:3857"));
        assert_eq!(source.tiling_scheme().unwrap().x_tiles_at_level(0), 1);
    }

    // ==== readiness ====

    #[test]
    fn test_missing_layer_is_not_ready() {
        let source = parse_doc(&Doc::default(), &TerrainOptions::new("other"));
        assert!(!source.is_ready());
        assert!(source.image().is_none());
        assert!(source.array().is_none());
        assert!(!source.is_tile_available(0, 0, 0));
    }

    #[test]
    fn test_missing_version_is_not_ready() {
        let doc = Doc {
            version: None,
            ..Doc::default()
        };
        assert!(!parse_doc(&doc, &TerrainOptions::new("dem")).is_ready());
    }

    #[test]
    fn test_unknown_crs_is_not_ready() {
        let doc = Doc {
            crs: "EPSG:2154",
            ..Doc::default()
        };
        assert!(!parse_doc(&doc, &TerrainOptions::new("dem")).is_ready());
    }

    #[test]
    fn test_unsupported_formats_are_not_ready() {
        let doc = Doc {
            formats: &["image/tiff"],
            ..Doc::default()
        };
        assert!(!parse_doc(&doc, &TerrainOptions::new("dem")).is_ready());
    }

    #[test]
    fn test_pinned_format_used_without_advertisement() {
        let doc = Doc {
            formats: &["image/tiff"],
            ..Doc::default()
        };
        let options = TerrainOptions::new("dem")
            .with_format_array(ArrayFormat::new("image/bil", ArrayEncoding::Int16BigEndian));
        let source = parse_doc(&doc, &options);

        assert!(source.is_ready());
        let template = source.array_template(0, 0, 0).unwrap();
        assert!(template.contains("format=image/bil"));
    }

    #[test]
    fn test_non_queryable_layer_is_ignored() {
        let doc = Doc::default()
            .render()
            .replace("queryable=\"1\"", "queryable=\"0\"");
        let source = parse(
            &doc,
            &TerrainOptions::new("dem"),
            &CrsRegistry::default(),
            &FormatRegistry::default(),
        )
        .unwrap();
        assert!(!source.is_ready());
    }

    #[test]
    fn test_custom_registries_drive_crs_and_format() {
        let doc = Doc {
            crs: "EPSG:2154",
            formats: &["image/png", "image/tiff"],
            ..Doc::default()
        };
        let mut crs_registry = CrsRegistry::empty();
        crs_registry.push(CrsDefinition {
            name: "EPSG:2154".to_string(),
            supported_crs: "urn:ogc:def:crs:EPSG::2154".to_string(),
            ellipsoid: Ellipsoid::WGS84,
            first_axis_is_latitude: false,
            tiling: TilingKind::Geographic,
        });
        let formats = FormatRegistry::new(vec![ImageFormat::new("image/tiff", "tif")], vec![]);

        let options = TerrainOptions::new("dem");
        let source = parse(&doc.render(), &options, &crs_registry, &formats).unwrap();

        assert!(source.is_ready());
        let template = image_template(&source);
        assert!(template.contains("&crs=EPSG:2154"));
        assert!(template.contains("&format=image/tiff"));
    }

    // ==== formats and templates ====

    #[test]
    fn test_array_and_image_formats_both_kept() {
        let doc = Doc {
            formats: &["image/jpeg", "image/bil", "image/png"],
            ..Doc::default()
        };
        let source = parse_doc(&doc, &TerrainOptions::new("dem"));

        let image = source.image().unwrap();
        assert_eq!(
            image.transport.format,
            ImageFormat::new("image/jpeg", "jpg")
        );
        assert_eq!(image.transport.structure.elements_per_height, 2);
        assert!(image.transport.structure.is_big_endian);

        let array = source.array().unwrap();
        assert_eq!(array.transport.format.mime, "image/bil");
        assert_eq!(array.transport.structure.elements_per_height, 1);
        assert!(!array.transport.structure.is_big_endian);
    }

    #[test]
    fn test_full_image_template() {
        let source = parse_doc(&Doc::default(), &TerrainOptions::new("dem"));
        assert_eq!(
            image_template(&source),
            "http://example.com/geoserver/wms?SERVICE=WMS&REQUEST=GetMap&layers=dem\
             &version=1.3.0&bbox={west},{south},{east},{north}&crs=CRS:84\
             &format=image/png&width=65&height=65"
        );
        assert_eq!(source.image_size(), Some(GridSize::new(65, 65)));
    }

    #[test]
    fn test_known_style_is_appended() {
        let options = TerrainOptions::new("dem").with_style("elevation");
        let source = parse_doc(&Doc::default(), &options);

        assert!(image_template(&source).ends_with("&styles=elevation&style=elevation"));
        assert_eq!(source.style_name(), Some("elevation"));
        assert!(source.has_styled_image());
    }

    #[test]
    fn test_unknown_style_is_dropped() {
        let options = TerrainOptions::new("dem").with_style("hillshade");
        let source = parse_doc(&Doc::default(), &options);

        assert!(source.is_ready());
        assert!(!image_template(&source).contains("style"));
        assert!(source.style_name().is_none());
    }

    // ==== raster size precedence ====

    #[test]
    fn test_fixed_size_clamps_grid_and_sets_raster() {
        let doc = Doc {
            formats: &["image/png", "image/bil"],
            layer_attrs: r#"fixedWidth="33" fixedHeight="129""#,
            ..Doc::default()
        };
        let source = parse_doc(&doc, &TerrainOptions::new("dem"));

        assert_eq!(source.height_map_size(), GridSize::new(33, 65));
        assert_eq!(source.image_size(), Some(GridSize::new(33, 129)));
        let template = source.array_template(0, 0, 0).unwrap();
        assert!(template.ends_with("&width=33&height=65"));
    }

    #[test]
    fn test_vendor_tile_set_overrides_fixed_size() {
        let doc = Doc {
            layer_attrs: r#"fixedWidth="128" fixedHeight="128""#,
            extra: r#"<VendorSpecificCapabilities>
                <TileSet>
                  <SRS>CRS:84</SRS>
                  <BoundingBox SRS="EPSG:4326" minx="-180" miny="-90" maxx="180" maxy="90"/>
                  <Width>512</Width><Height>512</Height>
                  <Layers>dem</Layers>
                </TileSet>
                <TileSet>
                  <BoundingBox SRS="CRS:84" minx="-180" miny="-90" maxx="180" maxy="90"/>
                  <Width>256</Width><Height>256</Height>
                  <Layers>dem</Layers>
                </TileSet>
                <TileSet>
                  <BoundingBox SRS="CRS:84" minx="-180" miny="-90" maxx="180" maxy="90"/>
                  <Width>1024</Width><Height>1024</Height>
                  <Layers>dem</Layers>
                </TileSet>
              </VendorSpecificCapabilities>"#,
            ..Doc::default()
        };
        let source = parse_doc(&doc, &TerrainOptions::new("dem"));

        assert_eq!(source.image_size(), Some(GridSize::new(256, 256)));
        assert!(image_template(&source).ends_with("&width=256&height=256"));
        assert_eq!(source.height_map_size(), GridSize::new(65, 65));
    }

    // ==== availability ====

    #[test]
    fn test_availability_follows_extent_and_max_level() {
        let options = TerrainOptions::new("dem").with_max_level(4);
        let source = parse_doc(&Doc::default(), &options);

        // Level 0 west tile covers [-180, 0]; overlaps [-10, 10].
        assert!(source.is_tile_available(0, 0, 0));
        assert!(source.is_tile_available(1, 0, 0));
        // Level 2 tile (0, 0) covers [-180, -90] x [0, 90]: outside.
        assert!(!source.is_tile_available(0, 0, 2));
        assert!(!source.is_tile_available(3, 0, 4));
    }
}
