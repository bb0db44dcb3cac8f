//! WMTS capabilities parser.
//!
//! Each `TileMatrixSetLink` of the layer is tried in document order and the
//! first one that yields a URL template wins. Matrices are sorted by
//! descending scale denominator so that a matrix's index is its level, and
//! the first matrix sets the number of root tiles of the tiling scheme.

use roxmltree::Node;
use tracing::{debug, warn};

use super::{xml, CapabilitiesError};
use crate::config::TerrainOptions;
use crate::crs::CrsRegistry;
use crate::decode::GridSize;
use crate::format::{FormatRegistry, ImageFormat, ImageTransport};
use crate::source::{
    Availability, ImageEndpoint, TerrainSource, TileMatrix, TileMatrixLimits, UrlTemplate,
    TILE_MATRIX_TOKEN,
};

/// `GetTile` endpoints advertised in the operations metadata.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GetTileEndpoints {
    /// First endpoint with a `RESTful` encoding.
    pub restful: Option<String>,
    /// First endpoint with a `KVP` encoding.
    pub kvp: Option<String>,
}

/// Parses a WMTS capabilities document.
///
/// Returns a source with `is_ready() == false` when the layer, a supported
/// image format, a supported matrix set or a URL template is missing.
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

    let endpoints = get_tile_endpoints(root);
    debug!(
        restful = endpoints.restful.as_deref().unwrap_or("-"),
        kvp = endpoints.kvp.as_deref().unwrap_or("-"),
        "WMTS GetTile endpoints"
    );

    let Some(layer) = xml::descendants(root, "Contents")
        .flat_map(|contents| xml::children(contents, "Layer"))
        .find(|l| xml::child_text(*l, "Identifier") == Some(layer_name))
    else {
        debug!(layer = layer_name, "WMTS layer not found");
        return Ok(source);
    };

    let style = select_style(layer, options.style_name.as_deref());

    let Some(format) = options
        .format_image
        .clone()
        .or_else(|| select_format(layer, formats))
    else {
        debug!(
            layer = layer_name,
            "WMTS layer has no supported image format"
        );
        return Ok(source);
    };

    for link in xml::children(layer, "TileMatrixSetLink") {
        let Some(set_name) = xml::child_text(link, "TileMatrixSet") else {
            continue;
        };
        let Some(set) = find_matrix_set(root, set_name) else {
            warn!(tile_matrix_set = set_name, "WMTS matrix set not found");
            continue;
        };
        let Some(crs) = xml::child_text(set, "SupportedCRS")
            .and_then(|supported| crs_registry.find_by_supported_crs(supported))
        else {
            debug!(
                tile_matrix_set = set_name,
                "WMTS matrix set CRS not supported"
            );
            continue;
        };
        let Some(mut matrices) = parse_matrices(set) else {
            warn!(
                tile_matrix_set = set_name,
                "WMTS matrix set has malformed matrices"
            );
            continue;
        };
        if matrices.is_empty() {
            continue;
        }
        apply_limits(link, &mut matrices);

        let template = match resource_template(layer, &format) {
            Some(resource) => substitute_tokens(&resource, &style, set_name, layer_name, &format),
            None => match &endpoints.kvp {
                Some(kvp) => kvp_template(kvp, layer_name, &style, &format, set_name),
                None => {
                    debug!(
                        tile_matrix_set = set_name,
                        "WMTS has no URL template for format"
                    );
                    continue;
                }
            },
        };
        debug!(
            template = %template,
            tile_matrix_set = set_name,
            "WMTS image template"
        );

        source.tiling_scheme = Some(crs.tiling.build_with_root(
            crs.ellipsoid,
            matrices[0].matrix_width,
            matrices[0].matrix_height,
        ));
        source.image_size = uniform_tile_size(&matrices);
        source.image = Some(ImageEndpoint {
            transport: ImageTransport::new(format),
            template: UrlTemplate::Matrix {
                template,
                matrix_ids: matrices.iter().map(|m| m.id.clone()).collect(),
            },
        });
        source.availability = Some(Availability::Matrices {
            max_level: options.max_level,
            matrices,
        });
        source.crs = Some(crs.name.clone());
        source.style_name = Some(style);
        source.ready = true;
        break;
    }

    Ok(source)
}

/// First `RESTful` and first `KVP` endpoint of the `GetTile` operation.
pub fn get_tile_endpoints(root: Node<'_, '_>) -> GetTileEndpoints {
    let mut endpoints = GetTileEndpoints::default();
    let operations = xml::descendants(root, "Operation")
        .filter(|op| op.attribute("name") == Some("GetTile"));

    for get in operations.flat_map(|op| xml::descendants(op, "Get")) {
        let Some(href) = xml::href(get) else {
            continue;
        };
        match xml::descendant(get, "Value").and_then(xml::text) {
            Some("RESTful") if endpoints.restful.is_none() => {
                endpoints.restful = Some(href.to_string());
            }
            Some("KVP") if endpoints.kvp.is_none() => {
                endpoints.kvp = Some(href.to_string());
            }
            _ => {}
        }
    }
    endpoints
}

/// Requested style when advertised, else the default style, else `""`.
fn select_style(layer: Node<'_, '_>, requested: Option<&str>) -> String {
    let mut default_style = None;
    let mut requested_found = false;

    for style in xml::children(layer, "Style") {
        let Some(id) = xml::child_text(style, "Identifier") else {
            continue;
        };
        // Any isDefault attribute flags the style, whatever its value
        if style.attribute("isDefault").is_some() {
            default_style = Some(id);
        }
        if requested == Some(id) {
            requested_found = true;
        }
    }

    match requested {
        Some(name) if requested_found => name.to_string(),
        _ => default_style.unwrap_or_default().to_string(),
    }
}

/// First image format of the table that the layer advertises.
fn select_format(layer: Node<'_, '_>, formats: &FormatRegistry) -> Option<ImageFormat> {
    let advertised: Vec<&str> = xml::children(layer, "Format")
        .filter_map(xml::text)
        .collect();
    formats
        .images()
        .iter()
        .find(|format| advertised.contains(&format.mime.as_str()))
        .cloned()
}

fn find_matrix_set<'a, 'input>(root: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    xml::descendants(root, "TileMatrixSet")
        .find(|set| xml::child_text(*set, "Identifier") == Some(name))
}

/// Parses every matrix of a set, sorted by descending scale denominator.
///
/// Returns `None` when any matrix lacks a field.
fn parse_matrices(set: Node<'_, '_>) -> Option<Vec<TileMatrix>> {
    let mut matrices = xml::children(set, "TileMatrix")
        .map(|node| {
            Some(TileMatrix {
                id: xml::child_text(node, "Identifier")?.to_string(),
                matrix_width: xml::child_parse(node, "MatrixWidth")?,
                matrix_height: xml::child_parse(node, "MatrixHeight")?,
                tile_width: xml::child_parse(node, "TileWidth")?,
                tile_height: xml::child_parse(node, "TileHeight")?,
                scale_denominator: xml::child_parse(node, "ScaleDenominator")?,
                limits: None,
            })
        })
        .collect::<Option<Vec<_>>>()?;

    matrices.sort_by(|a, b| b.scale_denominator.total_cmp(&a.scale_denominator));
    Some(matrices)
}

/// Overlays the link's `TileMatrixLimits` onto matrices with the same id.
fn apply_limits(link: Node<'_, '_>, matrices: &mut [TileMatrix]) {
    for node in xml::descendants(link, "TileMatrixLimits") {
        let Some(id) = xml::child_text(node, "TileMatrix") else {
            continue;
        };
        let Some(limits) = parse_limits(node) else {
            warn!(
                tile_matrix = id,
                "Ignoring malformed WMTS tile matrix limits"
            );
            continue;
        };
        for matrix in matrices.iter_mut().filter(|m| m.id == id) {
            matrix.limits = Some(limits);
        }
    }
}

fn parse_limits(node: Node<'_, '_>) -> Option<TileMatrixLimits> {
    Some(TileMatrixLimits {
        min_tile_row: xml::child_parse(node, "MinTileRow")?,
        max_tile_row: xml::child_parse(node, "MaxTileRow")?,
        min_tile_col: xml::child_parse(node, "MinTileCol")?,
        max_tile_col: xml::child_parse(node, "MaxTileCol")?,
    })
}

/// `ResourceURL` template of the layer for `format`.
fn resource_template(layer: Node<'_, '_>, format: &ImageFormat) -> Option<String> {
    xml::children(layer, "ResourceURL")
        .find(|r| r.attribute("format") == Some(format.mime.as_str()))
        .and_then(|r| r.attribute("template"))
        .map(str::to_string)
}

/// Replaces the first occurrence of each static WMTS token; `{TileMatrix}`
/// is left for each level.
fn substitute_tokens(
    template: &str,
    style: &str,
    set_name: &str,
    layer_name: &str,
    format: &ImageFormat,
) -> String {
    template
        .replacen("{TileRow}", "{y}", 1)
        .replacen("{TileCol}", "{x}", 1)
        .replacen("{style}", style, 1)
        .replacen("{Style}", style, 1)
        .replacen("{TileMatrixSet}", set_name, 1)
        .replacen("{layer}", layer_name, 1)
        .replacen("{infoFormatExtension}", &format.extension, 1)
}

/// KVP GetTile template appended to the advertised endpoint.
fn kvp_template(
    endpoint: &str,
    layer_name: &str,
    style: &str,
    format: &ImageFormat,
    set_name: &str,
) -> String {
    let separator = if endpoint.ends_with('?') || endpoint.ends_with('&') {
        ""
    } else if endpoint.contains('?') {
        "&"
    } else {
        "?"
    };
    format!(
        "{endpoint}{separator}service=WMTS&request=GetTile&version=1.0.0&layer={layer_name}\
         &style={style}&format={mime}&TileMatrixSet={set_name}\
         &TileMatrix={TILE_MATRIX_TOKEN}&TileRow={{y}}&TileCol={{x}}",
        mime = format.mime,
    )
}

/// Tile size shared by every matrix, if there is one.
fn uniform_tile_size(matrices: &[TileMatrix]) -> Option<GridSize> {
    let first = matrices.first()?;
    matrices
        .iter()
        .all(|m| m.tile_width == first.tile_width && m.tile_height == first.tile_height)
        .then(|| GridSize::new(first.tile_width, first.tile_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Capabilities xmlns="http://www.opengis.net/wmts/1.0" xmlns:ows="http://www.opengis.net/ows/1.1" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.0.0">
  <ows:OperationsMetadata>
    <ows:Operation name="GetCapabilities">
      <ows:DCP><ows:HTTP><ows:Get xlink:href="http://example.com/gwc/service/wmts?">
        <ows:Constraint name="GetEncoding"><ows:AllowedValues><ows:Value>KVP</ows:Value></ows:AllowedValues></ows:Constraint>
      </ows:Get></ows:HTTP></ows:DCP>
    </ows:Operation>
    <ows:Operation name="GetTile">
      <ows:DCP><ows:HTTP>
        <ows:Get xlink:href="http://example.com/gwc/service/wmts?">
          <ows:Constraint name="GetEncoding"><ows:AllowedValues><ows:Value>KVP</ows:Value></ows:AllowedValues></ows:Constraint>
        </ows:Get>
        <ows:Get xlink:href="http://example.com/gwc/rest/wmts">
          <ows:Constraint name="GetEncoding"><ows:AllowedValues><ows:Value>RESTful</ows:Value></ows:AllowedValues></ows:Constraint>
        </ows:Get>
        <ows:Get xlink:href="http://mirror.example.com/wmts?">
          <ows:Constraint name="GetEncoding"><ows:AllowedValues><ows:Value>KVP</ows:Value></ows:AllowedValues></ows:Constraint>
        </ows:Get>
      </ows:HTTP></ows:DCP>
    </ows:Operation>
  </ows:OperationsMetadata>
  <Contents>
    <Layer>
      <ows:Title>dem</ows:Title>
      <ows:Identifier>dem</ows:Identifier>
      <Style isDefault="true"><ows:Identifier>elevation</ows:Identifier></Style>
      <Style><ows:Identifier>hillshade</ows:Identifier></Style>
      <Format>image/jpeg</Format>
      <Format>image/png</Format>
      <TileMatrixSetLink><TileMatrixSet>Lambert</TileMatrixSet></TileMatrixSetLink>
      <TileMatrixSetLink>
        <TileMatrixSet>EPSG:4326</TileMatrixSet>
        <TileMatrixSetLimits>
          <TileMatrixLimits>
            <TileMatrix>EPSG:4326:1</TileMatrix>
            <MinTileRow>0</MinTileRow><MaxTileRow>1</MaxTileRow>
            <MinTileCol>1</MinTileCol><MaxTileCol>2</MaxTileCol>
          </TileMatrixLimits>
        </TileMatrixSetLimits>
      </TileMatrixSetLink>
      <ResourceURL format="image/png" resourceType="tile" template="http://example.com/gwc/rest/wmts/{layer}/{style}/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}?format=image/png"/>
    </Layer>
    <TileMatrixSet>
      <ows:Identifier>Lambert</ows:Identifier>
      <ows:SupportedCRS>urn:ogc:def:crs:EPSG::2154</ows:SupportedCRS>
      <TileMatrix><ows:Identifier>L0</ows:Identifier><ScaleDenominator>1000</ScaleDenominator><TileWidth>256</TileWidth><TileHeight>256</TileHeight><MatrixWidth>1</MatrixWidth><MatrixHeight>1</MatrixHeight></TileMatrix>
    </TileMatrixSet>
    <TileMatrixSet>
      <ows:Identifier>EPSG:4326</ows:Identifier>
      <ows:SupportedCRS>urn:ogc:def:crs:EPSG::4326</ows:SupportedCRS>
      <TileMatrix><ows:Identifier>EPSG:4326:2</ows:Identifier><ScaleDenominator>69885283.0</ScaleDenominator><TileWidth>256</TileWidth><TileHeight>256</TileHeight><MatrixWidth>8</MatrixWidth><MatrixHeight>4</MatrixHeight></TileMatrix>
      <TileMatrix><ows:Identifier>EPSG:4326:0</ows:Identifier><ScaleDenominator>279541132.0</ScaleDenominator><TileWidth>256</TileWidth><TileHeight>256</TileHeight><MatrixWidth>2</MatrixWidth><MatrixHeight>1</MatrixHeight></TileMatrix>
      <TileMatrix><ows:Identifier>EPSG:4326:1</ows:Identifier><ScaleDenominator>139770566.0</ScaleDenominator><TileWidth>256</TileWidth><TileHeight>256</TileHeight><MatrixWidth>4</MatrixWidth><MatrixHeight>2</MatrixHeight></TileMatrix>
    </TileMatrixSet>
  </Contents>
</Capabilities>"#;

    fn parse_with(text: &str, options: &TerrainOptions) -> TerrainSource {
        let crs_registry = CrsRegistry::default();
        let formats = FormatRegistry::default();
        parse(text, options, &crs_registry, &formats).unwrap()
    }

    fn parse_default() -> TerrainSource {
        parse_with(CAPABILITIES, &TerrainOptions::new("dem"))
    }

    fn without_resource_url(text: &str) -> String {
        let start = text.find("<ResourceURL").unwrap();
        let end = start + text[start..].find("/>").unwrap() + 2;
        format!("{}{}", &text[..start], &text[end..])
    }

    #[test]
    fn test_get_tile_endpoints_first_of_each() {
        let doc = xml::parse_document(CAPABILITIES).unwrap();
        let endpoints = get_tile_endpoints(doc.root_element());

        assert_eq!(
            endpoints.kvp.as_deref(),
            Some("http://example.com/gwc/service/wmts?")
        );
        assert_eq!(
            endpoints.restful.as_deref(),
            Some("http://example.com/gwc/rest/wmts")
        );
    }

    #[test]
    fn test_skips_unsupported_matrix_set() {
        let source = parse_default();

        assert!(source.is_ready());
        assert_eq!(source.crs(), Some("EPSG:4326"));
    }

    #[test]
    fn test_root_tiles_from_first_matrix() {
        let source = parse_default();
        let scheme = source.tiling_scheme().unwrap();

        assert_eq!(scheme.x_tiles_at_level(0), 2);
        assert_eq!(scheme.y_tiles_at_level(0), 1);
        assert_eq!(scheme.x_tiles_at_level(2), 8);
    }

    #[test]
    fn test_resource_template_with_default_style() {
        let source = parse_default();

        assert_eq!(
            source.image_template(1, 0, 0).as_deref(),
            Some(
                "http://example.com/gwc/rest/wmts/dem/elevation/EPSG:4326/EPSG:4326:0/{y}/{x}\
                 ?format=image/png"
            )
        );
        assert_eq!(source.style_name(), Some("elevation"));
    }

    #[test]
    fn test_matrices_sorted_by_scale() {
        let source = parse_default();
        let template = source.image_template(5, 3, 2).unwrap();
        assert!(template.contains("/EPSG:4326:2/"));
    }

    #[test]
    fn test_requested_style_used_when_advertised() {
        let options = TerrainOptions::new("dem").with_style("hillshade");
        let source = parse_with(CAPABILITIES, &options);
        let template = source.image_template(0, 0, 0).unwrap();
        assert!(template.contains("/dem/hillshade/"));
    }

    #[test]
    fn test_unknown_style_falls_back_to_default() {
        let options = TerrainOptions::new("dem").with_style("contours");
        let source = parse_with(CAPABILITIES, &options);
        let template = source.image_template(0, 0, 0).unwrap();
        assert!(template.contains("/dem/elevation/"));
    }

    #[test]
    fn test_no_default_style_gives_empty_style() {
        let text = CAPABILITIES.replace(" isDefault=\"true\"", "");
        let source = parse_with(&text, &TerrainOptions::new("dem"));
        let template = source.image_template(0, 0, 0).unwrap();
        assert!(template.contains("/dem//EPSG:4326/"));
    }

    #[test]
    fn test_is_default_attribute_flags_style_regardless_of_value() {
        let text = CAPABILITIES.replace("isDefault=\"true\"", "isDefault=\"false\"");
        let source = parse_with(&text, &TerrainOptions::new("dem"));
        assert_eq!(source.style_name(), Some("elevation"));
    }

    #[test]
    fn test_image_format_by_table_order() {
        // png precedes jpeg in the table even though the layer lists jpeg first.
        let source = parse_default();
        assert_eq!(source.image().unwrap().transport.format.mime, "image/png");
    }

    #[test]
    fn test_limits_bound_availability() {
        let source = parse_default();

        assert!(source.is_tile_available(1, 0, 1));
        assert!(source.is_tile_available(2, 1, 1));
        assert!(!source.is_tile_available(0, 0, 1));
        assert!(!source.is_tile_available(3, 0, 1));
        assert!(source.image_template(0, 0, 1).is_none());
    }

    #[test]
    fn test_matrix_dimensions_bound_availability() {
        let source = parse_default();

        assert!(source.is_tile_available(7, 3, 2));
        assert!(!source.is_tile_available(8, 0, 2));
        assert!(!source.is_tile_available(0, 4, 2));
        assert!(!source.is_tile_available(0, 0, 3));
    }

    #[test]
    fn test_max_level_caps_availability() {
        let options = TerrainOptions::new("dem").with_max_level(1);
        let source = parse_with(CAPABILITIES, &options);

        assert!(source.is_tile_available(0, 0, 0));
        assert!(!source.is_tile_available(1, 0, 1));
    }

    #[test]
    fn test_kvp_fallback_without_resource_url() {
        let text = without_resource_url(CAPABILITIES);
        let source = parse_with(&text, &TerrainOptions::new("dem"));

        assert_eq!(
            source.image_template(0, 0, 0).as_deref(),
            Some(
                "http://example.com/gwc/service/wmts?service=WMTS&request=GetTile&version=1.0.0\
                 &layer=dem&style=elevation&format=image/png&TileMatrixSet=EPSG:4326\
                 &TileMatrix=EPSG:4326:0&TileRow={y}&TileCol={x}"
            )
        );
    }

    #[test]
    fn test_kvp_separator() {
        let png = ImageFormat::new("image/png", "png");
        let url = |endpoint: &str| kvp_template(endpoint, "l", "s", &png, "m");

        assert!(url("http://h/wmts").starts_with("http://h/wmts?service="));
        assert!(url("http://h/wmts?a=1").starts_with("http://h/wmts?a=1&service="));
        assert!(url("http://h/wmts?").starts_with("http://h/wmts?service="));
    }

    #[test]
    fn test_static_tokens_replaced_once() {
        let png = ImageFormat::new("image/png", "png");
        let template = "/{layer}/{layer}/{TileRow}/{TileCol}";
        assert_eq!(
            substitute_tokens(template, "s", "m", "dem", &png),
            "/dem/{layer}/{y}/{x}"
        );
    }

    #[test]
    fn test_uniform_tile_size_published() {
        let source = parse_default();
        assert_eq!(source.image_size(), Some(GridSize::new(256, 256)));
    }

    #[test]
    fn test_mixed_tile_sizes_not_published() {
        let text = CAPABILITIES.replacen(
            "<TileWidth>256</TileWidth><TileHeight>256</TileHeight><MatrixWidth>8</MatrixWidth>",
            "<TileWidth>512</TileWidth><TileHeight>512</TileHeight><MatrixWidth>8</MatrixWidth>",
            1,
        );
        let source = parse_with(&text, &TerrainOptions::new("dem"));

        assert!(source.is_ready());
        assert!(source.image_size().is_none());
    }

    #[test]
    fn test_missing_layer_is_not_ready() {
        let source = parse_with(CAPABILITIES, &TerrainOptions::new("ortho"));
        assert!(!source.is_ready());
        assert!(source.image_template(0, 0, 0).is_none());
    }

    #[test]
    fn test_unsupported_formats_are_not_ready() {
        let text = CAPABILITIES
            .replace("<Format>image/jpeg</Format>", "<Format>image/tiff</Format>")
            .replace("<Format>image/png</Format>", "");
        assert!(!parse_with(&text, &TerrainOptions::new("dem")).is_ready());
    }

    #[test]
    fn test_malformed_matrix_skips_link() {
        let text = CAPABILITIES.replace(
            "<MatrixWidth>4</MatrixWidth>",
            "<MatrixWidth>four</MatrixWidth>",
        );
        assert!(!parse_with(&text, &TerrainOptions::new("dem")).is_ready());
    }
}
