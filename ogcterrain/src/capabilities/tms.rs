//! TMS parser.
//!
//! Accepts either a `TileMapService` listing or a single `TileMap` document.
//! A listing is resolved by fetching every tile map whose title equals the
//! layer name and racing them: the first one that parses into a usable source
//! wins, failed attempts are skipped, and the remaining attempts are dropped.

use std::collections::BTreeMap;

use futures::future::select_ok;
use tracing::{debug, warn};

use super::{fetch_document, xml, CapabilitiesError};
use crate::config::TerrainOptions;
use crate::crs::CrsRegistry;
use crate::decode::GridSize;
use crate::fetch::TileFetcher;
use crate::format::{FormatRegistry, ImageTransport};
use crate::source::{Availability, ImageEndpoint, TerrainSource, UrlTemplate};
use crate::tiling::Rectangle;

/// Resolves a TMS document (service listing or tile map) into a source.
pub async fn resolve<F: TileFetcher>(
    text: &str,
    options: &TerrainOptions,
    fetcher: &F,
    crs_registry: &CrsRegistry,
    formats: &FormatRegistry,
) -> Result<TerrainSource, CapabilitiesError> {
    let Some(candidates) = listing_candidates(text, options)? else {
        return parse_tile_map(text, options, crs_registry, formats);
    };

    if candidates.is_empty() {
        return Err(CapabilitiesError::TileMapNotFound(options.layer_name.clone()));
    }
    debug!(
        layer = %options.layer_name,
        candidates = candidates.len(),
        "Racing TMS tile maps"
    );

    let attempts = candidates.into_iter().map(|url| {
        Box::pin(async move {
            let result = match fetch_document(fetcher, &url).await {
                Ok(text) => parse_tile_map(&text, options, crs_registry, formats),
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!(url = %url, error = %e, "TMS tile map rejected");
            }
            result
        })
    });

    let (source, _pending) = select_ok(attempts).await?;
    Ok(source)
}

/// Tile map URLs of a service listing whose title matches the layer.
///
/// Returns `None` when `text` is not a service listing.
fn listing_candidates(
    text: &str,
    options: &TerrainOptions,
) -> Result<Option<Vec<String>>, CapabilitiesError> {
    let doc = xml::parse_document(text)?;
    if xml::descendant(doc.root_element(), "TileMapService").is_none() {
        return Ok(None);
    }

    let urls = xml::descendants(doc.root_element(), "TileMap")
        .filter(|map| map.attribute("title") == Some(options.layer_name.as_str()))
        .filter_map(|map| map.attribute("href"))
        .map(|href| options.proxied(href))
        .collect();
    Ok(Some(urls))
}

/// Parses a single `TileMap` document.
///
/// Unlike WMS and WMTS, a tile map without tile sets, a known image format or
/// a known SRS is an error.
pub fn parse_tile_map(
    text: &str,
    options: &TerrainOptions,
    crs_registry: &CrsRegistry,
    formats: &FormatRegistry,
) -> Result<TerrainSource, CapabilitiesError> {
    let doc = xml::parse_document(text)?;
    let root = doc.root_element();
    let mut source = TerrainSource::from_options(options);

    let crs = xml::descendant(root, "SRS")
        .and_then(xml::text)
        .and_then(|srs| crs_registry.find_by_name(srs));

    let tile_format = xml::descendant(root, "TileFormat");
    let image_format = options.format_image.clone().or_else(|| {
        tile_format
            .and_then(|f| f.attribute("extension"))
            .and_then(|ext| formats.image_by_extension(ext))
            .cloned()
    });

    let mut tile_sets = BTreeMap::new();
    if let Some(format) = &image_format {
        let nodes = xml::descendants(root, "TileSets").flat_map(|s| xml::children(s, "TileSet"));
        for tile_set in nodes {
            let (Some(href), Some(order)) = (
                tile_set.attribute("href"),
                xml::attribute_parse::<u32>(tile_set, "order"),
            ) else {
                continue;
            };
            let template = format!("{}/{{x}}/{{tmsY}}.{}", href, format.extension);
            tile_sets.insert(order, template);
        }
    }

    let (Some(crs), Some(format), false) = (crs, image_format, tile_sets.is_empty()) else {
        return Err(CapabilitiesError::IncompleteTileMap(
            "no tile sets, no supported image format or no supported SRS".to_string(),
        ));
    };

    let bounds = xml::descendant(root, "BoundingBox")
        .and_then(|bbox| {
            Some(Rectangle::new(
                xml::attribute_parse(bbox, "minx")?,
                xml::attribute_parse(bbox, "miny")?,
                xml::attribute_parse(bbox, "maxx")?,
                xml::attribute_parse(bbox, "maxy")?,
            ))
        })
        .ok_or_else(|| CapabilitiesError::IncompleteTileMap("missing BoundingBox".to_string()))?;

    if let Some(f) = tile_format {
        if let (Some(width), Some(height)) = (
            xml::attribute_parse::<u32>(f, "width"),
            xml::attribute_parse::<u32>(f, "height"),
        ) {
            source.image_size = Some(GridSize::new(width, height));
        }
    }

    debug!(
        crs = %crs.name,
        levels = tile_sets.len(),
        extension = %format.extension,
        "TMS tile map parsed"
    );

    source.availability = Some(Availability::TileSets {
        bounds,
        max_level: options.max_level,
        levels: tile_sets.keys().copied().collect(),
    });
    source.image = Some(ImageEndpoint {
        transport: ImageTransport::new(format),
        template: UrlTemplate::PerLevel(tile_sets),
    });
    source.tiling_scheme = Some(crs.tiling.build(crs.ellipsoid));
    source.crs = Some(crs.name.clone());
    source.ready = true;

    Ok(source)
}
