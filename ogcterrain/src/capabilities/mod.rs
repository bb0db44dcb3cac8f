//! Capabilities parsing.
//!
//! Turns a WMS, TMS or WMTS capabilities document into a [`TerrainSource`].
//!
//! WMS and WMTS documents that cannot serve the requested layer still produce
//! a source, with [`TerrainSource::is_ready`] false. An unusable TMS tile map
//! is an error instead.

pub mod tms;
pub mod wms;
pub mod wmts;
mod xml;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ServiceKind, TerrainOptions};
use crate::crs::CrsRegistry;
use crate::fetch::{FetchError, TileFetcher};
use crate::format::FormatRegistry;
use crate::source::TerrainSource;

/// Errors raised while loading a terrain source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilitiesError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Malformed capabilities document: {0}")]
    Xml(String),

    #[error("No tile map titled '{0}' in the service listing")]
    TileMapNotFound(String),

    #[error("Unusable tile map: {0}")]
    IncompleteTileMap(String),
}

/// Removes any query string from `url`.
pub fn strip_query(url: &str) -> &str {
    match url.find('?') {
        Some(index) => &url[..index],
        None => url,
    }
}

/// WMS GetCapabilities URL for a server base URL.
pub fn wms_capabilities_url(base: &str) -> String {
    format!(
        "{}?SERVICE=WMS&REQUEST=GetCapabilities&tiled=true",
        strip_query(base)
    )
}

/// TMS service listing URL for a server base URL.
pub fn tms_service_url(base: &str) -> String {
    format!("{}/gwc/service/tms/1.0.0", strip_query(base))
}

/// WMTS GetCapabilities URL for a server base URL.
pub fn wmts_capabilities_url(base: &str) -> String {
    format!(
        "{}/gwc/service/wmts?REQUEST=GetCapabilities",
        strip_query(base)
    )
}

/// Loads a terrain source with the built-in CRS and format tables.
pub async fn load_source<F: TileFetcher>(
    options: &TerrainOptions,
    fetcher: &F,
) -> Result<TerrainSource, CapabilitiesError> {
    load_source_with(
        options,
        fetcher,
        &CrsRegistry::default(),
        &FormatRegistry::default(),
    )
    .await
}

/// Loads a terrain source, fetching the capabilities document when
/// `options.url` is set and parsing `options.xml` otherwise.
///
/// Options are validated before anything is fetched.
pub async fn load_source_with<F: TileFetcher>(
    options: &TerrainOptions,
    fetcher: &F,
    crs_registry: &CrsRegistry,
    formats: &FormatRegistry,
) -> Result<TerrainSource, CapabilitiesError> {
    options.validate()?;

    let source = match options.service {
        ServiceKind::Wms => {
            let text = document_text(options, fetcher, wms_capabilities_url).await?;
            wms::parse(&text, options, crs_registry, formats)?
        }
        ServiceKind::Tms => {
            let text = document_text(options, fetcher, tms_service_url).await?;
            tms::resolve(&text, options, fetcher, crs_registry, formats).await?
        }
        ServiceKind::Wmts => {
            let text = document_text(options, fetcher, wmts_capabilities_url).await?;
            wmts::parse(&text, options, crs_registry, formats)?
        }
    };

    if source.is_ready() {
        info!(
            service = %options.service,
            layer = %options.layer_name,
            crs = source.crs().unwrap_or("-"),
            "Terrain source ready"
        );
    } else {
        warn!(
            service = %options.service,
            layer = %options.layer_name,
            "Terrain source not ready: layer, CRS or format not supported"
        );
    }

    Ok(source)
}

async fn document_text<F: TileFetcher>(
    options: &TerrainOptions,
    fetcher: &F,
    discovery_url: fn(&str) -> String,
) -> Result<String, CapabilitiesError> {
    if let Some(base) = &options.url {
        let url = options.proxied(&discovery_url(base));
        debug!(url = %url, "Fetching capabilities");
        return fetch_document(fetcher, &url).await;
    }
    options
        .xml
        .clone()
        .ok_or(CapabilitiesError::Config(ConfigError::MissingSource))
}

pub(crate) async fn fetch_document<F: TileFetcher>(
    fetcher: &F,
    url: &str,
) -> Result<String, CapabilitiesError> {
    fetcher
        .fetch_xml(url)
        .await
        .map_err(|source| CapabilitiesError::Fetch {
            url: url.to_string(),
            source,
        })
}
