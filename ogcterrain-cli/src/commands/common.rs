//! Source selection shared by every command.

use std::fs;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use ogcterrain::config::{self, Proxy, ServiceKind, TerrainOptions};
use ogcterrain::fetch::{AsyncReqwestClient, HttpTileFetcher};

use crate::error::CliError;

/// Service protocol selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ServiceType {
    /// OGC Web Map Service (GetMap per tile)
    Wms,
    /// Tile Map Service (GeoServer GWC layout)
    Tms,
    /// OGC Web Map Tile Service
    Wmts,
}

impl From<ServiceType> for ServiceKind {
    fn from(service: ServiceType) -> Self {
        match service {
            ServiceType::Wms => ServiceKind::Wms,
            ServiceType::Tms => ServiceKind::Tms,
            ServiceType::Wmts => ServiceKind::Wmts,
        }
    }
}

/// Where the terrain source comes from. Flags override the config file.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Config file (default: ~/.ogcterrain/config.ini, if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL; any query string is dropped
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Read the capabilities document from a file instead of the server
    #[arg(long, global = true)]
    pub xml: Option<PathBuf>,

    /// Service protocol
    #[arg(long, value_enum, global = true)]
    pub service: Option<ServiceType>,

    /// Layer name (WMS/WMTS) or tile map title (TMS)
    #[arg(long, global = true)]
    pub layer: Option<String>,

    /// Style to request
    #[arg(long, global = true)]
    pub style: Option<String>,

    /// Proxy prefix for every request
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Height map width in samples
    #[arg(long, global = true)]
    pub width: Option<u32>,

    /// Height map height in samples
    #[arg(long, global = true)]
    pub height: Option<u32>,

    /// Levels at or above this are never requested
    #[arg(long, global = true)]
    pub max_level: Option<u32>,

    /// HTTP timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    pub timeout: u64,
}

impl SourceArgs {
    /// Builds terrain options: config file first, then flags.
    pub fn resolve_options(&self) -> Result<TerrainOptions, CliError> {
        let mut options = match &self.config {
            Some(path) => config::load_options(path)?,
            None => match config::default_config_path().filter(|p| p.exists()) {
                Some(path) => config::load_options(&path)?,
                None => TerrainOptions::default(),
            },
        };

        if let Some(url) = &self.url {
            options.url = Some(url.clone());
        }
        if let Some(path) = &self.xml {
            let text = fs::read_to_string(path).map_err(|error| CliError::FileRead {
                path: path.display().to_string(),
                error,
            })?;
            options.xml = Some(text);
            // A local document wins over a configured server
            if self.url.is_none() {
                options.url = None;
            }
        }
        if let Some(service) = self.service {
            options.service = service.into();
        }
        if let Some(layer) = &self.layer {
            options.layer_name = layer.clone();
        }
        if let Some(style) = &self.style {
            options.style_name = Some(style.clone());
        }
        if let Some(proxy) = &self.proxy {
            options.proxy = Some(Proxy::new(proxy.clone()));
        }
        if let Some(width) = self.width {
            options.height_map_width = width;
        }
        if let Some(height) = self.height {
            options.height_map_height = height;
        }
        if let Some(max_level) = self.max_level {
            options.max_level = max_level;
        }

        options.validate()?;
        Ok(options)
    }

    /// HTTP fetcher honoring the timeout flag.
    pub fn fetcher(&self) -> Result<HttpTileFetcher<AsyncReqwestClient>, CliError> {
        let client = AsyncReqwestClient::with_timeout(self.timeout).map_err(CliError::HttpClient)?;
        Ok(HttpTileFetcher::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args() -> SourceArgs {
        SourceArgs {
            config: None,
            url: None,
            xml: None,
            service: None,
            layer: None,
            style: None,
            proxy: None,
            width: None,
            height: None,
            max_level: None,
            timeout: 30,
        }
    }

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_flags_override_config() {
        let file = config_file(
            "[source]\nurl = http://a.example/geoserver\nservice = WMS\nlayer = dem\n\n[heightmap]\nwidth = 33\n",
        );
        let args = SourceArgs {
            config: Some(file.path().to_path_buf()),
            service: Some(ServiceType::Wmts),
            layer: Some("srtm".to_string()),
            ..args()
        };

        let options = args.resolve_options().unwrap();
        assert_eq!(options.url.as_deref(), Some("http://a.example/geoserver"));
        assert_eq!(options.service, ServiceKind::Wmts);
        assert_eq!(options.layer_name, "srtm");
        assert_eq!(options.height_map_width, 33);
    }

    #[test]
    fn test_xml_file_replaces_configured_url() {
        let config = config_file("[source]\nurl = http://a.example/geoserver\nlayer = dem\n");
        let xml = config_file("<WMS_Capabilities/>");
        let args = SourceArgs {
            config: Some(config.path().to_path_buf()),
            xml: Some(xml.path().to_path_buf()),
            ..args()
        };

        let options = args.resolve_options().unwrap();
        assert_eq!(options.url, None);
        assert_eq!(options.xml.as_deref(), Some("<WMS_Capabilities/>"));
    }

    #[test]
    fn test_missing_layer_is_a_config_error() {
        let file = config_file("");
        let args = SourceArgs {
            url: Some("http://a.example".to_string()),
            config: Some(file.path().to_path_buf()),
            ..args()
        };

        assert!(matches!(args.resolve_options(), Err(CliError::Config(_))));
    }
}
