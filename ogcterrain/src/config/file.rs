//! INI config file loading.
//!
//! ```ini
//! [source]
//! url = https://example.com/geoserver
//! service = WMS
//! layer = elevation:srtm
//! style = elevation_sld
//!
//! [heightmap]
//! width = 65
//! height = 65
//! max_level = 11
//!
//! [elevation]
//! offset = 0
//! lowest = -500
//! highest = 12000
//! styled = false
//!
//! [request]
//! proxy = /proxy/
//! max_in_flight = 6
//! water_mask = false
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;

use super::{ConfigError, Proxy, ServiceKind, TerrainOptions};

/// Config directory name under the user's home directory.
const CONFIG_DIR: &str = ".ogcterrain";

/// Config file name.
const CONFIG_FILE: &str = "config.ini";

/// Default config file location (`~/.ogcterrain/config.ini`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Loads options from an INI file.
///
/// Missing keys keep their defaults. The result is not validated; callers
/// may still override values before creating a source.
pub fn load_options(path: &Path) -> Result<TerrainOptions, ConfigError> {
    let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_ini(&ini)
}

/// Converts a parsed INI document into options.
pub fn parse_ini(ini: &Ini) -> Result<TerrainOptions, ConfigError> {
    let mut options = TerrainOptions::default();

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = non_empty(section.get("url")) {
            options.url = Some(v.to_string());
        }
        if let Some(v) = non_empty(section.get("service")) {
            options.service = v
                .parse::<ServiceKind>()
                .map_err(|_| invalid("source", "service", v, "must be one of: WMS, TMS, WMTS"))?;
        }
        if let Some(v) = non_empty(section.get("layer")) {
            options.layer_name = v.to_string();
        }
        if let Some(v) = non_empty(section.get("style")) {
            options.style_name = Some(v.to_string());
        }
    }

    // [heightmap] section
    if let Some(section) = ini.section(Some("heightmap")) {
        if let Some(v) = section.get("width") {
            options.height_map_width = parse_value("heightmap", "width", v)?;
        }
        if let Some(v) = section.get("height") {
            options.height_map_height = parse_value("heightmap", "height", v)?;
        }
        if let Some(v) = section.get("max_level") {
            options.max_level = parse_value("heightmap", "max_level", v)?;
        }
    }

    // [elevation] section
    if let Some(section) = ini.section(Some("elevation")) {
        if let Some(v) = section.get("offset") {
            options.offset = parse_value("elevation", "offset", v)?;
        }
        if let Some(v) = section.get("lowest") {
            options.lowest = parse_value("elevation", "lowest", v)?;
        }
        if let Some(v) = section.get("highest") {
            options.highest = parse_value("elevation", "highest", v)?;
        }
        if let Some(v) = section.get("styled") {
            options.has_styled_image = parse_bool("elevation", "styled", v)?;
        }
    }

    // [request] section
    if let Some(section) = ini.section(Some("request")) {
        if let Some(v) = non_empty(section.get("proxy")) {
            options.proxy = Some(Proxy::new(v));
        }
        if let Some(v) = section.get("max_in_flight") {
            let limit: usize = parse_value("request", "max_in_flight", v)?;
            if limit == 0 {
                return Err(invalid("request", "max_in_flight", v, "must be at least 1"));
            }
            options.max_in_flight = Some(limit);
        }
        if let Some(v) = section.get("water_mask") {
            options.water_mask = parse_bool("request", "water_mask", v)?;
        }
    }

    Ok(options)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "not a valid number"))
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(section, key, value, "expected true or false")),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
