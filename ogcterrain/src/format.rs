//! Transport format registry.
//!
//! Two ordered tables: image formats (elevation packed into RGBA pixels) and
//! array formats (raw binary samples). Parsers pick the first entry a server
//! advertises, so table order is the format preference order.
//!
//! The terrain data structure describing the wire encoding is not stored on
//! the registry entries. Each parse derives a fresh [`ImageTransport`] or
//! [`ArrayTransport`] value instead, so sources built from the same registry
//! never share or mutate each other's descriptors.

use serde::Serialize;

use crate::decode::{self, DecodeError, ElevationLimits, GridSize};

/// An image transport format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFormat {
    /// MIME type as advertised by the server.
    pub mime: String,
    /// File extension used by TMS and WMTS REST templates.
    pub extension: String,
}

impl ImageFormat {
    /// Creates an image format entry.
    pub fn new(mime: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            extension: extension.into(),
        }
    }
}

/// Binary sample encodings the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArrayEncoding {
    /// Signed 16-bit big-endian samples, row-major (`image/bil`).
    Int16BigEndian,
}

/// A binary array transport format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayFormat {
    /// MIME type as advertised by the server.
    pub mime: String,
    /// Wire encoding of the samples.
    pub encoding: ArrayEncoding,
}

impl ArrayFormat {
    /// Creates an array format entry.
    pub fn new(mime: impl Into<String>, encoding: ArrayEncoding) -> Self {
        Self {
            mime: mime.into(),
            encoding,
        }
    }

    /// Decodes a fetched buffer into a sanitized sample grid.
    pub fn decode(
        &self,
        buffer: &[u8],
        size: GridSize,
        limits: &ElevationLimits,
    ) -> Result<Vec<i16>, DecodeError> {
        match self.encoding {
            ArrayEncoding::Int16BigEndian => decode::decode_int16_be(buffer, size, limits),
        }
    }
}

/// Describes how heights are laid out in a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TerrainDataStructure {
    pub height_scale: f64,
    pub height_offset: f64,
    pub elements_per_height: u32,
    pub stride: u32,
    pub element_multiplier: f64,
    pub is_big_endian: bool,
    pub lowest_encoded_height: f64,
    pub highest_encoded_height: f64,
}

impl TerrainDataStructure {
    /// Structure of a decoded binary array: one little-endian element per height.
    pub fn for_array() -> Self {
        Self {
            height_scale: 1.0,
            height_offset: 0.0,
            elements_per_height: 1,
            stride: 1,
            element_multiplier: 256.0,
            is_big_endian: false,
            lowest_encoded_height: 0.0,
            highest_encoded_height: 10_000.0,
        }
    }

    /// Structure of an elevation-encoded image: two big-endian channels per height.
    pub fn for_image() -> Self {
        Self {
            height_scale: 1.0,
            height_offset: 0.0,
            elements_per_height: 2,
            stride: 4,
            element_multiplier: 256.0,
            is_big_endian: true,
            lowest_encoded_height: 0.0,
            highest_encoded_height: 65_535.0,
        }
    }
}

/// Image format chosen for a source, with its wire structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageTransport {
    pub format: ImageFormat,
    pub structure: TerrainDataStructure,
}

impl ImageTransport {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            structure: TerrainDataStructure::for_image(),
        }
    }
}

/// Array format chosen for a source, with its wire structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayTransport {
    pub format: ArrayFormat,
    pub structure: TerrainDataStructure,
}

impl ArrayTransport {
    pub fn new(format: ArrayFormat) -> Self {
        Self {
            format,
            structure: TerrainDataStructure::for_array(),
        }
    }
}

/// Ordered image and array format tables.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatRegistry {
    images: Vec<ImageFormat>,
    arrays: Vec<ArrayFormat>,
}

impl FormatRegistry {
    /// Creates a registry from explicit tables.
    pub fn new(images: Vec<ImageFormat>, arrays: Vec<ArrayFormat>) -> Self {
        Self { images, arrays }
    }

    /// Image formats in preference order.
    pub fn images(&self) -> &[ImageFormat] {
        &self.images
    }

    /// Array formats in preference order.
    pub fn arrays(&self) -> &[ArrayFormat] {
        &self.arrays
    }

    /// First image format with the given MIME type.
    pub fn image_by_mime(&self, mime: &str) -> Option<&ImageFormat> {
        self.images.iter().find(|format| format.mime == mime)
    }

    /// First image format with the given file extension.
    pub fn image_by_extension(&self, extension: &str) -> Option<&ImageFormat> {
        self.images
            .iter()
            .find(|format| format.extension == extension)
    }

    /// First array format with the given MIME type.
    pub fn array_by_mime(&self, mime: &str) -> Option<&ArrayFormat> {
        self.arrays.iter().find(|format| format.mime == mime)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self {
            images: vec![
                ImageFormat::new("image/png", "png"),
                ImageFormat::new("image/jpeg", "jpg"),
                ImageFormat::new("image/jpeg", "jpeg"),
                ImageFormat::new("image/gif", "gif"),
                ImageFormat::new("image/png; mode=8bit", "png"),
            ],
            arrays: vec![ArrayFormat::new("image/bil", ArrayEncoding::Int16BigEndian)],
        }
    }
}
