//! Network collaborators.
//!
//! The crate never opens connections itself: parsers and the tile pipeline
//! go through a [`TileFetcher`]. [`HttpTileFetcher`] provides one over any
//! [`AsyncHttpClient`], and [`AsyncReqwestClient`] is the production client.
//!
//! ```ignore
//! use ogcterrain::fetch::{AsyncReqwestClient, HttpTileFetcher};
//!
//! let fetcher = HttpTileFetcher::new(AsyncReqwestClient::new()?);
//! ```

mod fetcher;
mod http;

pub use fetcher::{HttpTileFetcher, TileFetcher};
pub use http::{AsyncHttpClient, AsyncReqwestClient};

#[cfg(test)]
pub use fetcher::tests::MockTileFetcher;
#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;

use thiserror::Error;

/// Errors reported by fetch collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport failure or non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body is not a decodable image.
    #[error("Image decode failed: {0}")]
    ImageDecode(String),
}
