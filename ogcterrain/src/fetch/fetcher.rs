//! Fetch collaborator used by parsers and the tile pipeline.

use std::future::Future;

use image::RgbaImage;
use tracing::trace;

use super::{AsyncHttpClient, FetchError};

/// Retrieves capability documents, binary tiles and image tiles.
///
/// Retry, timeout and caching policy belong to implementations; callers only
/// see the settled outcome.
pub trait TileFetcher: Send + Sync {
    /// Fetches an XML document as text.
    fn fetch_xml(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Fetches a raw binary buffer.
    fn fetch_bytes(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;

    /// Fetches an image and decodes it to RGBA pixels.
    fn fetch_image(&self, url: &str) -> impl Future<Output = Result<RgbaImage, FetchError>> + Send;
}

/// [`TileFetcher`] over any [`AsyncHttpClient`].
///
/// Images are decoded with the `image` crate, whatever their container format.
#[derive(Clone)]
pub struct HttpTileFetcher<C: AsyncHttpClient> {
    client: C,
}

impl<C: AsyncHttpClient> HttpTileFetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: AsyncHttpClient> TileFetcher for HttpTileFetcher<C> {
    async fn fetch_xml(&self, url: &str) -> Result<String, FetchError> {
        let body = self.client.get(url).await?;
        // Invalid sequences become U+FFFD; the XML parser rejects what it cannot read
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.client.get(url).await
    }

    async fn fetch_image(&self, url: &str) -> Result<RgbaImage, FetchError> {
        let body = self.client.get(url).await?;
        let decoded = image::load_from_memory(&body)
            .map_err(|e| FetchError::ImageDecode(e.to_string()))?
            .to_rgba8();
        trace!(
            url = url,
            width = decoded.width(),
            height = decoded.height(),
            "Image decoded"
        );
        Ok(decoded)
    }
}
