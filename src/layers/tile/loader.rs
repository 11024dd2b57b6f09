//! Network tile source backed by an async reqwest client on tokio

use std::time::Duration;

use once_cell::sync::Lazy;

use super::source::{tile_url, ImageHandle, TileSource};
use crate::core::{config::TileLayerOptions, geo::TileCoord};
use crate::{MapError, Result};

/// Shared async HTTP client with a custom User-Agent so that public tile
/// servers (e.g. OpenStreetMap) don't reject the request. Building the client
/// once avoids the cost of TLS and connection pool setup for every tile.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("tilegrid/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build reqwest async client")
});

/// Fetches tiles over HTTP(S) using the layer's URL template.
///
/// Downloads run as tokio tasks on the runtime that is current when `fetch`
/// is called; outside a runtime the handle fails straight away.
pub struct NetworkTileSource {
    request_timeout: Duration,
    runtime: Option<tokio::runtime::Handle>,
}

impl NetworkTileSource {
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            runtime: None,
        }
    }

    /// Pin downloads to a specific runtime instead of the caller's
    pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn runtime(&self) -> Result<tokio::runtime::Handle> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.clone()),
            None => tokio::runtime::Handle::try_current().map_err(|e| {
                MapError::Runtime(format!("network tiles need a tokio runtime: {}", e))
            }),
        }
    }

    async fn download(url: String, timeout: Duration) -> Result<Vec<u8>> {
        let response = HTTP_CLIENT.get(&url).timeout(timeout).send().await?;
        if !response.status().is_success() {
            return Err(MapError::TileLoad {
                key: url,
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl Default for NetworkTileSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TileSource for NetworkTileSource {
    fn fetch(&self, coords: TileCoord, options: &TileLayerOptions) -> ImageHandle {
        let url = match tile_url(&coords, options) {
            Ok(url) => url,
            Err(e) => return ImageHandle::failed(coords, e.to_string()),
        };
        let runtime = match self.runtime() {
            Ok(runtime) => runtime,
            Err(e) => return ImageHandle::failed(coords, e.to_string()),
        };

        let (handle, completer) = ImageHandle::pending(coords);
        let timeout = self.request_timeout;
        runtime.spawn(async move {
            log::debug!("fetch tile {} from {}", coords, url);
            match Self::download(url, timeout).await {
                Ok(data) => {
                    log::debug!("downloaded tile {} ({} bytes)", coords, data.len());
                    completer.resolve(data);
                }
                Err(e) => completer.reject(e.to_string()),
            }
        });
        handle
    }

    fn name(&self) -> &str {
        "network"
    }
}
