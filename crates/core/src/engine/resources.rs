//! Resource resolution for engine runtimes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;

use super::error::ResourceError;
use super::traits::ResourceResolver;
use super::types::{ResolvedResource, ResourceRequest};

/// Fetches `http(s)://` locators over the network and reads anything else
/// (plain paths or `file://` URLs) from disk.
///
/// Inline fetches are cached per locator for the lifetime of the resolver, so
/// switching execution modes back and forth never refetches.
pub struct HttpResourceResolver {
    client: Client,
    fetch_timeout: Duration,
    cache: RwLock<HashMap<String, Bytes>>,
}

impl HttpResourceResolver {
    pub fn new(fetch_timeout: Duration) -> Result<Self, ResourceError> {
        let client = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| ResourceError::fetch_failed("client", e.to_string()))?;

        Ok(Self {
            client,
            fetch_timeout,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Number of cached locators.
    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }

    fn is_remote(locator: &str) -> bool {
        locator.starts_with("http://") || locator.starts_with("https://")
    }

    async fn fetch_remote(&self, locator: &str) -> Result<Bytes, ResourceError> {
        debug!(locator = %locator, "Fetching runtime resource");

        let response = self.client.get(locator).send().await.map_err(|e| {
            if e.is_timeout() {
                ResourceError::Timeout {
                    locator: locator.to_string(),
                    timeout_secs: self.fetch_timeout.as_secs(),
                }
            } else {
                ResourceError::fetch_failed(locator, e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(ResourceError::Status {
                locator: locator.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| ResourceError::fetch_failed(locator, e.to_string()))
    }

    async fn read_local(locator: &str) -> Result<Bytes, ResourceError> {
        let path = PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator));
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResourceError::NotFound { path })
            }
            Err(e) => Err(ResourceError::Io(e)),
        }
    }
}

#[async_trait]
impl ResourceResolver for HttpResourceResolver {
    async fn resolve(&self, request: &ResourceRequest) -> Result<ResolvedResource, ResourceError> {
        if !request.inline {
            return Ok(ResolvedResource {
                locator: request.locator.clone(),
                media_type: request.media_type.clone(),
                bytes: None,
            });
        }

        if let Some(bytes) = self.cache.read().await.get(&request.locator) {
            return Ok(ResolvedResource {
                locator: request.locator.clone(),
                media_type: request.media_type.clone(),
                bytes: Some(bytes.clone()),
            });
        }

        let bytes = if Self::is_remote(&request.locator) {
            self.fetch_remote(&request.locator).await?
        } else {
            Self::read_local(&request.locator).await?
        };

        self.cache
            .write()
            .await
            .insert(request.locator.clone(), bytes.clone());

        Ok(ResolvedResource {
            locator: request.locator.clone(),
            media_type: request.media_type.clone(),
            bytes: Some(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver() -> HttpResourceResolver {
        HttpResourceResolver::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_passthrough_is_not_fetched() {
        let resolver = resolver();
        let request = ResourceRequest::passthrough("assets/ffmpeg/worker.js", "text/javascript");

        let resolved = resolver.resolve(&request).await.unwrap();

        assert_eq!(resolved.locator, "assets/ffmpeg/worker.js");
        assert!(!resolved.is_inline());
        assert_eq!(resolver.cached_count().await, 0);
    }

    #[tokio::test]
    async fn test_local_file_is_read_and_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ffmpeg-core.js");
        std::fs::write(&path, b"core").unwrap();
        let locator = path.to_string_lossy().to_string();

        let resolver = resolver();
        let request = ResourceRequest::inline(&locator, "text/javascript");

        let first = resolver.resolve(&request).await.unwrap();
        assert_eq!(first.bytes.as_deref(), Some(&b"core"[..]));

        // Cached: removing the file does not matter any more
        std::fs::remove_file(&path).unwrap();
        let second = resolver.resolve(&request).await.unwrap();
        assert_eq!(second.bytes.as_deref(), Some(&b"core"[..]));
        assert_eq!(resolver.cached_count().await, 1);
    }

    #[tokio::test]
    async fn test_file_url_prefix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ffmpeg-core.wasm");
        std::fs::write(&path, b"\0asm").unwrap();

        let request = ResourceRequest::inline(
            format!("file://{}", path.to_string_lossy()),
            "application/wasm",
        );
        let resolved = resolver().resolve(&request).await.unwrap();
        assert_eq!(resolved.bytes.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let request = ResourceRequest::inline("/nonexistent/ffmpeg-core.js", "text/javascript");
        let result = resolver().resolve(&request).await;
        assert!(matches!(result, Err(ResourceError::NotFound { .. })));
    }
}
