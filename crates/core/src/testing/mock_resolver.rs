//! Mock resource resolver for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::{ResolvedResource, ResourceError, ResourceRequest, ResourceResolver};

/// Mock implementation of the ResourceResolver trait.
///
/// Inline requests resolve to the locator's own bytes, so tests can tell
/// which resource a runner received.
#[derive(Debug, Default)]
pub struct MockResourceResolver {
    /// Every request, in order.
    requests: Arc<RwLock<Vec<ResourceRequest>>>,
    /// Locators that fail to resolve.
    failing: Arc<RwLock<HashSet<String>>>,
}

impl MockResourceResolver {
    /// Create a new mock resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request for `locator` fail until cleared.
    pub async fn fail_locator(&self, locator: impl Into<String>) {
        self.failing.write().await.insert(locator.into());
    }

    /// Stop failing any locator.
    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    /// All requests received.
    pub async fn recorded_requests(&self) -> Vec<ResourceRequest> {
        self.requests.read().await.clone()
    }

    /// Number of requests received.
    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait]
impl ResourceResolver for MockResourceResolver {
    async fn resolve(&self, request: &ResourceRequest) -> Result<ResolvedResource, ResourceError> {
        self.requests.write().await.push(request.clone());

        if self.failing.read().await.contains(&request.locator) {
            return Err(ResourceError::fetch_failed(
                &request.locator,
                "mock failure",
            ));
        }

        Ok(ResolvedResource {
            locator: request.locator.clone(),
            media_type: request.media_type.clone(),
            bytes: request
                .inline
                .then(|| Bytes::from(request.locator.clone().into_bytes())),
        })
    }
}
