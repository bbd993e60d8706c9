//! External media providers
//!
//! Providers turn an external URL into a normalized [`ExternalMediaItem`] that
//! the import service feeds into the regular write path.

pub mod youtube;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use marquee_core::{MarqueeResult, MediaProvider, MediaType};
use serde::{Deserialize, Serialize};

pub use youtube::YouTubeProvider;

/// Metadata of a media item hosted by an external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMediaItem {
    pub provider: MediaProvider,
    /// The provider's own identifier for the item.
    pub provider_id: String,
    /// Canonical URL.
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub media_type: MediaType,
    pub duration_secs: Option<u32>,
    pub language: Option<String>,
    pub category: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub thumbnail_url: Option<String>,
}

/// Read-only, URL-driven provider.
#[async_trait]
pub trait ExternalMediaProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this provider recognizes the URL.
    fn supports(&self, url: &str) -> bool;

    /// Fetch item metadata. `Ok(None)` when the provider has no such item.
    async fn fetch(&self, url: &str) -> MarqueeResult<Option<ExternalMediaItem>>;
}

/// Ordered set of providers, consulted at call time.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ExternalMediaProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn ExternalMediaProvider>>) -> Self {
        Self { providers }
    }

    pub fn register(&mut self, provider: Arc<dyn ExternalMediaProvider>) {
        self.providers.push(provider);
    }

    /// First provider that supports the URL.
    pub fn resolve(&self, url: &str) -> Option<Arc<dyn ExternalMediaProvider>> {
        self.providers.iter().find(|p| p.supports(url)).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.name()))
            .finish()
    }
}
