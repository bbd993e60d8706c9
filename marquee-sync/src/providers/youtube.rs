//! YouTube Data API v3 provider.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use marquee_core::{MarqueeError, MarqueeResult, MediaProvider, MediaType, ProviderError};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use super::{ExternalMediaItem, ExternalMediaProvider};

const PROVIDER: &str = "youtube";

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static VIDEO_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.)?(?:youtube\.com/watch\?v=|youtu\.be/)(?P<id>[A-Za-z0-9_-]{11})",
    )
    .expect("video URL pattern is valid")
});

static ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").expect("duration pattern is valid")
});

/// Extract the 11-character video id from a watch or short URL.
pub fn video_id(url: &str) -> Option<&str> {
    VIDEO_URL
        .captures(url)
        .and_then(|c| c.name("id"))
        .map(|m| m.as_str())
}

/// Seconds in an ISO-8601 `PT#H#M#S` duration. Unparseable input is zero.
pub fn parse_iso8601_duration(iso: &str) -> u32 {
    let Some(caps) = ISO_DURATION.captures(iso) else {
        return 0;
    };
    let part = |i: usize| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    part(1)
        .saturating_mul(3600)
        .saturating_add(part(2).saturating_mul(60))
        .saturating_add(part(3))
}

pub fn canonical_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct VideosResponse {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(default)]
    snippet: Snippet,
    #[serde(rename = "contentDetails", default)]
    content_details: ContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
    default_audio_language: Option<String>,
    default_language: Option<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

/// Normalize the first item of a videos response.
///
/// An empty response means the video does not exist. A video without a
/// usable title is a malformed response, not a missing one.
pub(crate) fn item_from_response(
    video_id: &str,
    response: VideosResponse,
) -> MarqueeResult<Option<ExternalMediaItem>> {
    let Some(video) = response.items.into_iter().next() else {
        return Ok(None);
    };
    let snippet = video.snippet;
    let title = snippet
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            MarqueeError::from(ProviderError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: format!("video {} has no title", video_id),
            })
        })?;

    let publication_date = snippet
        .published_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.date_naive());
    let thumbnail_url = snippet
        .thumbnails
        .and_then(|t| t.high.or(t.default))
        .map(|t| t.url);

    Ok(Some(ExternalMediaItem {
        provider: MediaProvider::Youtube,
        provider_id: video_id.to_string(),
        url: canonical_url(video_id),
        title,
        description: snippet.description,
        media_type: MediaType::Video,
        duration_secs: video
            .content_details
            .duration
            .as_deref()
            .map(parse_iso8601_duration),
        language: snippet.default_audio_language.or(snippet.default_language),
        category: None,
        publication_date,
        thumbnail_url,
    }))
}

// ============================================================================
// PROVIDER
// ============================================================================

/// Fetches video metadata from the YouTube Data API.
pub struct YouTubeProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl YouTubeProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from `MARQUEE_YOUTUBE_API_KEY`. `None` when unset.
    pub fn from_env() -> Option<Self> {
        std::env::var("MARQUEE_YOUTUBE_API_KEY").ok().map(Self::new)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn request_failed(reason: impl Into<String>) -> MarqueeError {
    ProviderError::RequestFailed {
        provider: PROVIDER.to_string(),
        reason: reason.into(),
    }
    .into()
}

#[async_trait]
impl ExternalMediaProvider for YouTubeProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn supports(&self, url: &str) -> bool {
        video_id(url).is_some()
    }

    async fn fetch(&self, url: &str) -> MarqueeResult<Option<ExternalMediaItem>> {
        let Some(id) = video_id(url) else {
            return Ok(None);
        };

        let response = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "snippet,contentDetails"),
                ("id", id),
                ("key", self.api_key.as_str()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| request_failed(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(request_failed(format!("status {}", status)));
        }

        let body: VideosResponse = response.json().await.map_err(|e| {
            MarqueeError::from(ProviderError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })
        })?;

        item_from_response(id, body)
    }
}

impl std::fmt::Debug for YouTubeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
