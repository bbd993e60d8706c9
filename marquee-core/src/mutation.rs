//! Mutation payloads accepted by the write path, and their validation.
//!
//! Validation happens here, before any store is touched. A payload that
//! passes `validate()` can always be applied.

use crate::{
    Content, ContentId, LifecycleState, MarqueeError, MarqueeResult, Media, MediaId,
    MediaProvider, MediaSource, MediaType, Timestamp, ValidationError,
};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 255;

/// Maximum language tag length in characters.
pub const MAX_LANGUAGE_LEN: usize = 32;

/// Maximum category name length in characters.
pub const MAX_CATEGORY_LEN: usize = 100;

/// Maximum media locator length in characters.
pub const MAX_LOCATOR_LEN: usize = 2048;

/// Trim category names, drop blanks, de-duplicate.
pub fn normalize_categories<S: AsRef<str>>(names: &[S]) -> BTreeSet<String> {
    names
        .iter()
        .map(|n| n.as_ref().trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_title(title: &str) -> MarqueeResult<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        }
        .into());
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(MarqueeError::invalid(
            "title",
            format!("must be at most {} characters", MAX_TITLE_LEN),
        ));
    }
    Ok(())
}

fn validate_language(language: Option<&str>) -> MarqueeResult<()> {
    if let Some(lang) = language {
        if lang.trim().is_empty() {
            return Err(MarqueeError::invalid("language", "must not be blank"));
        }
        if lang.chars().count() > MAX_LANGUAGE_LEN {
            return Err(MarqueeError::invalid(
                "language",
                format!("must be at most {} characters", MAX_LANGUAGE_LEN),
            ));
        }
    }
    Ok(())
}

fn validate_categories(categories: &[String]) -> MarqueeResult<()> {
    if let Some(name) = categories
        .iter()
        .find(|c| c.trim().chars().count() > MAX_CATEGORY_LEN)
    {
        return Err(MarqueeError::invalid(
            "categories",
            format!("'{}' exceeds {} characters", name.trim(), MAX_CATEGORY_LEN),
        ));
    }
    Ok(())
}

fn validate_locator(source: MediaSource, locator: &str) -> MarqueeResult<()> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "locator".to_string(),
        }
        .into());
    }
    if locator.chars().count() > MAX_LOCATOR_LEN {
        return Err(MarqueeError::invalid(
            "locator",
            format!("must be at most {} characters", MAX_LOCATOR_LEN),
        ));
    }
    if source == MediaSource::External
        && !(locator.starts_with("http://") || locator.starts_with("https://"))
    {
        return Err(MarqueeError::invalid(
            "locator",
            "external media must be an http(s) URL",
        ));
    }
    Ok(())
}

// ============================================================================
// CONTENT
// ============================================================================

/// Payload for creating a Content item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentDraft {
    pub title: String,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub language: Option<String>,
    pub duration_secs: Option<u32>,
    pub publication_date: Option<NaiveDate>,
    pub state: LifecycleState,
}

impl ContentDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_categories<S: Into<String>>(mut self, categories: impl IntoIterator<Item = S>) -> Self {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_publication_date(mut self, date: NaiveDate) -> Self {
        self.publication_date = Some(date);
        self
    }

    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = state;
        self
    }

    pub fn published(self) -> Self {
        self.with_state(LifecycleState::Published)
    }

    pub fn validate(&self) -> MarqueeResult<()> {
        validate_title(&self.title)?;
        validate_language(self.language.as_deref())?;
        validate_categories(&self.categories)
    }

    /// Materialize the draft as a new, not yet persisted, aggregate.
    ///
    /// The version starts at zero; the primary store assigns the first version.
    pub fn into_content(self, content_id: ContentId, now: Timestamp) -> Content {
        Content {
            content_id,
            title: self.title.trim().to_string(),
            description: self.description,
            categories: normalize_categories(&self.categories),
            language: self.language.map(|l| l.trim().to_string()),
            duration_secs: self.duration_secs,
            publication_date: self.publication_date,
            state: self.state,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a Content item. `None` leaves a field unchanged.
///
/// Optional fields take `Some(None)` to clear them. On the wire an absent
/// field means unchanged and an explicit `null` means clear.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    pub categories: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub language: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<Option<u32>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<Option<NaiveDate>>,
    pub state: Option<LifecycleState>,
}

/// A field that is present on the wire, possibly as `null`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ContentPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn state(state: LifecycleState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> MarqueeResult<()> {
        if self.is_empty() {
            return Err(MarqueeError::invalid("patch", "contains no changes"));
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        validate_language(self.language.as_ref().and_then(Option::as_deref))?;
        if let Some(categories) = &self.categories {
            validate_categories(categories)?;
        }
        Ok(())
    }

    /// Apply the patch in place. Does not touch the version; the store owns it.
    pub fn apply(&self, content: &mut Content, now: Timestamp) {
        if let Some(title) = &self.title {
            content.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            content.description = description.clone();
        }
        if let Some(categories) = &self.categories {
            content.categories = normalize_categories(categories);
        }
        if let Some(language) = &self.language {
            content.language = language.as_ref().map(|l| l.trim().to_string());
        }
        if let Some(duration) = self.duration_secs {
            content.duration_secs = duration;
        }
        if let Some(date) = self.publication_date {
            content.publication_date = date;
        }
        if let Some(state) = self.state {
            content.state = state;
        }
        content.updated_at = now;
    }
}

// ============================================================================
// MEDIA
// ============================================================================

/// Payload for attaching Media to a Content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDraft {
    pub media_type: MediaType,
    pub source: MediaSource,
    #[serde(default)]
    pub provider: MediaProvider,
    pub locator: String,
    pub duration_secs: Option<u32>,
}

impl MediaDraft {
    /// Media uploaded by the team.
    pub fn upload(media_type: MediaType, path: impl Into<String>) -> Self {
        Self {
            media_type,
            source: MediaSource::Upload,
            provider: MediaProvider::Team,
            locator: path.into(),
            duration_secs: None,
        }
    }

    /// Media hosted by an external provider.
    pub fn external(media_type: MediaType, provider: MediaProvider, url: impl Into<String>) -> Self {
        Self {
            media_type,
            source: MediaSource::External,
            provider,
            locator: url.into(),
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn validate(&self) -> MarqueeResult<()> {
        validate_locator(self.source, &self.locator)
    }

    pub fn into_media(self, media_id: MediaId, content_id: ContentId, now: Timestamp) -> Media {
        Media {
            media_id,
            content_id,
            media_type: self.media_type,
            source: self.source,
            provider: self.provider,
            locator: self.locator.trim().to_string(),
            duration_secs: self.duration_secs,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a Media record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaPatch {
    pub media_type: Option<MediaType>,
    pub source: Option<MediaSource>,
    pub provider: Option<MediaProvider>,
    pub locator: Option<String>,
    pub duration_secs: Option<u32>,
}

impl MediaPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Validate against the record being patched, since the locator rule
    /// depends on the resulting source.
    pub fn validate_against(&self, current: &Media) -> MarqueeResult<()> {
        if self.is_empty() {
            return Err(MarqueeError::invalid("patch", "contains no changes"));
        }
        let source = self.source.unwrap_or(current.source);
        let locator = self.locator.as_deref().unwrap_or(&current.locator);
        validate_locator(source, locator)
    }

    pub fn apply(&self, media: &mut Media, now: Timestamp) {
        if let Some(media_type) = self.media_type {
            media.media_type = media_type;
        }
        if let Some(source) = self.source {
            media.source = source;
        }
        if let Some(provider) = self.provider {
            media.provider = provider;
        }
        if let Some(locator) = &self.locator {
            media.locator = locator.trim().to_string();
        }
        if let Some(duration) = self.duration_secs {
            media.duration_secs = Some(duration);
        }
        media.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;
    use chrono::Utc;

    #[test]
    fn test_normalize_categories() {
        let cats = normalize_categories(&[" news ", "", "news", "  ", "tech"]);
        assert_eq!(cats.into_iter().collect::<Vec<_>>(), vec!["news", "tech"]);
    }

    #[test]
    fn test_blank_title_rejected() {
        let err = ContentDraft::new("   ").validate().unwrap_err();
        assert!(matches!(
            err,
            MarqueeError::Validation(ValidationError::RequiredFieldMissing { .. })
        ));
    }

    #[test]
    fn test_long_title_rejected() {
        let draft = ContentDraft::new("x".repeat(MAX_TITLE_LEN + 1));
        assert!(draft.validate().is_err());
        assert!(ContentDraft::new("x".repeat(MAX_TITLE_LEN)).validate().is_ok());
    }

    #[test]
    fn test_long_language_rejected() {
        let draft = ContentDraft::new("Ep1").with_language("l".repeat(MAX_LANGUAGE_LEN + 1));
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_into_content_normalizes() {
        let now = Utc::now();
        let content = ContentDraft::new("  Ep1 ")
            .with_categories(["b", " a", "b "])
            .with_language(" en ")
            .into_content(ContentId::now_v7(), now);

        assert_eq!(content.title, "Ep1");
        assert_eq!(content.language.as_deref(), Some("en"));
        assert_eq!(content.categories.len(), 2);
        assert_eq!(content.state, LifecycleState::Draft);
        assert_eq!(content.version, 0);
    }

    #[test]
    fn test_empty_patch_rejected() {
        assert!(ContentPatch::default().validate().is_err());
        assert!(ContentPatch::title("Ep2").validate().is_ok());
    }

    #[test]
    fn test_patch_apply_leaves_unset_fields() {
        let now = Utc::now();
        let mut content = ContentDraft::new("Ep1")
            .with_description("first")
            .into_content(ContentId::now_v7(), now);
        let patch = ContentPatch {
            title: Some("Ep1 (remastered)".to_string()),
            state: Some(LifecycleState::Published),
            ..Default::default()
        };
        patch.apply(&mut content, now);

        assert_eq!(content.title, "Ep1 (remastered)");
        assert_eq!(content.description.as_deref(), Some("first"));
        assert!(content.is_published());
    }

    #[test]
    fn test_patch_clears_optional_fields() {
        let now = Utc::now();
        let mut content = ContentDraft::new("Ep1")
            .with_description("first")
            .with_language("en")
            .with_duration(1800)
            .into_content(ContentId::now_v7(), now);
        let patch = ContentPatch {
            description: Some(None),
            language: Some(None),
            duration_secs: Some(None),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());
        patch.apply(&mut content, now);

        assert_eq!(content.description, None);
        assert_eq!(content.language, None);
        assert_eq!(content.duration_secs, None);
        assert_eq!(content.title, "Ep1");
    }

    #[test]
    fn test_patch_wire_null_clears_and_absent_keeps() {
        let clear: ContentPatch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(clear.description, Some(None));
        assert_eq!(clear.language, None);

        let set: ContentPatch = serde_json::from_str(r#"{"language": "ar"}"#).unwrap();
        assert_eq!(set.language, Some(Some("ar".to_string())));
        assert_eq!(set.description, None);

        let back: ContentPatch = serde_json::from_value(serde_json::to_value(&clear).unwrap()).unwrap();
        assert_eq!(back, clear);
    }

    #[test]
    fn test_external_media_requires_url() {
        let bad = MediaDraft::external(MediaType::Video, MediaProvider::Youtube, "not-a-url");
        assert!(bad.validate().is_err());
        let good = MediaDraft::external(
            MediaType::Video,
            MediaProvider::Youtube,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        );
        assert!(good.validate().is_ok());
        assert!(MediaDraft::upload(MediaType::Audio, "").validate().is_err());
    }

    #[test]
    fn test_media_patch_validates_resulting_source() {
        let now = Utc::now();
        let media = MediaDraft::upload(MediaType::Audio, "uploads/a.mp3").into_media(
            MediaId::now_v7(),
            ContentId::now_v7(),
            now,
        );
        let switch_to_external = MediaPatch {
            source: Some(MediaSource::External),
            ..Default::default()
        };
        assert!(switch_to_external.validate_against(&media).is_err());

        let with_url = MediaPatch {
            source: Some(MediaSource::External),
            locator: Some("https://cdn.example.com/a.mp3".to_string()),
            ..Default::default()
        };
        assert!(with_url.validate_against(&media).is_ok());
    }
}
