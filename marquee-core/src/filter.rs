//! Discovery filters and pagination

use crate::{ContentId, ContentProjection, IndexDocument, LifecycleState, MediaType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default page size for discovery queries.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Filter set accepted by the search index.
///
/// Every set field must match; an empty filter matches every published document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Free text. Every whitespace-separated term must appear in the title
    /// or description, case-insensitively.
    pub q: Option<String>,
    pub media_type: Option<MediaType>,
    pub category: Option<String>,
    pub language: Option<String>,
    /// Inclusive lower bound on publication date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on publication date.
    pub date_to: Option<NaiveDate>,
}

impl SearchFilters {
    pub fn text(q: impl Into<String>) -> Self {
        Self {
            q: Some(q.into()),
            ..Default::default()
        }
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Whether a document satisfies every set filter.
    ///
    /// Lifecycle state is not checked here; adapters exclude non-published
    /// documents separately.
    pub fn matches(&self, doc: &IndexDocument) -> bool {
        if let Some(q) = self.q.as_deref() {
            let haystack = format!(
                "{} {}",
                doc.title,
                doc.description.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            if !q
                .split_whitespace()
                .all(|term| haystack.contains(&term.to_lowercase()))
            {
                return false;
            }
        }
        if let Some(media_type) = self.media_type {
            if doc.media_type != Some(media_type) {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref() {
            let category = category.trim();
            if !doc.categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
                return false;
            }
        }
        if let Some(language) = self.language.as_deref() {
            match doc.language.as_deref() {
                Some(lang) if lang.eq_ignore_ascii_case(language.trim()) => {}
                _ => return false,
            }
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(date) = doc.publication_date else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }
        true
    }
}

/// Offset pagination, forwarded verbatim to the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Pagination {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Ranked identifiers returned by a search index query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchHits {
    /// Total matching documents, ignoring pagination.
    pub total: usize,
    /// Identifiers of the requested page, in ranking order.
    pub ids: Vec<ContentId>,
}

/// Editorial listing served from the primary store. Unlike discovery it
/// includes drafts and archived items unless `state` narrows it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentListQuery {
    /// Case-insensitive substring of the title or description.
    pub q: Option<String>,
    pub media_type: Option<MediaType>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub state: Option<LifecycleState>,
    #[serde(default)]
    pub page: Pagination,
}

impl ContentListQuery {
    pub fn text(q: impl Into<String>) -> Self {
        Self {
            q: Some(q.into()),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_page(mut self, page: Pagination) -> Self {
        self.page = page;
        self
    }

    pub fn matches(&self, projection: &ContentProjection) -> bool {
        let content = &projection.content;
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            let in_title = content.title.to_lowercase().contains(&q);
            let in_description = content
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&q));
            if !in_title && !in_description {
                return false;
            }
        }
        if let Some(media_type) = self.media_type {
            if projection.media.as_ref().map(|m| m.media_type) != Some(media_type) {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref() {
            let category = category.trim();
            if !content.categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
                return false;
            }
        }
        if let Some(language) = self.language.as_deref() {
            match content.language.as_deref() {
                Some(lang) if lang.eq_ignore_ascii_case(language.trim()) => {}
                _ => return false,
            }
        }
        if let Some(state) = self.state {
            if content.state != state {
                return false;
            }
        }
        true
    }

    /// Canonical form used in cache keys. Equivalent queries render the same.
    pub fn canonical(&self) -> String {
        fn part(value: Option<&str>) -> String {
            value
                .map(|v| v.trim().to_lowercase().replace('%', "%25").replace(':', "%3A"))
                .unwrap_or_default()
        }
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            part(self.q.as_deref()),
            self.media_type.map(|m| m.as_str()).unwrap_or_default(),
            part(self.category.as_deref()),
            part(self.language.as_deref()),
            self.state.map(|s| s.as_str()).unwrap_or_default(),
            self.page.limit,
            self.page.offset,
        )
    }
}

/// One page of an editorial listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentPage {
    /// Matching items, ignoring pagination.
    pub total: usize,
    pub items: Vec<ContentProjection>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityIdType, LifecycleState};
    use chrono::Utc;

    fn doc(title: &str, description: Option<&str>) -> IndexDocument {
        IndexDocument {
            content_id: ContentId::now_v7(),
            title: title.to_string(),
            description: description.map(str::to_string),
            categories: vec!["History".to_string()],
            language: Some("en".to_string()),
            media_type: Some(MediaType::Video),
            state: LifecycleState::Published,
            publication_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            created_at: Utc::now(),
            version: 1,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(SearchFilters::default().matches(&doc("Ep1", None)));
    }

    #[test]
    fn test_text_requires_every_term() {
        let d = doc("The Roman Empire", Some("Episode one of the series"));
        assert!(SearchFilters::text("roman episode").matches(&d));
        assert!(!SearchFilters::text("roman greek").matches(&d));
    }

    #[test]
    fn test_facets() {
        let d = doc("Ep1", None);
        assert!(SearchFilters::default().with_category("history").matches(&d));
        assert!(!SearchFilters::default().with_category("science").matches(&d));
        assert!(SearchFilters::default().with_language("EN").matches(&d));
        assert!(!SearchFilters::default()
            .with_media_type(MediaType::Audio)
            .matches(&d));
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let d = doc("Ep1", None);
        let day = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert!(SearchFilters::default().with_date_range(day, day).matches(&d));
        let later = NaiveDate::from_ymd_opt(2025, 3, 2);
        assert!(!SearchFilters::default().with_date_range(later, None).matches(&d));

        let mut undated = doc("Ep2", None);
        undated.publication_date = None;
        assert!(!SearchFilters::default().with_date_range(day, None).matches(&undated));
    }

    #[test]
    fn test_list_query_matches_drafts_and_substrings() {
        let content = crate::ContentDraft::new("The Roman Empire")
            .with_description("Episode one")
            .with_categories(["History"])
            .into_content(ContentId::now_v7(), Utc::now());
        let projection = ContentProjection::new(content, None);

        assert!(ContentListQuery::default().matches(&projection));
        assert!(ContentListQuery::text("man emp").matches(&projection));
        assert!(ContentListQuery::text("EPISODE").matches(&projection));
        assert!(!ContentListQuery::text("greek").matches(&projection));
        assert!(ContentListQuery::default()
            .with_category(" history ")
            .with_state(LifecycleState::Draft)
            .matches(&projection));
        assert!(!ContentListQuery::default()
            .with_state(LifecycleState::Published)
            .matches(&projection));
        assert!(!ContentListQuery::default()
            .with_media_type(MediaType::Video)
            .matches(&projection));
    }

    #[test]
    fn test_list_query_canonical_form() {
        let a = ContentListQuery::text(" Rome ").with_language("EN");
        let b = ContentListQuery::text("rome").with_language("en");
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.canonical(), format!("rome:::en::{}:0", DEFAULT_PAGE_LIMIT));

        let colon = ContentListQuery::text("a:b");
        let split = ContentListQuery::text("a").with_category("b");
        assert_ne!(colon.canonical(), split.canonical());
    }

    #[test]
    fn test_default_pagination() {
        assert_eq!(Pagination::default(), Pagination::new(0, DEFAULT_PAGE_LIMIT));
    }
}
