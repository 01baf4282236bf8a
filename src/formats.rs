use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Year bucket for works whose listing shows no parseable date.
pub const UNKNOWN_YEAR: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    pub source: String,
    pub title: String,
    pub author: String,
    pub url: String,
    pub rating: String,
    pub warnings: Vec<String>,
    pub categories: Vec<String>,
    pub fandoms: Vec<String>,
    pub relationships: Vec<String>,
    pub characters: Vec<String>,
    pub freeforms: Vec<String>,
    pub words: u64,
    pub chapters: String,
    pub kudos: u64,
    pub hits: u64,
    pub bookmarks: u64,
    pub comments: u64,
    pub year: String,
}

impl WorkRecord {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: String::new(),
            author: String::new(),
            url: String::new(),
            rating: String::new(),
            warnings: Vec::new(),
            categories: Vec::new(),
            fandoms: Vec::new(),
            relationships: Vec::new(),
            characters: Vec::new(),
            freeforms: Vec::new(),
            words: 0,
            chapters: "0".to_owned(),
            kudos: 0,
            hits: 0,
            bookmarks: 0,
            comments: 0,
            year: UNKNOWN_YEAR.to_owned(),
        }
    }
}

/// Population counts from the listing's filter sidebar, keyed by tag name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterStatistics {
    pub ratings: BTreeMap<String, u64>,
    pub warnings: BTreeMap<String, u64>,
    pub categories: BTreeMap<String, u64>,
    pub characters: BTreeMap<String, u64>,
    pub relationships: BTreeMap<String, u64>,
    pub fandoms: BTreeMap<String, u64>,
}

impl FilterStatistics {
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
            && self.warnings.is_empty()
            && self.categories.is_empty()
            && self.characters.is_empty()
            && self.relationships.is_empty()
            && self.fandoms.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    #[default]
    Exhaustive,
    Sampled,
}

impl std::fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhaustive => f.write_str("exhaustive"),
            Self::Sampled => f.write_str("sampled"),
        }
    }
}

/// Persisted as `download_info.json` next to the cached pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadManifest {
    pub total_pages: u32,
    pub total_works: u64,
    pub downloaded_pages: u32,
    pub sampling_mode: SamplingMode,
    pub sampling_factor: f64,
    pub is_sampling: bool,
    #[serde(default)]
    pub filter_stats: FilterStatistics,
}

impl DownloadManifest {
    /// Manifest describing `downloaded_pages` out of `total_pages`; the
    /// sampling factor and flag are derived from the two counts.
    pub fn new(
        total_pages: u32,
        total_works: u64,
        downloaded_pages: u32,
        sampling_mode: SamplingMode,
        filter_stats: FilterStatistics,
    ) -> Self {
        let sampling_factor = crate::sampling::sampling_factor(total_pages, downloaded_pages);
        Self {
            total_pages,
            total_works,
            downloaded_pages,
            sampling_mode,
            sampling_factor,
            is_sampling: downloaded_pages < total_pages,
            filter_stats,
        }
    }

    /// Used when the analysis phase finds no usable manifest: every cached
    /// page counts as the whole population and nothing is scaled.
    pub fn unsampled(pages: u32) -> Self {
        Self {
            total_pages: pages,
            total_works: 0,
            downloaded_pages: pages,
            sampling_mode: SamplingMode::Exhaustive,
            sampling_factor: 1.0,
            is_sampling: false,
            filter_stats: FilterStatistics::default(),
        }
    }

    /// Factor applied to counts, or `None` when they are exact.
    pub fn scale_factor(&self) -> Option<f64> {
        (self.is_sampling && self.sampling_factor > 1.0).then_some(self.sampling_factor)
    }
}
