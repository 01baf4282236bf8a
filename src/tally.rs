//! Tag frequency tables built by folding work records.
//!
//! A work contributes at most one count to any tag, no matter how often the
//! tag is repeated on it. Counts of a sampled download can afterwards be
//! scaled to population estimates with [`TagTally::estimate`].

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::formats::{DownloadManifest, UNKNOWN_YEAR, WorkRecord};

/// Collapses whitespace runs and trims; `None` when nothing is left.
/// Case is preserved.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let normalized = tag.split_whitespace().collect::<Vec<_>>().join(" ");
    (!normalized.is_empty()).then_some(normalized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    Characters,
    Relationships,
    Fandoms,
    Ratings,
    Warnings,
    Categories,
    Freeforms,
}

impl TagCategory {
    pub const ALL: [TagCategory; 7] = [
        TagCategory::Characters,
        TagCategory::Relationships,
        TagCategory::Fandoms,
        TagCategory::Ratings,
        TagCategory::Warnings,
        TagCategory::Categories,
        TagCategory::Freeforms,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::Relationships => "relationships",
            Self::Fandoms => "fandoms",
            Self::Ratings => "ratings",
            Self::Warnings => "warnings",
            Self::Categories => "categories",
            Self::Freeforms => "freeforms",
        }
    }

    /// Raw tags of this category on `work`, in page order.
    pub fn tags_of(self, work: &WorkRecord) -> &[String] {
        match self {
            Self::Characters => &work.characters,
            Self::Relationships => &work.relationships,
            Self::Fandoms => &work.fandoms,
            Self::Ratings => std::slice::from_ref(&work.rating),
            Self::Warnings => &work.warnings,
            Self::Categories => &work.categories,
            Self::Freeforms => &work.freeforms,
        }
    }
}

impl std::fmt::Display for TagCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counter that remembers the order in which tags were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagCounts {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl TagCounts {
    pub fn increment(&mut self, tag: &str) {
        self.add(tag, 1);
    }

    pub fn add(&mut self, tag: &str, amount: u64) {
        match self.index.get(tag) {
            Some(&idx) => self.entries[idx].1 += amount,
            None => {
                self.index.insert(tag.to_owned(), self.entries.len());
                self.entries.push((tag.to_owned(), amount));
            }
        }
    }

    pub fn get(&self, tag: &str) -> Option<u64> {
        self.index.get(tag).map(|&idx| self.entries[idx].1)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.index.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(tag, count)| (tag.as_str(), *count))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(tag, _)| tag.as_str())
    }

    /// Highest count first; equal counts keep first-seen order.
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }

    /// Multiplies every count by `factor`, truncating toward zero.
    pub fn scale(&mut self, factor: f64) {
        for (_, count) in &mut self.entries {
            *count = scale_count(*count, factor);
        }
    }
}

pub fn scale_count(count: u64, factor: f64) -> u64 {
    (count as f64 * factor) as u64
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFrequencyTable {
    pub global: TagCounts,
    /// Year → tag counts, years in ascending order.
    pub by_year: BTreeMap<String, TagCounts>,
}

impl TagFrequencyTable {
    fn record(&mut self, year: &str, tag: &str) {
        self.global.increment(tag);
        self.by_year.entry(year.to_owned()).or_default().increment(tag);
    }

    fn scale(&mut self, factor: f64) {
        self.global.scale(factor);
        for counts in self.by_year.values_mut() {
            counts.scale(factor);
        }
    }
}

/// Frequency tables for every tag category of a set of works.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagTally {
    characters: TagFrequencyTable,
    relationships: TagFrequencyTable,
    fandoms: TagFrequencyTable,
    ratings: TagFrequencyTable,
    warnings: TagFrequencyTable,
    categories: TagFrequencyTable,
    freeforms: TagFrequencyTable,
    works_by_year: TagCounts,
    works: u64,
    scale_factor: Option<f64>,
}

impl TagTally {
    pub fn table(&self, category: TagCategory) -> &TagFrequencyTable {
        match category {
            TagCategory::Characters => &self.characters,
            TagCategory::Relationships => &self.relationships,
            TagCategory::Fandoms => &self.fandoms,
            TagCategory::Ratings => &self.ratings,
            TagCategory::Warnings => &self.warnings,
            TagCategory::Categories => &self.categories,
            TagCategory::Freeforms => &self.freeforms,
        }
    }

    fn table_mut(&mut self, category: TagCategory) -> &mut TagFrequencyTable {
        match category {
            TagCategory::Characters => &mut self.characters,
            TagCategory::Relationships => &mut self.relationships,
            TagCategory::Fandoms => &mut self.fandoms,
            TagCategory::Ratings => &mut self.ratings,
            TagCategory::Warnings => &mut self.warnings,
            TagCategory::Categories => &mut self.categories,
            TagCategory::Freeforms => &mut self.freeforms,
        }
    }

    /// Works folded in, before any scaling.
    pub fn works(&self) -> u64 {
        self.works
    }

    /// Works per year bucket (scaled along with the tag counts).
    pub fn works_by_year(&self) -> &TagCounts {
        &self.works_by_year
    }

    /// Factor the counts were multiplied by, if they are estimates.
    pub fn scale_factor(&self) -> Option<f64> {
        self.scale_factor
    }

    pub fn is_estimate(&self) -> bool {
        self.scale_factor.is_some()
    }

    pub fn fold_work(mut self, work: &WorkRecord) -> Self {
        let year = normalize_tag(&work.year).unwrap_or_else(|| UNKNOWN_YEAR.to_owned());

        for category in TagCategory::ALL {
            let mut seen = HashSet::new();
            let table = self.table_mut(category);
            for tag in category.tags_of(work) {
                let Some(tag) = normalize_tag(tag) else {
                    continue;
                };
                if seen.insert(tag.clone()) {
                    table.record(&year, &tag);
                }
            }
        }

        self.works_by_year.increment(&year);
        self.works += 1;
        self
    }

    pub fn fold_works<'a, I>(self, works: I) -> Self
    where
        I: IntoIterator<Item = &'a WorkRecord>,
    {
        works.into_iter().fold(self, Self::fold_work)
    }

    /// Scales every count by the manifest's sampling factor when the
    /// download was sampled. Exact tallies pass through unchanged.
    pub fn estimate(mut self, manifest: &DownloadManifest) -> Self {
        let Some(factor) = manifest.scale_factor() else {
            return self;
        };
        if self.scale_factor.is_some() {
            return self;
        }

        for category in TagCategory::ALL {
            self.table_mut(category).scale(factor);
        }
        self.works_by_year.scale(factor);
        self.scale_factor = Some(factor);
        self
    }
}

/// Folds `works` and applies the manifest's sampling factor.
pub fn tally_works(works: &[WorkRecord], manifest: &DownloadManifest) -> TagTally {
    TagTally::default().fold_works(works).estimate(manifest)
}
