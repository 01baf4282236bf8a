//! Reads the listing summary (work total, pagination, filter sidebar) from
//! the first page of a tag listing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::formats::FilterStatistics;

static HEADING: LazyLock<Selector> = LazyLock::new(|| selector("h2.heading"));
static PAGINATION_LINKS: LazyLock<Selector> =
    LazyLock::new(|| selector("ol.pagination li a, ul.pagination li a"));
static LIST_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("li"));
static ITEM_NAME: LazyLock<Selector> = LazyLock::new(|| selector("a, label"));
static ITEM_COUNT: LazyLock<Selector> = LazyLock::new(|| selector("span.count"));

static WORKS_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"of\s+([\d,]+)\s+Works").expect("static regex"));
static WORKS_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Works\s*\(([\d,]+)\)").expect("static regex"));
static NAME_WITH_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*\(([\d,]+)\)$").expect("static regex"));
static PAREN_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([\d,]+)\)").expect("static regex"));

/// Below this many sidebar entries the `include_` section is read as well.
const MIN_SIDEBAR_ENTRIES: usize = 5;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingSummary {
    pub total_works: u64,
    /// Highest page number linked from the pagination control.
    pub pagination_max: Option<u32>,
    pub filter_stats: FilterStatistics,
}

pub fn parse_listing(html: &str) -> ListingSummary {
    let document = Html::parse_document(html);

    ListingSummary {
        total_works: total_works(&document),
        pagination_max: pagination_max(&document),
        filter_stats: filter_statistics(&document),
    }
}

fn total_works(document: &Html) -> u64 {
    document
        .select(&HEADING)
        .map(collapse_text)
        .find_map(|text| {
            WORKS_OF
                .captures(&text)
                .or_else(|| WORKS_PAREN.captures(&text))
                .and_then(|caps| parse_count(&caps[1]))
        })
        .unwrap_or(0)
}

fn pagination_max(document: &Html) -> Option<u32> {
    document
        .select(&PAGINATION_LINKS)
        .filter_map(|link| collapse_text(link).parse::<u32>().ok())
        .max()
}

fn filter_statistics(document: &Html) -> FilterStatistics {
    let mut stats = FilterStatistics {
        characters: sidebar_section(document, "exclude_character_tags"),
        relationships: sidebar_section(document, "exclude_relationship_tags"),
        ratings: sidebar_section(document, "exclude_rating_tags"),
        warnings: sidebar_section(document, "exclude_archive_warning_tags"),
        categories: sidebar_section(document, "exclude_category_tags"),
        fandoms: sidebar_section(document, "exclude_fandom_tags"),
    };

    if stats.characters.len() < MIN_SIDEBAR_ENTRIES {
        stats
            .characters
            .extend(sidebar_section(document, "include_character_tags"));
    }
    if stats.relationships.len() < MIN_SIDEBAR_ENTRIES {
        stats
            .relationships
            .extend(sidebar_section(document, "include_relationship_tags"));
    }

    stats
}

fn sidebar_section(document: &Html, id: &str) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    let Ok(section) = Selector::parse(&format!("dd#{id}")) else {
        return counts;
    };

    for dd in document.select(&section) {
        for item in dd.select(&LIST_ITEM) {
            if let Some((name, count)) = sidebar_entry(item) {
                counts.insert(name, count);
            }
        }
    }
    counts
}

fn sidebar_entry(item: ElementRef<'_>) -> Option<(String, u64)> {
    let text = collapse_text(item);
    if let Some(caps) = NAME_WITH_COUNT.captures(&text) {
        let name = caps[1].trim();
        if let Some(count) = parse_count(&caps[2])
            && !name.is_empty()
        {
            return Some((name.to_owned(), count));
        }
    }

    let name_el = item.select(&ITEM_NAME).next()?;
    let count_el = item.select(&ITEM_COUNT).next()?;
    let count_text = collapse_text(count_el);
    let count = PAREN_COUNT
        .captures(&count_text)
        .and_then(|caps| parse_count(&caps[1]))?;

    let mut name = collapse_text(name_el);
    // A label wraps the count span, so its text ends with "(N)".
    if let Some(stripped) = name.strip_suffix(count_text.as_str()) {
        name = stripped.trim().to_owned();
    }
    (!name.is_empty()).then_some((name, count))
}

/// Element text with whitespace runs collapsed. Text nodes are joined
/// as-is, so inline markup such as `<a>3</a>/10` stays `3/10`.
pub(crate) fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| *c != ',').collect();
    digits.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<!doctype html>
<html><body>
  <h2 class="heading">1 - 20 of 1,234 Works in <a class="tag" href="/tags/Example/works">Example</a></h2>
  <ol class="pagination actions">
    <li class="previous"><span class="disabled">Previous</span></li>
    <li><span class="current">1</span></li>
    <li><a href="?page=2">2</a></li>
    <li><a href="?page=62">62</a></li>
    <li class="next"><a rel="next" href="?page=2">Next →</a></li>
  </ol>
  <form id="work-filters">
    <dd id="exclude_rating_tags">
      <ul>
        <li><label><span class="indicator"></span><span>Teen And Up Audiences (512)</span></label></li>
        <li><label><span class="indicator"></span><span>Explicit (1,002)</span></label></li>
      </ul>
    </dd>
    <dd id="exclude_character_tags">
      <ul>
        <li><label><span>Alice   Smith (300)</span></label></li>
        <li><label><span>Bob (25)</span></label></li>
      </ul>
    </dd>
    <dd id="include_character_tags">
      <ul>
        <li><label><span>Carol (7)</span></label></li>
      </ul>
    </dd>
    <dd id="exclude_relationship_tags">
      <ul>
        <li><a href="/tags/A*s*B">Alice/Bob</a> <span class="count">(40)</span> <em>extra</em></li>
      </ul>
    </dd>
  </form>
</body></html>"#;

    #[test]
    fn reads_total_works_and_pagination() {
        let summary = parse_listing(LISTING);
        assert_eq!(summary.total_works, 1234);
        assert_eq!(summary.pagination_max, Some(62));
    }

    #[test]
    fn reads_sidebar_counts_with_separators() {
        let stats = parse_listing(LISTING).filter_stats;
        assert_eq!(stats.ratings.get("Explicit"), Some(&1002));
        assert_eq!(stats.ratings.get("Teen And Up Audiences"), Some(&512));
        assert_eq!(stats.characters.get("Alice Smith"), Some(&300));
        assert!(stats.warnings.is_empty());
    }

    #[test]
    fn sparse_sections_merge_include_entries() {
        let stats = parse_listing(LISTING).filter_stats;
        assert_eq!(stats.characters.len(), 3);
        assert_eq!(stats.characters.get("Carol"), Some(&7));
    }

    #[test]
    fn falls_back_to_link_and_count_span() {
        let stats = parse_listing(LISTING).filter_stats;
        assert_eq!(stats.relationships.get("Alice/Bob"), Some(&40));
    }

    #[test]
    fn parenthesised_heading_format() {
        let summary = parse_listing(r#"<h2 class="heading">Works (45)</h2>"#);
        assert_eq!(summary.total_works, 45);
        assert_eq!(summary.pagination_max, None);
    }

    #[test]
    fn empty_page_yields_defaults() {
        let summary = parse_listing("<html><body></body></html>");
        assert_eq!(summary, ListingSummary::default());
    }
}
