//! Turns one cached listing page into [`WorkRecord`]s.

use std::sync::LazyLock;

use chrono::{Datelike as _, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::formats::WorkRecord;
use crate::listing::{collapse_text, parse_count};

/// Base for work links on cached pages, which are stored without their URL.
pub const ARCHIVE_ORIGIN: &str = "https://archiveofourown.org/";

const NO_WARNINGS: &str = "No Archive Warnings Apply";

static WORK: LazyLock<Selector> = LazyLock::new(|| selector("li.work.blurb.group"));
static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| selector("h4.heading a"));
static AUTHOR: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[rel="author"]"#));
static REQUIRED_TAGS: LazyLock<Selector> = LazyLock::new(|| selector("ul.required-tags"));
static RATING: LazyLock<Selector> = LazyLock::new(|| selector("span.rating"));
static WARNING: LazyLock<Selector> = LazyLock::new(|| selector("span.warnings"));
static CATEGORY: LazyLock<Selector> = LazyLock::new(|| selector("span.category"));
static FANDOM: LazyLock<Selector> = LazyLock::new(|| selector("h5.fandoms a.tag"));
static TAG_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("ul.tags li"));
static TAG_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.tag"));
static STATS: LazyLock<Selector> = LazyLock::new(|| selector("dl.stats"));
static DATETIME: LazyLock<Selector> = LazyLock::new(|| selector("p.datetime"));

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"20\d{2}").expect("static regex"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Extracts every work with a title. `source` names the page the records
/// are attributed to.
pub fn extract_works(html: &str, source: &str) -> Vec<WorkRecord> {
    let document = Html::parse_document(html);
    let base = Url::parse(ARCHIVE_ORIGIN).ok();

    document
        .select(&WORK)
        .filter_map(|element| extract_work(element, source, base.as_ref()))
        .collect()
}

fn extract_work(element: ElementRef<'_>, source: &str, base: Option<&Url>) -> Option<WorkRecord> {
    let mut work = WorkRecord::new(source);

    let title_link = element.select(&TITLE_LINK).next()?;
    work.title = collapse_text(title_link);
    if work.title.is_empty() {
        return None;
    }
    if let Some(href) = title_link.value().attr("href") {
        work.url = resolve_href(base, href);
    }

    if let Some(author) = element.select(&AUTHOR).next() {
        work.author = collapse_text(author);
    }

    if let Some(required) = element.select(&REQUIRED_TAGS).next() {
        if let Some(rating) = required.select(&RATING).next() {
            work.rating = collapse_text(rating);
        }
        work.warnings = texts(required, &WARNING)
            .filter(|warning| warning != NO_WARNINGS)
            .collect();
        work.categories = texts(required, &CATEGORY).collect();
    }

    work.fandoms = texts(element, &FANDOM).collect();

    for item in element.select(&TAG_ITEM) {
        let Some(link) = item.select(&TAG_LINK).next() else {
            continue;
        };
        let text = collapse_text(link);
        if text.is_empty() {
            continue;
        }
        let class = item.value().classes().collect::<Vec<_>>().join(" ");
        if class.contains("relationship") {
            work.relationships.push(text);
        } else if class.contains("character") {
            work.characters.push(text);
        } else if class.contains("freeform") {
            work.freeforms.push(text);
        }
    }

    if let Some(stats) = element.select(&STATS).next() {
        work.words = stat(stats, "words");
        work.comments = stat(stats, "comments");
        work.bookmarks = stat(stats, "bookmarks");
        work.kudos = stat(stats, "kudos");
        work.hits = stat(stats, "hits");
        if let Some(chapters) = stat_text(stats, "chapters") {
            work.chapters = chapters;
        }
    }

    if let Some(year) = element
        .select(&DATETIME)
        .next()
        .and_then(|datetime| parse_year(&collapse_text(datetime)))
    {
        work.year = year;
    }

    Some(work)
}

fn texts<'a>(scope: ElementRef<'a>, selector: &'a Selector) -> impl Iterator<Item = String> + 'a {
    scope
        .select(selector)
        .map(collapse_text)
        .filter(|text| !text.is_empty())
}

fn stat_text(stats: ElementRef<'_>, class: &str) -> Option<String> {
    let selector = Selector::parse(&format!("dd.{class}")).ok()?;
    stats.select(&selector).next().map(collapse_text)
}

/// Counts like `1,234` or `3/10` (first number wins); anything else is 0.
fn stat(stats: ElementRef<'_>, class: &str) -> u64 {
    let Some(text) = stat_text(stats, class) else {
        return 0;
    };
    let head = text.split('/').next().unwrap_or_default().trim();
    if head.is_empty() || !head.chars().all(|c| c.is_ascii_digit() || c == ',') {
        return 0;
    }
    parse_count(head).unwrap_or(0)
}

fn resolve_href(base: Option<&Url>, href: &str) -> String {
    match base.and_then(|base| base.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_owned(),
    }
}

pub fn parse_year(text: &str) -> Option<String> {
    if let Ok(date) = NaiveDate::parse_from_str(text.trim(), "%d %b %Y") {
        return Some(date.year().to_string());
    }
    YEAR.find(text).map(|found| found.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::UNKNOWN_YEAR;

    const PAGE: &str = r#"<!doctype html>
<html><body>
<ol class="work index group">
  <li id="work_1" class="work blurb group work-1 user-9" role="article">
    <div class="header module">
      <h4 class="heading">
        <a href="/works/1">A   Long Title</a>
        by
        <a rel="author" href="/users/writer/pseuds/writer">writer</a>
      </h4>
      <h5 class="fandoms heading">
        <a class="tag" href="/tags/Fandom%20A/works">Fandom A</a>,
        <a class="tag" href="/tags/Fandom%20B/works">Fandom B</a>
      </h5>
      <ul class="required-tags">
        <li><a class="help symbol question modal"><span class="rating-teen rating" title="Teen And Up Audiences"><span class="text">Teen And Up Audiences</span></span></a></li>
        <li><a class="help symbol question modal"><span class="warning-no warnings" title="No Archive Warnings Apply"><span class="text">No Archive Warnings Apply</span></span></a></li>
        <li><a class="help symbol question modal"><span class="category-slash category" title="M/M"><span class="text">M/M</span></span></a></li>
      </ul>
      <p class="datetime">05 Mar 2021</p>
    </div>
    <ul class="tags commas">
      <li class="relationships"><a class="tag" href="/tags/A*s*B/works">Alice/Bob</a></li>
      <li class="characters"><a class="tag" href="/tags/Alice/works">Alice</a></li>
      <li class="characters"><a class="tag" href="/tags/Bob/works">Bob</a></li>
      <li class="characters"><a class="tag" href="/tags/Alice/works">Alice</a></li>
      <li class="freeforms"><a class="tag" href="/tags/Fluff/works">Fluff</a></li>
      <li class="warnings"><strong><a class="tag">No Archive Warnings Apply</a></strong></li>
    </ul>
    <dl class="stats">
      <dt class="words">Words:</dt><dd class="words">12,345</dd>
      <dt class="chapters">Chapters:</dt><dd class="chapters"><a href="/works/1/chapters/9">3</a>/10</dd>
      <dt class="comments">Comments:</dt><dd class="comments"><a href="/works/1?show_comments=true">17</a></dd>
      <dt class="kudos">Kudos:</dt><dd class="kudos"><a href="/works/1#kudos">1,002</a></dd>
      <dt class="bookmarks">Bookmarks:</dt><dd class="bookmarks"><a href="/works/1/bookmarks">40</a></dd>
      <dt class="hits">Hits:</dt><dd class="hits">20,000</dd>
    </dl>
  </li>
  <li id="work_2" class="work blurb group">
    <div class="header module">
      <h4 class="heading"><a href="https://example.org/works/2">Second</a></h4>
      <ul class="required-tags">
        <li><span class="rating-explicit rating"><span class="text">Explicit</span></span></li>
        <li><span class="warning-yes warnings"><span class="text">Graphic Depictions Of Violence</span></span></li>
      </ul>
      <p class="datetime">sometime</p>
    </div>
    <dl class="stats"><dd class="words">n/a</dd></dl>
  </li>
  <li id="work_3" class="work blurb group">
    <h4 class="heading"><a href="/works/3">   </a></h4>
  </li>
</ol>
</body></html>"#;

    #[test]
    fn extracts_all_fields_of_a_work() {
        let works = extract_works(PAGE, "page_2.html");
        assert_eq!(works.len(), 2);

        let work = &works[0];
        assert_eq!(work.source, "page_2.html");
        assert_eq!(work.title, "A Long Title");
        assert_eq!(work.url, "https://archiveofourown.org/works/1");
        assert_eq!(work.author, "writer");
        assert_eq!(work.rating, "Teen And Up Audiences");
        assert!(work.warnings.is_empty());
        assert_eq!(work.categories, vec!["M/M"]);
        assert_eq!(work.fandoms, vec!["Fandom A", "Fandom B"]);
        assert_eq!(work.relationships, vec!["Alice/Bob"]);
        assert_eq!(work.characters, vec!["Alice", "Bob", "Alice"]);
        assert_eq!(work.freeforms, vec!["Fluff"]);
        assert_eq!(work.words, 12_345);
        assert_eq!(work.chapters, "3/10");
        assert_eq!(work.comments, 17);
        assert_eq!(work.kudos, 1_002);
        assert_eq!(work.bookmarks, 40);
        assert_eq!(work.hits, 20_000);
        assert_eq!(work.year, "2021");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let works = extract_works(PAGE, "page_2.html");
        let work = &works[1];

        assert_eq!(work.url, "https://example.org/works/2");
        assert_eq!(work.author, "");
        assert_eq!(work.rating, "Explicit");
        assert_eq!(work.warnings, vec!["Graphic Depictions Of Violence"]);
        assert_eq!(work.words, 0);
        assert_eq!(work.chapters, "0");
        assert_eq!(work.year, UNKNOWN_YEAR);
    }

    #[test]
    fn page_without_works_yields_nothing() {
        let html = "<html><body><p>Retry later</p></body></html>";
        assert!(extract_works(html, "page_9.html").is_empty());
    }

    #[test]
    fn year_parsing_prefers_dates() {
        assert_eq!(parse_year("05 Mar 2021").as_deref(), Some("2021"));
        assert_eq!(parse_year("updated 2019-04-01").as_deref(), Some("2019"));
        assert_eq!(parse_year("long ago"), None);
    }
}
