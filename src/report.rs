//! CSV reports and the console summary of an [`Analysis`].

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;

use crate::analyze::Analysis;
use crate::formats::{FilterStatistics, WorkRecord};
use crate::reconcile::Reconciliation;
use crate::tally::{TagCategory, TagCounts, TagTally, scale_count};

const BOM: &[u8] = b"\xEF\xBB\xBF";
const LIST_SEPARATOR: &str = "; ";
const DATA_SOURCE_EXACT: &str = "exact";
const DATA_SOURCE_ESTIMATE: &str = "sampled-estimate";
const CONSOLE_TOP: usize = 5;

const GROUNDED_TAG_HEADERS: &[&str] =
    &["tag", "count", "ground_truth", "data_source", "scale_factor"];
const TAG_HEADERS: &[&str] = &["tag", "count", "data_source", "scale_factor"];
const YEARLY_HEADERS: &[&str] = &["year", "tag", "count", "scale_factor"];
const WORKS_PER_YEAR_HEADERS: &[&str] = &["year", "works", "scale_factor"];
const WORK_HEADERS: &[&str] = &[
    "source",
    "title",
    "author",
    "url",
    "year",
    "rating",
    "warnings",
    "categories",
    "characters",
    "relationships",
    "fandoms",
    "freeforms",
    "words",
    "chapters",
    "kudos",
    "hits",
    "bookmarks",
    "comments",
];
const METRIC_HEADERS: &[&str] = &["metric", "value"];
const DELTA_HEADERS: &[&str] = &[
    "tag",
    "ground_truth",
    "estimate",
    "delta",
    "relative_delta_pct",
    "is_sampling",
];
const RECONCILIATION_SUMMARY_HEADERS: &[&str] = &[
    "category",
    "ground_truth_tags",
    "estimated_tags",
    "matched_tags",
    "match_rate_pct",
    "estimate_only_tags",
    "is_sampling",
];

#[derive(Serialize)]
struct GroundedTagRow<'a> {
    tag: &'a str,
    count: u64,
    ground_truth: Option<u64>,
    data_source: &'static str,
    scale_factor: f64,
}

#[derive(Serialize)]
struct TagRow<'a> {
    tag: &'a str,
    count: u64,
    data_source: &'static str,
    scale_factor: f64,
}

#[derive(Serialize)]
struct YearlyRow<'a> {
    year: &'a str,
    tag: &'a str,
    count: u64,
    scale_factor: f64,
}

#[derive(Serialize)]
struct WorksPerYearRow<'a> {
    year: &'a str,
    works: u64,
    scale_factor: f64,
}

#[derive(Serialize)]
struct WorkRow<'a> {
    source: &'a str,
    title: &'a str,
    author: &'a str,
    url: &'a str,
    year: &'a str,
    rating: &'a str,
    warnings: String,
    categories: String,
    characters: String,
    relationships: String,
    fandoms: String,
    freeforms: String,
    words: u64,
    chapters: &'a str,
    kudos: u64,
    hits: u64,
    bookmarks: u64,
    comments: u64,
}

impl<'a> From<&'a WorkRecord> for WorkRow<'a> {
    fn from(work: &'a WorkRecord) -> Self {
        Self {
            source: &work.source,
            title: &work.title,
            author: &work.author,
            url: &work.url,
            year: &work.year,
            rating: &work.rating,
            warnings: work.warnings.join(LIST_SEPARATOR),
            categories: work.categories.join(LIST_SEPARATOR),
            characters: work.characters.join(LIST_SEPARATOR),
            relationships: work.relationships.join(LIST_SEPARATOR),
            fandoms: work.fandoms.join(LIST_SEPARATOR),
            freeforms: work.freeforms.join(LIST_SEPARATOR),
            words: work.words,
            chapters: &work.chapters,
            kudos: work.kudos,
            hits: work.hits,
            bookmarks: work.bookmarks,
            comments: work.comments,
        }
    }
}

#[derive(Serialize)]
struct MetricRow {
    metric: &'static str,
    value: String,
}

#[derive(Serialize)]
struct DeltaRow<'a> {
    tag: &'a str,
    ground_truth: u64,
    estimate: u64,
    delta: i64,
    relative_delta_pct: String,
    is_sampling: bool,
}

#[derive(Serialize)]
struct ReconciliationSummaryRow {
    category: TagCategory,
    ground_truth_tags: usize,
    estimated_tags: usize,
    matched_tags: usize,
    match_rate_pct: String,
    estimate_only_tags: usize,
    is_sampling: bool,
}

/// Writes every report file into `out_dir` and returns their paths in the
/// order they were written.
pub fn write_reports(analysis: &Analysis, out_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create report dir: {}", out_dir.display()))?;

    let mut written = Vec::new();
    let tally = &analysis.tally;
    let filter_stats = &analysis.manifest.filter_stats;

    for category in TagCategory::ALL {
        if let Some(path) = write_tag_table(out_dir, tally, category, filter_stats)? {
            written.push(path);
        }
    }
    for category in TagCategory::ALL {
        written.push(write_yearly_table(out_dir, tally, category)?);
    }
    written.push(write_works_per_year(out_dir, tally)?);
    written.push(write_works(out_dir, &analysis.works)?);
    written.push(write_summary(out_dir, analysis)?);
    written.extend(write_reconciliation(out_dir, analysis)?);

    tracing::info!(files = written.len(), out = %out_dir.display(), "reports written");
    Ok(written)
}

fn data_source(tally: &TagTally) -> &'static str {
    if tally.is_estimate() {
        DATA_SOURCE_ESTIMATE
    } else {
        DATA_SOURCE_EXACT
    }
}

fn applied_factor(tally: &TagTally) -> f64 {
    tally.scale_factor().unwrap_or(1.0)
}

fn write_tag_table(
    out_dir: &Path,
    tally: &TagTally,
    category: TagCategory,
    filter_stats: &FilterStatistics,
) -> anyhow::Result<Option<PathBuf>> {
    let counts = &tally.table(category).global;
    if counts.is_empty() {
        tracing::debug!(%category, "no tags; table not written");
        return Ok(None);
    }

    let path = out_dir.join(format!("{category}.csv"));
    let source = data_source(tally);
    let scale_factor = applied_factor(tally);
    let ranked = counts.ranked();

    match category {
        TagCategory::Characters | TagCategory::Relationships => {
            let truth = crate::reconcile::ground_truth_for(filter_stats, category);
            let rows = ranked.iter().map(|&(tag, count)| GroundedTagRow {
                tag,
                count,
                ground_truth: truth.and_then(|truth| truth.get(tag)).copied(),
                data_source: source,
                scale_factor,
            });
            write_csv(&path, GROUNDED_TAG_HEADERS, rows)?;
        }
        _ => {
            let rows = ranked.iter().map(|&(tag, count)| TagRow {
                tag,
                count,
                data_source: source,
                scale_factor,
            });
            write_csv(&path, TAG_HEADERS, rows)?;
        }
    }

    Ok(Some(path))
}

fn write_yearly_table(
    out_dir: &Path,
    tally: &TagTally,
    category: TagCategory,
) -> anyhow::Result<PathBuf> {
    let path = out_dir.join("yearly").join(format!("{category}.csv"));
    let scale_factor = applied_factor(tally);
    let rows = tally
        .table(category)
        .by_year
        .iter()
        .flat_map(|(year, counts)| {
            counts.ranked().into_iter().map(move |(tag, count)| YearlyRow {
                year: year.as_str(),
                tag,
                count,
                scale_factor,
            })
        });
    write_csv(&path, YEARLY_HEADERS, rows)?;
    Ok(path)
}

fn write_works_per_year(out_dir: &Path, tally: &TagTally) -> anyhow::Result<PathBuf> {
    let path = out_dir.join("yearly").join("works_per_year.csv");
    let scale_factor = applied_factor(tally);
    let mut years: Vec<(&str, u64)> = tally.works_by_year().iter().collect();
    years.sort_by(|a, b| a.0.cmp(b.0));
    let rows = years.into_iter().map(|(year, works)| WorksPerYearRow {
        year,
        works,
        scale_factor,
    });
    write_csv(&path, WORKS_PER_YEAR_HEADERS, rows)?;
    Ok(path)
}

fn write_works(out_dir: &Path, works: &[WorkRecord]) -> anyhow::Result<PathBuf> {
    let path = out_dir.join("works.csv");
    write_csv(&path, WORK_HEADERS, works.iter().map(WorkRow::from))?;
    Ok(path)
}

fn write_summary(out_dir: &Path, analysis: &Analysis) -> anyhow::Result<PathBuf> {
    let path = out_dir.join("summary.csv");
    let rows = summary_metrics(analysis)
        .into_iter()
        .map(|(metric, value)| MetricRow { metric, value });
    write_csv(&path, METRIC_HEADERS, rows)?;
    Ok(path)
}

fn write_reconciliation(out_dir: &Path, analysis: &Analysis) -> anyhow::Result<Vec<PathBuf>> {
    let dir = out_dir.join("reconciliation");
    let is_sampling = analysis.manifest.is_sampling;
    let results =
        crate::reconcile::reconcile_tally(&analysis.tally, &analysis.manifest.filter_stats);

    let mut written = Vec::new();
    for result in &results {
        if result.ground_truth_tags == 0 {
            tracing::debug!(category = %result.category, "no sidebar counts to reconcile");
            continue;
        }
        let path = dir.join(format!("{}.csv", result.category));
        let rows = result.rows.iter().map(|row| DeltaRow {
            tag: &row.tag,
            ground_truth: row.ground_truth,
            estimate: row.estimate,
            delta: row.delta,
            relative_delta_pct: format!("{:.2}", row.relative_delta_pct),
            is_sampling,
        });
        write_csv(&path, DELTA_HEADERS, rows)?;
        log_reconciliation(result);
        written.push(path);
    }

    let path = dir.join("summary.csv");
    let rows = results.iter().map(|result| ReconciliationSummaryRow {
        category: result.category,
        ground_truth_tags: result.ground_truth_tags,
        estimated_tags: result.estimated_tags,
        matched_tags: result.matched_tags,
        match_rate_pct: format!("{:.2}", result.match_rate_pct),
        estimate_only_tags: result.estimate_only.len(),
        is_sampling,
    });
    write_csv(&path, RECONCILIATION_SUMMARY_HEADERS, rows)?;
    written.push(path);

    Ok(written)
}

fn log_reconciliation(result: &Reconciliation) {
    tracing::info!(
        category = %result.category,
        matched = result.matched_tags,
        ground_truth = result.ground_truth_tags,
        match_rate_pct = %format!("{:.2}", result.match_rate_pct),
        estimate_only = result.estimate_only.len(),
        "reconciled against sidebar counts"
    );
}

/// Metric rows of `summary.csv`, in file order.
fn summary_metrics(analysis: &Analysis) -> Vec<(&'static str, String)> {
    let manifest = &analysis.manifest;
    let tally = &analysis.tally;
    let works = &analysis.works;
    let distinct = |category| tally.table(category).global.len().to_string();
    let scaled = |total: u64| match tally.scale_factor() {
        Some(factor) => scale_count(total, factor),
        None => total,
    };

    vec![
        ("sampling_mode", manifest.sampling_mode.to_string()),
        ("total_pages", manifest.total_pages.to_string()),
        ("downloaded_pages", manifest.downloaded_pages.to_string()),
        ("works_analyzed", works.len().to_string()),
        ("distinct_characters", distinct(TagCategory::Characters)),
        ("distinct_relationships", distinct(TagCategory::Relationships)),
        ("distinct_fandoms", distinct(TagCategory::Fandoms)),
        ("distinct_freeforms", distinct(TagCategory::Freeforms)),
        (
            "avg_characters_per_work",
            format_average(works, |w| w.characters.len() as u64),
        ),
        (
            "avg_relationships_per_work",
            format_average(works, |w| w.relationships.len() as u64),
        ),
        (
            "avg_fandoms_per_work",
            format_average(works, |w| w.fandoms.len() as u64),
        ),
        (
            "avg_freeforms_per_work",
            format_average(works, |w| w.freeforms.len() as u64),
        ),
        ("avg_words", format_average(works, |w| w.words)),
        (
            "total_kudos",
            scaled(works.iter().map(|w| w.kudos).sum()).to_string(),
        ),
        (
            "total_hits",
            scaled(works.iter().map(|w| w.hits).sum()).to_string(),
        ),
        (
            "sampling_factor",
            tally
                .scale_factor()
                .map_or_else(|| "none".to_owned(), |factor| format!("{factor:.2}")),
        ),
    ]
}

fn format_average(works: &[WorkRecord], value: impl Fn(&WorkRecord) -> u64) -> String {
    if works.is_empty() {
        return "0.00".to_owned();
    }
    let total: u64 = works.iter().map(value).sum();
    format!("{:.2}", total as f64 / works.len() as f64)
}

fn write_csv<S: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: impl IntoIterator<Item = S>,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create report dir: {}", parent.display()))?;
    }

    let mut file =
        File::create(path).with_context(|| format!("create report: {}", path.display()))?;
    file.write_all(BOM)
        .with_context(|| format!("write report: {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer
        .write_record(headers)
        .with_context(|| format!("write report header: {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("write report row: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush report: {}", path.display()))?;
    Ok(())
}

/// Totals and the most frequent characters, relationships and fandoms.
pub fn print_summary<W: Write>(analysis: &Analysis, out: &mut W) -> anyhow::Result<()> {
    let manifest = &analysis.manifest;
    let tally = &analysis.tally;

    writeln!(
        out,
        "Analyzed {} works from {} of {} pages ({})",
        analysis.works.len(),
        manifest.downloaded_pages,
        manifest.total_pages,
        manifest.sampling_mode
    )?;
    match tally.scale_factor() {
        Some(factor) => writeln!(out, "Counts are estimates scaled by {factor:.2}")?,
        None => writeln!(out, "Counts are exact")?,
    }

    for category in [
        TagCategory::Characters,
        TagCategory::Relationships,
        TagCategory::Fandoms,
    ] {
        print_top(out, category, &tally.table(category).global)?;
    }
    Ok(())
}

fn print_top<W: Write>(
    out: &mut W,
    category: TagCategory,
    counts: &TagCounts,
) -> anyhow::Result<()> {
    writeln!(out, "\nTop {category} ({} distinct):", counts.len())?;
    if counts.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for (rank, (tag, count)) in counts.top(CONSOLE_TOP).into_iter().enumerate() {
        writeln!(out, "  {}. {tag}: {count}", rank + 1)?;
    }
    Ok(())
}
