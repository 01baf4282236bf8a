use std::path::Path;

use anyhow::Context as _;

use crate::cli::AnalyzeArgs;
use crate::formats::{DownloadManifest, WorkRecord};
use crate::raw_store::CachedPage;
use crate::tally::{TagCategory, TagTally};

#[derive(Debug, thiserror::Error)]
pub enum PageSkip {
    #[error("unreadable page: {0}")]
    Unreadable(#[from] std::io::Error),
}

/// What one cached page contributed to the analysis.
#[derive(Debug)]
pub enum PageLoad {
    Works(Vec<WorkRecord>),
    Skipped(PageSkip),
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub manifest: DownloadManifest,
    pub works: Vec<WorkRecord>,
    pub tally: TagTally,
    pub pages_read: usize,
    pub pages_skipped: usize,
}

pub fn run(args: AnalyzeArgs) -> anyhow::Result<Analysis> {
    let analysis = analyze_pages(Path::new(&args.pages)).context("analyze page cache")?;
    crate::report::write_reports(&analysis, Path::new(&args.out)).context("write reports")?;
    crate::report::print_summary(&analysis, &mut std::io::stdout().lock())
        .context("print summary")?;
    Ok(analysis)
}

pub fn load_page(page: &CachedPage) -> PageLoad {
    match std::fs::read_to_string(&page.path) {
        Ok(html) => PageLoad::Works(crate::extract::extract_works(&html, &page.file_name())),
        Err(err) => PageLoad::Skipped(err.into()),
    }
}

/// Manifest of the cache, or an unsampled stand-in when it is missing or
/// cannot be parsed.
pub fn load_manifest(cache_dir: &Path, cached_pages: usize) -> DownloadManifest {
    let pages = u32::try_from(cached_pages).unwrap_or(u32::MAX);
    match crate::raw_store::read_manifest(cache_dir) {
        Ok(Some(manifest)) => manifest,
        Ok(None) => {
            tracing::warn!(
                dir = %cache_dir.display(),
                "no download manifest; treating cached pages as the full listing"
            );
            DownloadManifest::unsampled(pages)
        }
        Err(err) => {
            tracing::warn!(
                dir = %cache_dir.display(),
                error = %format!("{err:#}"),
                "unusable download manifest; treating cached pages as the full listing"
            );
            DownloadManifest::unsampled(pages)
        }
    }
}

/// Reads every cached page in page order, folding each into the tally
/// before the next is read, then applies the sampling factor.
pub fn analyze_pages(cache_dir: &Path) -> anyhow::Result<Analysis> {
    let pages = crate::raw_store::list_cached_pages(cache_dir).context("list cached pages")?;
    tracing::info!(pages = pages.len(), dir = %cache_dir.display(), "analyzing cached pages");

    let manifest = load_manifest(cache_dir, pages.len());

    let mut works = Vec::new();
    let mut tally = TagTally::default();
    let mut pages_read = 0;
    let mut pages_skipped = 0;

    for page in &pages {
        match load_page(page) {
            PageLoad::Works(page_works) => {
                tracing::info!(page = page.page, works = page_works.len(), "page extracted");
                tally = tally.fold_works(&page_works);
                works.extend(page_works);
                pages_read += 1;
            }
            PageLoad::Skipped(reason) => {
                tracing::warn!(page = page.page, %reason, "skipping cached page");
                pages_skipped += 1;
            }
        }
    }

    if let Some(factor) = manifest.scale_factor() {
        tracing::info!(factor, "scaling counts to population estimates");
    }
    let tally = tally.estimate(&manifest);

    tracing::info!(
        works = works.len(),
        characters = tally.table(TagCategory::Characters).global.len(),
        relationships = tally.table(TagCategory::Relationships).global.len(),
        fandoms = tally.table(TagCategory::Fandoms).global.len(),
        freeforms = tally.table(TagCategory::Freeforms).global.len(),
        "analysis finished"
    );

    Ok(Analysis {
        manifest,
        works,
        tally,
        pages_read,
        pages_skipped,
    })
}
