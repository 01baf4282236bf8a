use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use rand::Rng;
use url::Url;

use crate::cli::CrawlArgs;
use crate::fetch::{FetchedPage, HttpPageSource, PageSource};
use crate::formats::DownloadManifest;
use crate::sampling::SamplingPlan;

/// Randomized pause after every request. The archive blocks clients that
/// fetch in bursts, so the CLI always uses [`Throttle::polite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    min: Duration,
    max: Duration,
}

impl Throttle {
    pub const fn polite() -> Self {
        Self {
            min: Duration::from_secs(3),
            max: Duration::from_secs(5),
        }
    }

    pub const fn disabled() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rng.gen_range(min_ms..=max_ms))
    }

    fn pause<R: Rng + ?Sized>(&self, rng: &mut R) {
        let delay = self.next_delay(rng);
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "throttle");
            std::thread::sleep(delay);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),
    #[error("page has no work listing")]
    NoWorkListing,
}

#[derive(Debug)]
pub enum PageOutcome {
    Saved(PathBuf),
    Skipped(SkipReason),
    /// Redirected to a bot check; nothing further should be requested.
    Challenged(Url),
}

pub fn run(args: CrawlArgs) -> anyhow::Result<DownloadManifest> {
    let tag_url = crate::fetch::parse_tag_url(&args.url).context("parse --url")?;
    let cache_dir = PathBuf::from(&args.out);

    let mut source = HttpPageSource::new()?;
    let mut rng = rand::thread_rng();
    crawl_listing(
        &mut source,
        Throttle::polite(),
        &mut rng,
        &tag_url,
        &cache_dir,
    )
}

/// Fetches page 1, plans the remaining pages, fetches them one at a time
/// and writes the page cache plus `download_info.json` into `cache_dir`.
pub fn crawl_listing<S, R>(
    source: &mut S,
    throttle: Throttle,
    rng: &mut R,
    tag_url: &Url,
    cache_dir: &Path,
) -> anyhow::Result<DownloadManifest>
where
    S: PageSource + ?Sized,
    R: Rng + ?Sized,
{
    crate::raw_store::ensure_page_cache_is_empty(cache_dir)
        .context("check page cache directory")?;

    tracing::info!(url = %tag_url, "fetch listing page 1");
    let first = source.fetch(tag_url).context("fetch first listing page")?;
    throttle.pause(rng);
    if first.is_bot_challenge() {
        anyhow::bail!(
            "first listing page redirected to a bot check: {}",
            first.final_url
        );
    }
    if !first.has_work_listing() {
        tracing::warn!(url = %tag_url, "first listing page shows no works");
    }

    let summary = crate::listing::parse_listing(&first.html);
    crate::raw_store::write_page_html(cache_dir, 1, &first.html).context("write page 1")?;

    let total_pages =
        crate::sampling::resolve_total_pages(summary.pagination_max, summary.total_works);
    let plan = crate::sampling::plan(total_pages, summary.total_works, rng);
    tracing::info!(
        total_pages = plan.total_pages,
        total_works = plan.total_works,
        mode = %plan.mode,
        to_fetch = plan.target_pages.len() + 1,
        "listing planned"
    );

    let downloaded = fetch_planned_pages(source, throttle, rng, tag_url, cache_dir, &plan)?;

    let manifest = DownloadManifest::new(
        plan.total_pages,
        plan.total_works,
        downloaded,
        plan.mode,
        summary.filter_stats,
    );
    crate::raw_store::write_manifest(cache_dir, &manifest).context("write download manifest")?;

    tracing::info!(
        downloaded = manifest.downloaded_pages,
        total = manifest.total_pages,
        sampling_factor = manifest.sampling_factor,
        "download finished"
    );
    Ok(manifest)
}

/// Returns the number of pages now in the cache, page 1 included.
fn fetch_planned_pages<S, R>(
    source: &mut S,
    throttle: Throttle,
    rng: &mut R,
    tag_url: &Url,
    cache_dir: &Path,
    plan: &SamplingPlan,
) -> anyhow::Result<u32>
where
    S: PageSource + ?Sized,
    R: Rng + ?Sized,
{
    let mut downloaded = 1_u32;
    let count = plan.target_pages.len();

    for (idx, &page) in plan.target_pages.iter().enumerate() {
        let url = crate::fetch::listing_page_url(tag_url, page);
        tracing::info!(page, progress = %format!("{}/{count}", idx + 1), "fetch listing page");

        let fetched = source.fetch(&url);
        throttle.pause(rng);

        match store_page(fetched, cache_dir, page)? {
            PageOutcome::Saved(path) => {
                tracing::debug!(page, path = %path.display(), "page cached");
                downloaded += 1;
            }
            PageOutcome::Skipped(reason) => {
                tracing::warn!(page, %reason, "skipping listing page");
            }
            PageOutcome::Challenged(landed) => {
                tracing::warn!(
                    page,
                    url = %landed,
                    remaining = count - idx - 1,
                    "bot check encountered; stopping download"
                );
                break;
            }
        }
    }

    Ok(downloaded)
}

/// Only a failure to write the cache is an error; everything wrong with the
/// page itself becomes an outcome.
fn store_page(
    fetched: anyhow::Result<FetchedPage>,
    cache_dir: &Path,
    page: u32,
) -> anyhow::Result<PageOutcome> {
    let fetched = match fetched {
        Ok(fetched) => fetched,
        Err(err) => return Ok(PageOutcome::Skipped(SkipReason::Fetch(err))),
    };
    if fetched.is_bot_challenge() {
        return Ok(PageOutcome::Challenged(fetched.final_url));
    }
    if !fetched.has_work_listing() {
        return Ok(PageOutcome::Skipped(SkipReason::NoWorkListing));
    }

    let path = crate::raw_store::write_page_html(cache_dir, page, &fetched.html)
        .with_context(|| format!("write page {page}"))?;
    Ok(PageOutcome::Saved(path))
}
