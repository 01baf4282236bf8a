//! Decides which listing pages to fetch and how far to scale what they show.

use rand::Rng;

use crate::formats::SamplingMode;

/// Works the archive lists per page.
pub const PAGE_SIZE: u64 = 20;

/// Listings with at most this many pages are fetched completely.
pub const EXHAUSTIVE_PAGE_LIMIT: u32 = 20;

/// Pages drawn besides page 1 when a listing is sampled.
pub const SAMPLE_SIZE: u32 = 19;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPlan {
    pub total_pages: u32,
    pub total_works: u64,
    /// Pages to fetch after page 1, in fetch order.
    pub target_pages: Vec<u32>,
    pub mode: SamplingMode,
}

pub fn plan<R: Rng + ?Sized>(total_pages: u32, total_works: u64, rng: &mut R) -> SamplingPlan {
    let total_pages = total_pages.max(1);

    if total_pages <= EXHAUSTIVE_PAGE_LIMIT {
        return SamplingPlan {
            total_pages,
            total_works,
            target_pages: (2..=total_pages).collect(),
            mode: SamplingMode::Exhaustive,
        };
    }

    let candidates = (total_pages - 1) as usize;
    let amount = SAMPLE_SIZE.min(total_pages - 1) as usize;
    // index::sample returns the chosen indices shuffled, so the fetch order
    // is random as well.
    let target_pages = rand::seq::index::sample(rng, candidates, amount)
        .into_iter()
        .map(|idx| idx as u32 + 2)
        .collect();

    SamplingPlan {
        total_pages,
        total_works,
        target_pages,
        mode: SamplingMode::Sampled,
    }
}

/// Page count from the listing's pagination control, falling back to the
/// work total when the control is missing or only shows page 1.
pub fn resolve_total_pages(pagination_max: Option<u32>, total_works: u64) -> u32 {
    match pagination_max {
        Some(pages) if pages > 1 => pages,
        _ => estimate_total_pages(total_works),
    }
}

pub fn estimate_total_pages(total_works: u64) -> u32 {
    if total_works <= PAGE_SIZE {
        return 1;
    }
    u32::try_from(total_works.div_ceil(PAGE_SIZE)).unwrap_or(u32::MAX)
}

pub fn sampling_factor(total_pages: u32, downloaded_pages: u32) -> f64 {
    if downloaded_pages == 0 || downloaded_pages >= total_pages {
        return 1.0;
    }
    f64::from(total_pages) / f64::from(downloaded_pages)
}
