use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::DownloadManifest;

pub const MANIFEST_FILE: &str = "download_info.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub page: u32,
    pub path: PathBuf,
}

impl CachedPage {
    pub fn file_name(&self) -> String {
        page_file_name(self.page)
    }
}

pub fn page_file_name(page: u32) -> String {
    format!("page_{page}.html")
}

pub fn page_html_path(cache_dir: &Path, page: u32) -> PathBuf {
    cache_dir.join(page_file_name(page))
}

/// Page number encoded in a cache file name (`page_<n>.html`).
pub fn parse_page_file_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("page_")?.strip_suffix(".html")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A cache directory may be reused only while it holds no pages, otherwise
/// pages from an earlier listing would be mixed into the analysis.
pub fn ensure_page_cache_is_empty(cache_dir: &Path) -> anyhow::Result<()> {
    if !cache_dir.exists() {
        return Ok(());
    }
    let cached = list_cached_pages(cache_dir)?;
    if !cached.is_empty() || cache_dir.join(MANIFEST_FILE).exists() {
        anyhow::bail!(
            "page cache directory already contains a download: {}",
            cache_dir.display()
        );
    }
    Ok(())
}

pub fn write_page_html(cache_dir: &Path, page: u32, html: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(cache_dir)
        .with_context(|| format!("create page cache dir: {}", cache_dir.display()))?;

    let path = page_html_path(cache_dir, page);
    std::fs::write(&path, html).with_context(|| format!("write page html: {}", path.display()))?;
    Ok(path)
}

/// Cached pages sorted by page number. Other files are ignored.
pub fn list_cached_pages(cache_dir: &Path) -> anyhow::Result<Vec<CachedPage>> {
    let mut pages = Vec::new();
    for entry in std::fs::read_dir(cache_dir)
        .with_context(|| format!("read page cache dir: {}", cache_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(page) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_page_file_name)
        else {
            continue;
        };
        pages.push(CachedPage { page, path });
    }

    pages.sort_by_key(|cached| cached.page);
    Ok(pages)
}

pub fn write_manifest(cache_dir: &Path, manifest: &DownloadManifest) -> anyhow::Result<PathBuf> {
    let path = cache_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(manifest).context("serialize download manifest")?;
    std::fs::write(&path, format!("{json}\n"))
        .with_context(|| format!("write download manifest: {}", path.display()))?;
    Ok(path)
}

/// `Ok(None)` when the cache has no manifest at all.
pub fn read_manifest(cache_dir: &Path) -> anyhow::Result<Option<DownloadManifest>> {
    let path = cache_dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("read download manifest: {}", path.display()))?;
    let manifest = serde_json::from_str(&json)
        .with_context(|| format!("parse download manifest: {}", path.display()))?;
    Ok(Some(manifest))
}
