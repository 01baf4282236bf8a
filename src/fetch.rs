use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

/// Literal class list every work entry on a listing page carries.
pub const WORK_LISTING_MARKER: &str = "work blurb group";

const CHALLENGE_MARKERS: [&str; 2] = ["checkpoint", "captcha"];

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects.
    pub final_url: Url,
    pub html: String,
}

impl FetchedPage {
    pub fn is_bot_challenge(&self) -> bool {
        is_bot_challenge(&self.final_url)
    }

    pub fn has_work_listing(&self) -> bool {
        self.html.contains(WORK_LISTING_MARKER)
    }
}

/// Where listing pages come from. The crawler only needs the markup and the
/// URL the request finally landed on.
pub trait PageSource {
    fn fetch(&mut self, url: &Url) -> anyhow::Result<FetchedPage>;
}

pub struct HttpPageSource {
    client: reqwest::blocking::Client,
}

impl HttpPageSource {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build listing http client")?;
        Ok(Self { client })
    }
}

impl PageSource for HttpPageSource {
    fn fetch(&mut self, url: &Url) -> anyhow::Result<FetchedPage> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .with_context(|| format!("GET {url}"))?;

        let final_url = response.url().clone();
        // A challenge page may answer with an error status; let the caller
        // see where it landed instead of failing here.
        if !response.status().is_success() && !is_bot_challenge(&final_url) {
            anyhow::bail!("GET {url}: status {}", response.status());
        }

        let html = response
            .text()
            .with_context(|| format!("read body: {url}"))?;
        Ok(FetchedPage { final_url, html })
    }
}

pub fn is_bot_challenge(url: &Url) -> bool {
    let url = url.as_str();
    CHALLENGE_MARKERS.iter().any(|marker| url.contains(marker))
}

/// URL of listing page `page`; any `page` parameter already on the tag URL is
/// replaced.
pub fn listing_page_url(tag_url: &Url, page: u32) -> Url {
    let retained: Vec<(String, String)> = tag_url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = tag_url.clone();
    url.set_fragment(None);
    url.set_query(None);
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in &retained {
            query.append_pair(key, value);
        }
        query.append_pair("page", &page.to_string());
    }
    url
}

pub fn parse_tag_url(input: &str) -> anyhow::Result<Url> {
    let url = Url::parse(input.trim()).context("parse tag listing url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("tag listing url must be http/https: {url}");
    }
    Ok(url)
}
