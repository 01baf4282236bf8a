use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::{AnalyzeArgs, CrawlArgs, RunArgs};

const WORKSPACE_PREFIX: &str = "tagtally_";

/// Crawls into `<workspace>/pages`, then analyzes into `<workspace>/csv`.
pub fn run(args: RunArgs) -> anyhow::Result<PathBuf> {
    let url = match args.url {
        Some(url) => url,
        None => prompt_tag_url(&mut std::io::stdin().lock(), &mut std::io::stdout())?,
    };
    crate::fetch::parse_tag_url(&url).context("parse tag url")?;

    let workspace_dir = args
        .out
        .map(PathBuf::from)
        .unwrap_or_else(default_workspace_dir);
    if workspace_dir.exists() {
        anyhow::bail!(
            "workspace output directory already exists: {}",
            workspace_dir.display()
        );
    }
    std::fs::create_dir_all(&workspace_dir)
        .with_context(|| format!("create workspace dir: {}", workspace_dir.display()))?;

    let pages_dir = workspace_dir.join("pages");
    let csv_dir = workspace_dir.join("csv");

    tracing::info!(url = %url, out = %workspace_dir.display(), "run: crawl");
    crate::crawl::run(CrawlArgs {
        url,
        out: pages_dir.to_string_lossy().to_string(),
    })
    .context("crawl")?;

    tracing::info!("run: analyze");
    crate::analyze::run(AnalyzeArgs {
        pages: pages_dir.to_string_lossy().to_string(),
        out: csv_dir.to_string_lossy().to_string(),
    })
    .context("analyze")?;

    println!("\nReports written to {}", csv_dir.display());
    Ok(workspace_dir)
}

pub fn default_workspace_dir() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{WORKSPACE_PREFIX}{stamp}"))
}

/// Asks once for the tag listing URL.
pub fn prompt_tag_url<R, W>(input: &mut R, output: &mut W) -> anyhow::Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(output, "Tag listing URL: ").context("write prompt")?;
    output.flush().context("flush prompt")?;

    let mut line = String::new();
    input.read_line(&mut line).context("read tag url")?;
    let url = line.trim();
    if url.is_empty() {
        anyhow::bail!("no tag listing URL given");
    }
    Ok(url.to_owned())
}
