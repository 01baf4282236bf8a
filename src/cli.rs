use clap::{Args, Parser, Subcommand};

/// Tag statistics for an archive tag listing. Without a subcommand, asks
/// for the listing URL and runs every phase into a fresh workspace.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl, analyze and report in one go.
    Run(RunArgs),
    /// Download listing pages into a page cache.
    Crawl(CrawlArgs),
    /// Build reports from an existing page cache.
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Tag listing URL (must be http/https). Prompted for when omitted.
    #[arg(long)]
    pub url: Option<String>,

    /// Workspace directory (pages/ and csv/). Defaults to a timestamped
    /// `tagtally_<date>_<time>` directory.
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Tag listing URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Output directory for the page cache.
    #[arg(long)]
    pub out: String,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Page cache directory written by `crawl`.
    #[arg(long)]
    pub pages: String,

    /// Output directory for CSV reports.
    #[arg(long)]
    pub out: String,
}
