use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    tagtally::logging::init().context("init logging")?;

    let cli = tagtally::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        None => {
            let args = tagtally::cli::RunArgs {
                url: None,
                out: None,
            };
            tagtally::pipeline::run(args).context("run")?;
        }
        Some(tagtally::cli::Command::Run(args)) => {
            tagtally::pipeline::run(args).context("run")?;
        }
        Some(tagtally::cli::Command::Crawl(args)) => {
            tagtally::crawl::run(args).context("crawl")?;
        }
        Some(tagtally::cli::Command::Analyze(args)) => {
            tagtally::analyze::run(args).context("analyze")?;
        }
    }

    Ok(())
}
