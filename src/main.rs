use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use homedir::my_home;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod ingest;
mod semantic;

use config::Config;

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = cli::Args::parse();

    let base_path = get_base_path()?;
    let config = Config::load_with(&base_path)
        .with_context(|| format!("failed to load config from {}", base_path.display()))?;

    let result = match args.command {
        #[cfg(feature = "markdown-docs")]
        cli::Command::MarkdownDocs {} => {
            clap_markdown::print_help_markdown::<cli::Args>();
            Ok(())
        }

        cli::Command::Search {
            query,
            inputs,
            top_k,
            min_similarity,
            json,
        } => cli::handle_search(query, inputs, top_k, min_similarity, json, args.offline, &config),

        cli::Command::Interactive {
            inputs,
            top_k,
            min_similarity,
        } => cli::handle_interactive(inputs, top_k, min_similarity, args.offline, &config),

        cli::Command::Stats { inputs, json } => {
            cli::handle_stats(inputs, json, args.offline, &config)
        }
    };

    match result {
        Err(cli::CliError::UserCancelled) => Ok(()),
        result => result.map_err(Into::into),
    }
}

/// Logs go to stderr so stdout stays clean for results. `RUST_LOG` overrides
/// the default level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `PDFSEEK_BASE_PATH`, or `~/.local/share/pdfseek`.
fn get_base_path() -> anyhow::Result<PathBuf> {
    if let Ok(base_path) = std::env::var("PDFSEEK_BASE_PATH") {
        return Ok(PathBuf::from(base_path));
    }

    let home = my_home()
        .context("could not determine home directory")?
        .context("home directory path is empty")?;
    Ok(home.join(".local/share/pdfseek"))
}
