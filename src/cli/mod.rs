use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod errors;
mod handlers;
mod validation;

pub use errors::{CliError, CliResult};
pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Use the built-in hashing embedder instead of downloading a model
    #[clap(long, global = true, default_value = "false")]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate cli docs in markdown format
    #[cfg(feature = "markdown-docs")]
    #[clap(hide = true)]
    MarkdownDocs {},

    /// Index the inputs and run a single query
    Search {
        /// Query text
        query: String,

        /// Files or directories with extracted page text
        #[clap(short, long = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Maximum number of hits (config default if omitted)
        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum cosine similarity, between -1.0 and 1.0
        #[clap(short, long, allow_hyphen_values = true)]
        min_similarity: Option<f32>,

        /// Print hits as JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Index the inputs in the background, then query from a prompt
    Interactive {
        /// Files or directories with extracted page text
        #[clap(short, long = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        #[clap(short, long, allow_hyphen_values = true)]
        min_similarity: Option<f32>,
    },

    /// Index the inputs and print index statistics
    Stats {
        /// Files or directories with extracted page text
        #[clap(short, long = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Print stats as JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let args = Args::try_parse_from([
            "pdfseek", "--offline", "search", "borrow checker", "-i", "a.txt", "docs", "-k", "3",
            "-m", "-0.5",
        ])
        .unwrap();

        assert!(args.offline);
        match args.command {
            Command::Search {
                query,
                inputs,
                top_k,
                min_similarity,
                json,
            } => {
                assert_eq!(query, "borrow checker");
                assert_eq!(inputs, vec![PathBuf::from("a.txt"), PathBuf::from("docs")]);
                assert_eq!(top_k, Some(3));
                assert_eq!(min_similarity, Some(-0.5));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_inputs_required() {
        assert!(Args::try_parse_from(["pdfseek", "stats"]).is_err());
    }

    #[test]
    fn test_offline_after_subcommand() {
        let args = Args::try_parse_from(["pdfseek", "stats", "-i", "docs", "--offline"]).unwrap();
        assert!(args.offline);
    }
}
