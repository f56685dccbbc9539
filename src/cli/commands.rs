use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::{
    cli::{
        errors::{CliError, CliResult},
        validation::*,
    },
    ingest::{IngestEvent, IngestReport, IngestWorker, PageSource},
    semantic::{SearchHit, SemanticSearchService},
};

/// Characters of page text shown per hit in text output
const SNIPPET_LENGTH: usize = 200;

/// Hits of one query with the time the search took
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub elapsed_ms: f64,
    pub hits: Vec<SearchHit>,
}

/// Run a query against the index and time it.
pub fn timed_search(
    service: &SemanticSearchService,
    query: &str,
    top_k: Option<usize>,
    min_similarity: Option<f32>,
) -> CliResult<SearchOutput> {
    let started = Instant::now();
    let hits = service.search(query, top_k, min_similarity)?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    log::debug!("query {query:?}: {} hits in {elapsed_ms:.2} ms", hits.len());
    Ok(SearchOutput { elapsed_ms, hits })
}

/// Command for a one-shot query
#[derive(Debug, Clone)]
pub struct SearchCommand {
    pub query: String,
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub json: bool,
}

/// Parameters for creating a search command
#[derive(Debug, Clone)]
pub struct SearchCommandParams {
    pub query: String,
    pub inputs: Vec<PathBuf>,
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub json: bool,
}

impl SearchCommand {
    pub fn new(params: SearchCommandParams) -> CliResult<Self> {
        validate_query(&params.query)?;
        validate_inputs(&params.inputs)?;
        validate_top_k(params.top_k)?;
        validate_min_similarity(params.min_similarity)?;

        Ok(Self {
            query: params.query,
            top_k: params.top_k,
            min_similarity: params.min_similarity,
            json: params.json,
        })
    }

    pub fn execute(self, service: &SemanticSearchService) -> CliResult<()> {
        let output = timed_search(service, &self.query, self.top_k, self.min_similarity)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_output(&output);
        }
        Ok(())
    }
}

/// Command for printing index statistics
#[derive(Debug, Clone)]
pub struct StatsCommand {
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(self, service: &SemanticSearchService, report: IngestReport) -> CliResult<()> {
        let stats = service.stats();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("model:      {}", stats.model);
        println!("dimensions: {}", stats.dimensions);
        println!("documents:  {}", stats.documents);
        println!(
            "memory:     {:.1} KiB",
            stats.memory_bytes as f64 / 1024.0
        );
        println!(
            "ingest:     {} added, {} skipped, {} failed",
            report.added, report.skipped, report.failed
        );
        println!("files:");
        for file in &stats.files {
            println!("  {} ({} pages)", file.file_path.display(), file.pages);
        }
        Ok(())
    }
}

/// Command for ingesting in the background and querying from a prompt
pub struct InteractiveCommand {
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
}

impl InteractiveCommand {
    pub fn new(top_k: Option<usize>, min_similarity: Option<f32>) -> CliResult<Self> {
        validate_top_k(top_k)?;
        validate_min_similarity(min_similarity)?;
        Ok(Self {
            top_k,
            min_similarity,
        })
    }

    pub fn execute(
        self,
        service: Arc<RwLock<SemanticSearchService>>,
        source: Arc<dyn PageSource>,
        files: Vec<PathBuf>,
    ) -> CliResult<()> {
        let (worker, events) = IngestWorker::spawn(service.clone(), source);
        let total = files.len() as u64;
        worker.submit(files)?;

        let progress = create_progress_bar(total);
        let mut current: Option<PathBuf> = None;

        let report = loop {
            let event = events
                .recv()
                .map_err(|_| CliError::internal("ingest worker stopped unexpectedly"))?;

            match event {
                IngestEvent::FileStarted { path, pages } => {
                    if current.replace(path.clone()).is_some() {
                        progress.inc(1);
                    }
                    progress.set_message(format!("{} ({} pages)", path.display(), pages));
                }
                IngestEvent::PageIndexed { .. } => progress.tick(),
                IngestEvent::FileFailed { path, error } => {
                    progress.println(format!("skipped {}: {}", path.display(), error));
                    progress.inc(1);
                }
                IngestEvent::Finished(report) => break report,
            }
        };
        progress.finish_and_clear();
        worker.shutdown();

        println!(
            "Indexed {} pages ({} skipped, {} failed). Empty query exits.",
            report.added, report.skipped, report.failed
        );

        loop {
            let query = match inquire::Text::new("query:").prompt() {
                Ok(query) => query,
                Err(err) => match CliError::from(err) {
                    CliError::UserCancelled => break,
                    err => return Err(err),
                },
            };

            if query.trim().is_empty() {
                break;
            }
            validate_query(&query)?;

            let service = service
                .read()
                .map_err(|_| CliError::internal("index lock poisoned"))?;
            let output = timed_search(&service, &query, self.top_k, self.min_similarity)?;
            print_output(&output);
        }

        Ok(())
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_output(output: &SearchOutput) {
    if output.hits.is_empty() {
        println!("No matching pages ({:.2} ms)", output.elapsed_ms);
        return;
    }

    println!("{} hits in {:.2} ms", output.hits.len(), output.elapsed_ms);
    for (rank, hit) in output.hits.iter().enumerate() {
        println!(
            "{}. {} (page {})  similarity {:.3}",
            rank + 1,
            hit.file_path.display(),
            hit.page_number,
            hit.similarity
        );
        println!("   {}", snippet(&hit.content, SNIPPET_LENGTH));
    }
}

/// First `max_chars` characters of the content, with an ellipsis if cut.
fn snippet(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", content[..end].trim_end()),
        None => content.to_string(),
    }
}
