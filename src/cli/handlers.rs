use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::{
    cli::{
        commands::{
            InteractiveCommand, SearchCommand, SearchCommandParams, StatsCommand,
        },
        errors::CliResult,
        validation::validate_inputs,
    },
    config::Config,
    ingest::{expand_inputs, IngestReport, PageSource, TextPageSource},
    semantic::{Embedder, FastEmbedModel, HashEmbedder, SemanticSearchService},
};

/// Vector size of the offline embedder, matching the default model
pub const OFFLINE_DIMENSIONS: usize = 384;

pub fn handle_search(
    query: String,
    inputs: Vec<PathBuf>,
    top_k: Option<usize>,
    min_similarity: Option<f32>,
    json: bool,
    offline: bool,
    config: &Config,
) -> CliResult<()> {
    let search_command = SearchCommand::new(SearchCommandParams {
        query,
        inputs: inputs.clone(),
        top_k,
        min_similarity,
        json,
    })?;

    let mut service = build_service(config, offline)?;
    ingest_inputs(&mut service, &TextPageSource, config, &inputs)?;

    search_command.execute(&service)
}

pub fn handle_stats(inputs: Vec<PathBuf>, json: bool, offline: bool, config: &Config) -> CliResult<()> {
    validate_inputs(&inputs)?;

    let mut service = build_service(config, offline)?;
    let report = ingest_inputs(&mut service, &TextPageSource, config, &inputs)?;

    StatsCommand { json }.execute(&service, report)
}

pub fn handle_interactive(
    inputs: Vec<PathBuf>,
    top_k: Option<usize>,
    min_similarity: Option<f32>,
    offline: bool,
    config: &Config,
) -> CliResult<()> {
    validate_inputs(&inputs)?;
    let command = InteractiveCommand::new(top_k, min_similarity)?;

    let files = expand_inputs(&inputs, &config.ingest.extensions)?;
    let service = Arc::new(RwLock::new(build_service(config, offline)?));

    command.execute(service, Arc::new(TextPageSource), files)
}

/// Build an empty index with the configured embedder and engine.
pub fn build_service(config: &Config, offline: bool) -> CliResult<SemanticSearchService> {
    let embedder: Arc<dyn Embedder> = if offline {
        log::info!("offline mode: using {} embedder", HashEmbedder::NAME);
        Arc::new(HashEmbedder::new(OFFLINE_DIMENSIONS)?)
    } else {
        Arc::new(FastEmbedModel::new(
            &config.semantic_search.model,
            config.base_path().to_path_buf(),
        )?)
    };

    let engine = config.engine.build_engine()?;
    let service = SemanticSearchService::new(config.semantic_search.clone(), engine, embedder)?;
    Ok(service)
}

/// Index every file the inputs resolve to, in the foreground.
///
/// Files that cannot be read are logged and skipped.
pub fn ingest_inputs(
    service: &mut SemanticSearchService,
    source: &dyn PageSource,
    config: &Config,
    inputs: &[PathBuf],
) -> CliResult<IngestReport> {
    let files = expand_inputs(inputs, &config.ingest.extensions)?;
    let mut report = IngestReport::default();

    for file in &files {
        match source.pages(file) {
            Ok(pages) => report.merge(service.add_pages(&pages)),
            Err(e) => log::warn!("skipping {}: {e}", file.display()),
        }
    }

    log::info!(
        "{} files: {} pages added, {} skipped, {} failed",
        files.len(),
        report.added,
        report.skipped,
        report.failed
    );

    Ok(report)
}
