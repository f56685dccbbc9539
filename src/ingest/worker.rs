//! Background ingestion.
//!
//! One thread owns the job queue. Pages are embedded under a read lock, so
//! searches keep running, and inserted under a short write lock per batch.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, RwLock};
use std::thread::JoinHandle;

use crate::ingest::{IngestError, IngestReport, PageSource};
use crate::semantic::{SemanticSearchError, SemanticSearchService};

/// Progress notifications from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    FileStarted { path: PathBuf, pages: usize },
    PageIndexed { path: PathBuf, page_number: u32, id: usize },
    FileFailed { path: PathBuf, error: String },
    /// Sent once per submitted job
    Finished(IngestReport),
}

enum Job {
    Ingest(Vec<PathBuf>),
    Shutdown,
}

pub struct IngestWorker {
    job_tx: mpsc::Sender<Job>,
    handle: Option<JoinHandle<()>>,
}

impl IngestWorker {
    /// Start the worker thread. Events arrive on the returned receiver.
    pub fn spawn(
        service: Arc<RwLock<SemanticSearchService>>,
        source: Arc<dyn PageSource>,
    ) -> (Self, mpsc::Receiver<IngestEvent>) {
        let (job_tx, job_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let handle = std::thread::spawn(move || {
            log::debug!("ingest worker waiting for jobs");
            while let Ok(job) = job_rx.recv() {
                match job {
                    Job::Ingest(files) => {
                        let report = run_job(&service, source.as_ref(), &files, &event_tx);
                        // receiver may be gone; nothing to report to then
                        let _ = event_tx.send(IngestEvent::Finished(report));
                    }
                    Job::Shutdown => break,
                }
            }
            log::debug!("ingest worker stopped");
        });

        (
            Self {
                job_tx,
                handle: Some(handle),
            },
            event_rx,
        )
    }

    /// Queue files for ingestion.
    pub fn submit(&self, files: Vec<PathBuf>) -> Result<(), IngestError> {
        self.job_tx
            .send(Job::Ingest(files))
            .map_err(|_| IngestError::WorkerStopped)
    }

    /// Finish queued jobs, then stop the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.job_tx.send(Job::Shutdown);
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.join() {
                log::error!("ingest worker panicked: {err:?}");
            }
        }
    }
}

impl Drop for IngestWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_job(
    service: &RwLock<SemanticSearchService>,
    source: &dyn PageSource,
    files: &[PathBuf],
    events: &mpsc::Sender<IngestEvent>,
) -> IngestReport {
    let span = tracing::info_span!("ingest", files = files.len());
    let _enter = span.enter();

    let mut report = IngestReport::default();

    for path in files {
        match ingest_file(service, source, path, events) {
            Ok(file_report) => report.merge(file_report),
            Err(e) => {
                log::warn!("failed to ingest {}: {e}", path.display());
                let _ = events.send(IngestEvent::FileFailed {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "ingested {} files: {} pages added, {} skipped, {} failed",
        files.len(),
        report.added,
        report.skipped,
        report.failed
    );

    report
}

#[derive(Debug, thiserror::Error)]
enum FileError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] SemanticSearchError),
}

fn ingest_file(
    service: &RwLock<SemanticSearchService>,
    source: &dyn PageSource,
    path: &Path,
    events: &mpsc::Sender<IngestEvent>,
) -> Result<IngestReport, FileError> {
    let pages = source.pages(path)?;
    let _ = events.send(IngestEvent::FileStarted {
        path: path.to_path_buf(),
        pages: pages.len(),
    });

    let batch_size = service.read().map_err(poisoned)?.embed_batch_size();
    let mut report = IngestReport::default();

    for batch in pages.chunks(batch_size) {
        let embedded = service.read().map_err(poisoned)?.embed_pages(batch);

        let mut index = service.write().map_err(poisoned)?;
        for (page, result) in batch.iter().zip(embedded) {
            let inserted = result.and_then(|embedded| index.insert_page(embedded));
            if let Ok(id) = &inserted {
                let _ = events.send(IngestEvent::PageIndexed {
                    path: path.to_path_buf(),
                    page_number: page.page_number,
                    id: *id,
                });
            }
            report.record(&inserted);
        }
    }

    Ok(report)
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> SemanticSearchError {
    SemanticSearchError::Internal("Lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SemanticSearchConfig;
    use crate::ingest::TextPageSource;
    use crate::semantic::{HashEmbedder, ScanStrategy, SimilaritySearchEngine};

    fn shared_service() -> Arc<RwLock<SemanticSearchService>> {
        let service = SemanticSearchService::new(
            SemanticSearchConfig {
                default_threshold: 0.0,
                min_page_chars: 1,
                embed_batch_size: 2,
                ..Default::default()
            },
            SimilaritySearchEngine::new(ScanStrategy::Parallel).with_partitions(3),
            Arc::new(HashEmbedder::new(128).unwrap()),
        )
        .unwrap();
        Arc::new(RwLock::new(service))
    }

    fn wait_finished(events: &mpsc::Receiver<IngestEvent>) -> (Vec<IngestEvent>, IngestReport) {
        let mut seen = Vec::new();
        for event in events.iter() {
            if let IngestEvent::Finished(report) = event {
                return (seen, report);
            }
            seen.push(event);
        }
        panic!("worker stopped without finishing");
    }

    #[test]
    fn test_worker_ingests_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "alpha page\x0cbeta page\x0c\x0cgamma page").unwrap();
        std::fs::write(&b, "delta page").unwrap();

        let service = shared_service();
        let (worker, events) = IngestWorker::spawn(service.clone(), Arc::new(TextPageSource));
        worker.submit(vec![a.clone(), b.clone()]).unwrap();

        let (seen, report) = wait_finished(&events);
        assert_eq!(report.added, 4);
        assert_eq!(report.failed, 0);
        assert_eq!(
            seen[0],
            IngestEvent::FileStarted {
                path: a.clone(),
                pages: 3
            }
        );
        assert!(seen.contains(&IngestEvent::PageIndexed {
            path: a,
            page_number: 4,
            id: 2
        }));
        assert!(seen.contains(&IngestEvent::PageIndexed {
            path: b,
            page_number: 1,
            id: 3
        }));

        worker.shutdown();
        assert_eq!(service.read().unwrap().len(), 4);
    }

    #[test]
    fn test_worker_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        let missing = dir.path().join("missing.txt");
        std::fs::write(&good, "some text").unwrap();

        let (worker, events) = IngestWorker::spawn(shared_service(), Arc::new(TextPageSource));
        worker.submit(vec![missing.clone(), good]).unwrap();

        let (seen, report) = wait_finished(&events);
        assert_eq!(report.added, 1);
        assert!(seen
            .iter()
            .any(|e| matches!(e, IngestEvent::FileFailed { path, .. } if *path == missing)));
    }

    #[test]
    fn test_resubmitting_skips_indexed_pages() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "one\x0ctwo").unwrap();

        let (worker, events) = IngestWorker::spawn(shared_service(), Arc::new(TextPageSource));
        worker.submit(vec![file.clone()]).unwrap();
        worker.submit(vec![file]).unwrap();

        let (_, first) = wait_finished(&events);
        let (_, second) = wait_finished(&events);
        assert_eq!(first.added, 2);
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, 2);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "queued page").unwrap();

        let service = shared_service();
        let (worker, events) = IngestWorker::spawn(service.clone(), Arc::new(TextPageSource));
        worker.submit(vec![file]).unwrap();
        worker.shutdown();

        assert_eq!(service.read().unwrap().len(), 1);
        let finished = events
            .try_iter()
            .filter(|e| matches!(e, IngestEvent::Finished(_)))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_search_while_ingesting() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        let text = (0..50)
            .map(|i| format!("page number {i} about topic {}", i % 7))
            .collect::<Vec<_>>()
            .join("\x0c");
        std::fs::write(&file, text).unwrap();

        let service = shared_service();
        let (worker, events) = IngestWorker::spawn(service.clone(), Arc::new(TextPageSource));
        worker.submit(vec![file]).unwrap();

        // every snapshot must be consistent, whatever has been indexed so far
        loop {
            {
                let guard = service.read().unwrap();
                let hits = guard.search("topic 3", Some(5), None).unwrap();
                assert!(hits.len() <= 5.min(guard.len()));
                for hit in &hits {
                    assert_eq!(guard.catalog().get(hit.id).unwrap().page_number, hit.page_number);
                }
            }
            if let Ok(IngestEvent::Finished(report)) = events.try_recv() {
                assert_eq!(report.added, 50);
                break;
            }
            std::thread::yield_now();
        }

        worker.shutdown();
    }
}
