use analyze::{Analyzer, Verdict};
use ingest::{Chunker, Document, FileReader, Scope};
use retrieve::Retriever;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ValidationError;
use crate::result::{RunInfo, ValidationResult, aggregate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Passages requested from the retrieval service per chunk.
    pub max_results: usize,
    /// Chunks analyzed at the same time.
    pub max_concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            max_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Chunking,
    Analyzing { completed: usize, total: usize },
    Aggregating,
    Done,
}

/// Cancellation switch for one run. Once it flips no new retrieval or model
/// call starts; chunks without a verdict are left out and the result is
/// marked partial.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Chunk, retrieve, analyze and aggregate one document.
pub struct ValidationPipeline {
    retriever: Retriever,
    analyzer: Analyzer,
    settings: PipelineSettings,
    state: Arc<watch::Sender<RunState>>,
}

impl ValidationPipeline {
    pub fn new(retriever: Retriever, analyzer: Analyzer) -> Self {
        let (state, _) = watch::channel(RunState::NotStarted);
        Self {
            retriever,
            analyzer,
            settings: PipelineSettings::default(),
            state: Arc::new(state),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub async fn validate_file(
        &self,
        path: &Path,
        scope: Scope,
        cancel: &CancelFlag,
    ) -> Result<ValidationResult, ValidationError> {
        let document = FileReader::read_document(path).await?;
        self.validate_document(&document, scope, cancel).await
    }

    pub async fn validate_document(
        &self,
        document: &Document,
        scope: Scope,
        cancel: &CancelFlag,
    ) -> Result<ValidationResult, ValidationError> {
        if document.is_blank() {
            return Err(ValidationError::EmptyDocument(document.path.clone()));
        }

        let run_id = Uuid::new_v4();
        info!(%run_id, path = %document.path, %scope, "Starting validation");

        self.state.send_replace(RunState::Chunking);
        let chunks = Chunker::for_scope(scope).chunk_document(document);
        let total = chunks.len();
        let estimated_tokens: usize = chunks.iter().map(|c| c.estimated_tokens()).sum();
        info!(%run_id, chunks = total, estimated_tokens, "Document chunked");

        self.state.send_replace(RunState::Analyzing { completed: 0, total });

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut spawned = 0;

        for chunk in &chunks {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            if cancel.is_cancelled() {
                warn!(%run_id, analyzed = spawned, total, "Validation cancelled");
                break;
            }

            let retriever = self.retriever.clone();
            let analyzer = self.analyzer.clone();
            let state = Arc::clone(&self.state);
            let cancel = cancel.clone();
            let max_results = self.settings.max_results;
            let index = chunk.index;
            let text = chunk.text.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let verdict = check_chunk(&retriever, &analyzer, &text, max_results, &cancel).await;
                match &verdict {
                    Some(verdict) => {
                        debug!(chunk = index, status = %verdict.status, "Chunk analyzed");
                        state.send_modify(|s| {
                            if let RunState::Analyzing { completed, .. } = s {
                                *completed += 1;
                            }
                        });
                    }
                    None => debug!(chunk = index, "Chunk skipped after cancellation"),
                }
                (index, verdict)
            });
            spawned += 1;
        }

        let mut verdicts: Vec<Option<Verdict>> = vec![None; total];
        let mut returned = vec![false; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, verdict)) => {
                    returned[index] = true;
                    verdicts[index] = verdict;
                }
                Err(e) => error!(%run_id, error = %e, "Chunk analysis task failed"),
            }
        }
        // Chunks are spawned in order, so a spawned chunk that never returned panicked
        for index in (0..spawned).filter(|&i| !returned[i]) {
            verdicts[index] = Some(Verdict::error("Chunk analysis task failed"));
        }

        self.state.send_replace(RunState::Aggregating);
        let run = RunInfo {
            run_id,
            file_path: document.path.clone(),
            scope,
        };
        let result = aggregate(run, chunks, verdicts);
        self.state.send_replace(RunState::Done);

        info!(
            %run_id,
            status = %result.overall_status,
            total_chunks = result.summary.total_chunks,
            issues_found = result.summary.issues_found,
            partial = result.partial,
            "Validation finished"
        );

        Ok(result)
    }
}

/// `None` when the run was cancelled before the model was asked.
async fn check_chunk(
    retriever: &Retriever,
    analyzer: &Analyzer,
    text: &str,
    max_results: usize,
    cancel: &CancelFlag,
) -> Option<Verdict> {
    match retriever.query(text, max_results).await {
        Ok(_) if cancel.is_cancelled() => None,
        Ok(passages) => {
            debug!(passages = passages.len(), "Retrieved context");
            Some(analyzer.analyze(text, &passages).await)
        }
        Err(e) => {
            warn!(error = %e, "Knowledge base query failed");
            Some(Verdict::error(format!("Knowledge base query failed: {e}")))
        }
    }
}
