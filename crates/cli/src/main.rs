//! doccheck: validate documentation against a knowledge base.
//!
//! - `validate` chunks a document, checks every chunk against retrieved
//!   passages and saves a JSON result (plus an optional report)
//! - `report` re-renders a saved result as Markdown or HTML
//! - `kb-status` reports or waits for knowledge-base readiness

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use analyze::{Analyzer, GenerationParams, OllamaClient};
use ingest::Scope;
use retrieve::{EmbeddingClient, KnowledgeBaseClient, Poller, QdrantRetriever, RetrievalService, Retriever};
use validate::{
    CancelFlag, PipelineSettings, ReportFormat, RunState, ValidationPipeline, ValidationResult, default_result_path,
    load_result, preview, render, save_report, save_result,
};

mod config;

use config::{AppConfig, OperationMode, RetrievalBackend};

#[derive(Parser)]
#[command(name = "doccheck")]
#[command(version, about = "Validate documentation against a knowledge base")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Debug-level logs (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON config file overlaid on the mode preset (default: $DOCCHECK_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preset: fast, balanced or accurate
    #[arg(long, global = true, default_value = "balanced")]
    mode: OperationMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a document and save the result as JSON
    Validate {
        /// Document to validate (.md, .markdown, .txt, .xml, .html)
        file: PathBuf,

        /// Knowledge base id (collection name for the qdrant backend)
        #[arg(long)]
        kb: String,

        /// full, section, paragraph or sentence
        #[arg(long, default_value = "full")]
        scope: Scope,

        /// Result path (default: <stem>_validation.json beside the document)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write a report here (extension added from --report-format if missing)
        #[arg(long)]
        report: Option<PathBuf>,

        #[arg(long, default_value = "markdown")]
        report_format: ReportFormat,

        /// Override the generative model name
        #[arg(long)]
        model: Option<String>,

        /// Override the number of chunks analyzed at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Render a saved validation result
    Report {
        result: PathBuf,

        #[arg(long, default_value = "markdown")]
        format: ReportFormat,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show knowledge base status
    KbStatus {
        kb: String,

        /// Poll until the knowledge base is active
        #[arg(long)]
        wait: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json, cli.verbose);

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("DOCCHECK_CONFIG").map(PathBuf::from));
    let config = AppConfig::load(cli.mode, config_path.as_deref())?;
    info!(mode = %config.mode, "Configuration loaded");

    match cli.command {
        Commands::Validate {
            file,
            kb,
            scope,
            output,
            report,
            report_format,
            model,
            concurrency,
        } => {
            let mut config = config;
            if let Some(model) = model {
                config.model.model = model;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency.max_concurrent_chunks = concurrency;
            }

            let output = output.unwrap_or_else(|| default_result_path(&file));
            run_validate(&config, &file, &kb, scope, &output, report.as_deref(), report_format).await
        }
        Commands::Report { result, format, output } => run_report(&result, format, output.as_deref()).await,
        Commands::KbStatus { kb, wait } => run_kb_status(&config, &kb, wait).await,
    }
}

fn init_tracing(json: bool, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so reports printed on stdout stay clean
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_retriever(config: &AppConfig, kb: &str, client: &reqwest::Client) -> Retriever {
    let retrieval = &config.retrieval;

    let service: Arc<dyn RetrievalService> = match retrieval.backend {
        RetrievalBackend::KnowledgeBase => Arc::new(
            KnowledgeBaseClient::new(retrieval.base_url.clone(), kb.to_string(), client.clone())
                .with_api_key(retrieval.api_key.clone()),
        ),
        RetrievalBackend::Qdrant => {
            let embeddings = EmbeddingClient::new(
                retrieval.embedding_url.clone(),
                retrieval.embedding_model.clone(),
                client.clone(),
            );
            Arc::new(QdrantRetriever::new(
                retrieval.base_url.clone(),
                kb.to_string(),
                embeddings,
                client.clone(),
            ))
        }
    };

    Retriever::new(service)
        .with_max_query_chars(retrieval.max_query_chars)
        .with_timeout(Duration::from_secs(retrieval.timeout_secs))
}

fn build_analyzer(config: &AppConfig, client: &reqwest::Client) -> Analyzer {
    let model = &config.model;
    let generator = OllamaClient::new(model.base_url.clone(), model.model.clone(), client.clone());
    info!(model = generator.model(), "Using generative model");

    Analyzer::new(Arc::new(generator))
        .with_params(GenerationParams {
            temperature: model.temperature,
            max_tokens: model.max_tokens,
        })
        .with_max_passages(model.max_passages)
        .with_timeout(Duration::from_secs(model.timeout_secs))
        .with_repair_attempts(model.repair_attempts)
}

async fn run_validate(
    config: &AppConfig,
    file: &Path,
    kb: &str,
    scope: Scope,
    output: &Path,
    report: Option<&Path>,
    report_format: ReportFormat,
) -> Result<()> {
    let client = reqwest::Client::new();
    let pipeline = ValidationPipeline::new(build_retriever(config, kb, &client), build_analyzer(config, &client))
        .with_settings(PipelineSettings {
            max_results: config.retrieval.max_results,
            max_concurrency: config.concurrency.max_concurrent_chunks,
        });

    let cancel = CancelFlag::default();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight chunks");
            interrupt.cancel();
        }
    });

    let mut progress = pipeline.subscribe();
    let progress_task = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let state = *progress.borrow_and_update();
            match state {
                RunState::Analyzing { completed, total } if completed > 0 => {
                    info!(completed, total, "Chunk progress");
                }
                RunState::Done => break,
                _ => {}
            }
        }
    });

    let result = pipeline
        .validate_file(file, scope, &cancel)
        .await
        .with_context(|| format!("Validation of {} failed", file.display()))?;
    drop(pipeline);
    let _ = progress_task.await;

    print_summary(&result);

    // The result is already complete in memory; a failed save is reported
    // but the summary above stands.
    save_result(&result, output)
        .await
        .with_context(|| format!("Could not save result to {}", output.display()))?;
    println!("\nResult saved to {}", output.display());

    if let Some(path) = report {
        let path = if path.extension().is_none() {
            path.with_extension(report_format.extension())
        } else {
            path.to_path_buf()
        };
        save_report(&render(&result, report_format), &path)
            .await
            .with_context(|| format!("Could not save report to {}", path.display()))?;
        println!("Report saved to {}", path.display());
    }

    ensure_complete(&result)
}

/// A cancelled run is saved like any other but must not exit successfully.
fn ensure_complete(result: &ValidationResult) -> Result<()> {
    if result.partial {
        bail!(
            "validation cancelled after {} of {} chunks",
            result.summary.validated_chunks,
            result.summary.total_chunks
        );
    }
    Ok(())
}

fn print_summary(result: &ValidationResult) {
    println!("Validation {}", if result.partial { "cancelled (partial result)" } else { "complete" });
    println!("Status: {}", result.status_label());
    println!(
        "Chunks: {} total, {} validated, {} with issues",
        result.summary.total_chunks, result.summary.validated_chunks, result.summary.issues_found
    );

    for chunk in result.issues() {
        println!("\nIssue in chunk {} [{}]", chunk.index + 1, chunk.verdict.status);
        println!("  {}", preview(&chunk.content, 100).replace('\n', " "));
        if !chunk.verdict.message.is_empty() {
            println!("  {}", chunk.verdict.message);
        }
        for suggestion in &chunk.verdict.suggestions {
            println!("  - {suggestion}");
        }
    }
}

async fn run_report(result_path: &Path, format: ReportFormat, output: Option<&Path>) -> Result<()> {
    let result = load_result(result_path)
        .await
        .with_context(|| format!("Could not load {}", result_path.display()))?
        .reaggregate();

    let rendered = render(&result, format);
    match output {
        Some(path) => {
            save_report(&rendered, path)
                .await
                .with_context(|| format!("Could not save report to {}", path.display()))?;
            println!("Report saved to {}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}

async fn run_kb_status(config: &AppConfig, kb: &str, wait: bool) -> Result<()> {
    let client = KnowledgeBaseClient::new(config.retrieval.base_url.clone(), kb.to_string(), reqwest::Client::new())
        .with_api_key(config.retrieval.api_key.clone());

    if wait {
        let poll = &config.poll;
        let poller = Poller::new(poll.max_attempts, poll.initial_backoff_ms, poll.max_backoff_ms)
            .with_deadline(Duration::from_secs(poll.deadline_secs));
        client
            .wait_until_ready(&poller)
            .await
            .with_context(|| format!("Knowledge base {kb} did not become ready"))?;
    }

    let status = client
        .status()
        .await
        .with_context(|| format!("Could not fetch status of knowledge base {kb}"))?;
    println!("Knowledge base {}: {status:?}", client.knowledge_base_id());

    Ok(())
}
