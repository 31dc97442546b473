//! Command execution.
//!
//! Wires the parsed CLI into the core: builds the model clients, loads or
//! creates the index, and runs the requested operation. Each command
//! returns its printable output; the binary owns stdout.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::answer::Answerer;
use crate::chunking::SemanticChunker;
use crate::cli::{Cli, Commands};
use crate::core::RequestContext;
use crate::embedding::{DEFAULT_DIMENSIONS, Embedder, HashEmbedder, OpenAiEmbedder};
use crate::error::{Error, IndexError, Result};
use crate::eval::{EvalPaths, Evaluator};
use crate::generation::{Generator, OpenAiGenerator};
use crate::index::Index;
use crate::ingest::ingest_document;
use crate::retrieval::Retriever;
use crate::server::{AppState, serve};

/// Deadline for one-shot CLI questions.
const ASK_TIMEOUT: Duration = Duration::from_secs(180);

/// Executes the parsed command and returns its printable output.
///
/// # Errors
///
/// Propagates pipeline, model, and I/O failures.
pub async fn execute(cli: Cli) -> Result<String> {
    match &cli.command {
        Commands::Ingest { file } => ingest(&cli, file).await,
        Commands::Ask { prompt } => ask(&cli, prompt).await,
        Commands::Serve { addr } => run_server(&cli, addr).await,
        Commands::GenTestset { num_questions } => gen_testset(&cli, *num_questions).await,
        Commands::Eval {
            num_questions,
            batch_only,
        } => eval(&cli, *num_questions, *batch_only).await,
    }
}

fn build_embedder(cli: &Cli) -> Arc<dyn Embedder> {
    if cli.hash_embedder {
        return Arc::new(HashEmbedder::new(DEFAULT_DIMENSIONS));
    }
    match &cli.api_base {
        Some(base) => Arc::new(OpenAiEmbedder::with_base_url(
            cli.embedding_model.clone(),
            DEFAULT_DIMENSIONS,
            base,
            &std::env::var("OPENAI_API_KEY").unwrap_or_default(),
        )),
        None => Arc::new(OpenAiEmbedder::new(
            cli.embedding_model.clone(),
            DEFAULT_DIMENSIONS,
        )),
    }
}

fn build_generator(cli: &Cli) -> Arc<dyn Generator> {
    match &cli.api_base {
        Some(base) => Arc::new(OpenAiGenerator::with_base_url(
            cli.chat_model.clone(),
            base,
            &std::env::var("OPENAI_API_KEY").unwrap_or_default(),
        )),
        None => Arc::new(OpenAiGenerator::new(cli.chat_model.clone())),
    }
}

/// Loads the snapshot, translating a corrupt-snapshot error into a
/// re-ingest hint.
fn load_index(cli: &Cli) -> Result<Index> {
    Index::load(&cli.snapshot).map_err(|err| match err {
        Error::Index(IndexError::EmbeddingMismatch { .. }) => Error::Config {
            message: format!(
                "snapshot {} was corrupt and has been removed; run `tome-rs ingest` again",
                cli.snapshot.display()
            ),
        },
        Error::Index(IndexError::Snapshot { .. }) => Error::Config {
            message: format!(
                "no usable snapshot at {}; run `tome-rs ingest <file>` first",
                cli.snapshot.display()
            ),
        },
        other => other,
    })
}

fn build_answerer(cli: &Cli, index: Arc<Index>) -> (Arc<Answerer>, Arc<dyn Generator>) {
    let generator = build_generator(cli);
    let retriever = Arc::new(Retriever::new(
        index,
        build_embedder(cli),
        Arc::clone(&generator),
        cli.retrieval_options(),
    ));
    (
        Arc::new(Answerer::new(retriever, Arc::clone(&generator))),
        generator,
    )
}

fn build_evaluator(cli: &Cli, index: Arc<Index>) -> Arc<Evaluator> {
    let (answerer, generator) = build_answerer(cli, index);
    Arc::new(Evaluator::new(
        answerer,
        generator,
        EvalPaths::default(),
        cli.seed,
    ))
}

async fn ingest(cli: &Cli, file: &std::path::Path) -> Result<String> {
    let text = std::fs::read_to_string(file).map_err(|e| Error::Io(format!(
        "{}: {e}",
        file.display()
    )))?;

    let chunker = SemanticChunker::new()?;
    let embedder = build_embedder(cli);
    let ctx = RequestContext::new();

    let file_name = file
        .file_name()
        .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
    let (index, stats) = ingest_document(&ctx, &file_name, &text, &chunker, embedder.as_ref()).await?;
    index.save(&cli.snapshot)?;

    Ok(format!(
        "Ingested {file_name}: {} parents, {} children -> {}\n",
        stats.parents,
        stats.children,
        cli.snapshot.display()
    ))
}

async fn ask(cli: &Cli, prompt: &str) -> Result<String> {
    let index = Arc::new(load_index(cli)?);
    let (answerer, _generator) = build_answerer(cli, index);

    let ctx = RequestContext::with_timeout(ASK_TIMEOUT);
    let outcome = answerer
        .answer(&ctx, "cli", prompt)
        .await
        .map_err(Error::from)?;

    let mut out = outcome.answer;
    out.push('\n');
    if !outcome.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (i, passage) in outcome.sources.iter().enumerate() {
            let label = passage
                .segment
                .structure
                .display_label()
                .unwrap_or("passage");
            let _ = writeln!(out, "  [{}] {label} (score {:.3})", i + 1, passage.score);
        }
    }
    Ok(out)
}

async fn run_server(cli: &Cli, addr: &str) -> Result<String> {
    let index = Arc::new(load_index(cli)?);
    let (answerer, _generator) = build_answerer(cli, Arc::clone(&index));
    let evaluator = build_evaluator(cli, Arc::clone(&index));

    let state = Arc::new(AppState {
        answerer,
        evaluator,
        index,
    });
    serve(state, addr).await?;
    Ok(String::new())
}

async fn gen_testset(cli: &Cli, num_questions: i64) -> Result<String> {
    let index = Arc::new(load_index(cli)?);
    let evaluator = build_evaluator(cli, Arc::clone(&index));

    let ctx = RequestContext::new();
    let questions = evaluator
        .generate_test_set(&ctx, &index, num_questions)
        .await?;

    Ok(format!(
        "Generated {} questions -> {}\n",
        questions.len(),
        evaluator.paths().test_set.display()
    ))
}

async fn eval(cli: &Cli, num_questions: i64, batch_only: bool) -> Result<String> {
    let index = Arc::new(load_index(cli)?);
    let evaluator = build_evaluator(cli, Arc::clone(&index));
    let ctx = RequestContext::new();

    if batch_only {
        let summary = evaluator.run_batch_from_file(&ctx).await?;
        return Ok(format_averages(summary.records.len(), &summary.averages));
    }

    let full = evaluator.run_full(&ctx, &index, num_questions).await?;
    let mut out = format_averages(full.summary.records.len(), &full.summary.averages);
    let _ = writeln!(out, "Report:  {}", full.report_path.display());
    let _ = writeln!(out, "History: {}", full.history_path.display());
    Ok(out)
}

fn format_averages(count: usize, averages: &crate::eval::AverageScores) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Evaluated {count} questions");
    let _ = writeln!(out, "  faithfulness:      {:.3}", averages.faithfulness);
    let _ = writeln!(out, "  relevance:         {:.3}", averages.relevance);
    let _ = writeln!(out, "  context precision: {:.3}", averages.context_precision);
    let _ = writeln!(out, "  answer similarity: {:.3}", averages.answer_similarity);
    out
}
