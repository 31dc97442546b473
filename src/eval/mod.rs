//! Evaluation harness.
//!
//! Drives the full retrieval core with synthetic question/answer pairs and
//! scores the answers via a generator judge plus two intrinsic metrics.
//! Batch runs are capped to the worker pool size; a rate-limited endpoint
//! pauses the batch (completed records stay in memory, no history file is
//! written).

mod judge;
mod metrics;
mod report;
mod testset;

pub use judge::{JUDGE_SYSTEM_PROMPT, JudgeVerdict, judge_answer, parse_verdict};
pub use metrics::{answer_similarity, context_precision, keyword_set};
pub use report::{
    AverageScores, EvaluationRecord, HistoryEntry, append_history, average_scores,
    render_markdown, write_report,
};
pub use testset::{TestQuestion, TestSetGenerator, load_test_set, save_test_set};

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::Semaphore;

use crate::answer::Answerer;
use crate::core::RequestContext;
use crate::error::{Error, EvalError, ModelError, Result};
use crate::generation::Generator;
use crate::index::Index;

/// Output locations for evaluation artifacts.
#[derive(Debug, Clone)]
pub struct EvalPaths {
    /// Persisted test set.
    pub test_set: PathBuf,
    /// Markdown report.
    pub report: PathBuf,
    /// Directory of dated history files.
    pub history_dir: PathBuf,
}

impl Default for EvalPaths {
    fn default() -> Self {
        Self {
            test_set: PathBuf::from("test-set.json"),
            report: PathBuf::from("evaluation_report.md"),
            history_dir: PathBuf::from("evaluation-history"),
        }
    }
}

/// Result of a completed batch run.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Score averages.
    pub averages: AverageScores,
    /// Per-question records, in test-set order.
    pub records: Vec<EvaluationRecord>,
}

/// Result of a full evaluation (generate + batch + persist).
#[derive(Debug, Clone)]
pub struct FullEvaluation {
    /// The batch summary.
    pub summary: BatchSummary,
    /// Where the report was written.
    pub report_path: PathBuf,
    /// Where the history snapshot was appended.
    pub history_path: PathBuf,
}

/// Drives the core as a client and scores its answers.
pub struct Evaluator {
    answerer: Arc<Answerer>,
    generator: Arc<dyn Generator>,
    paths: EvalPaths,
    seed: u64,
    completed: Mutex<Vec<EvaluationRecord>>,
}

impl Evaluator {
    /// Creates an evaluator. `generator` serves both test-set synthesis
    /// and judging; `seed` fixes test-set sampling.
    #[must_use]
    pub fn new(
        answerer: Arc<Answerer>,
        generator: Arc<dyn Generator>,
        paths: EvalPaths,
        seed: u64,
    ) -> Self {
        Self {
            answerer,
            generator,
            paths,
            seed,
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Artifact paths in use.
    #[must_use]
    pub const fn paths(&self) -> &EvalPaths {
        &self.paths
    }

    /// Records completed before the last batch paused or finished.
    #[must_use]
    pub fn completed(&self) -> Vec<EvaluationRecord> {
        self.completed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Synthesises and persists a test set over `index`.
    ///
    /// # Errors
    ///
    /// Propagates model errors and write failures.
    pub async fn generate_test_set(
        &self,
        ctx: &RequestContext,
        index: &Index,
        num_questions: i64,
    ) -> Result<Vec<TestQuestion>> {
        let generator = TestSetGenerator::new(Arc::clone(&self.generator), self.seed);
        let questions = generator.generate(ctx, index, num_questions).await?;
        save_test_set(&self.paths.test_set, &questions)?;
        Ok(questions)
    }

    /// Runs the answerer over every test question in parallel (capped to
    /// available cores) and scores the results.
    ///
    /// The first rate-limit or cancellation pauses the batch: no further
    /// questions are dispatched, in-flight calls are dropped, the error is
    /// surfaced, and completed records remain available via
    /// [`Evaluator::completed`]. No history file is written here.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::MissingTestSet`] for an empty test set and
    /// propagates the pausing [`ModelError`] otherwise.
    pub async fn run_batch(
        &self,
        ctx: &RequestContext,
        questions: &[TestQuestion],
    ) -> Result<BatchSummary> {
        if questions.is_empty() {
            return Err(EvalError::MissingTestSet {
                path: self.paths.test_set.display().to_string(),
            }
            .into());
        }

        self.completed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();

        let concurrency = std::thread::available_parallelism().map_or(4, std::num::NonZero::get);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let mut in_flight = FuturesUnordered::new();
        for (i, question) in questions.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            in_flight.push(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| Error::Model(ModelError::Cancelled))?;
                self.evaluate_one(ctx, i, question).await
            });
        }

        let mut indexed: Vec<(usize, EvaluationRecord)> = Vec::with_capacity(questions.len());
        while let Some(result) = in_flight.next().await {
            match result {
                Ok((i, record)) => {
                    self.completed
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .push(record.clone());
                    indexed.push((i, record));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "batch paused; dropping in-flight evaluations");
                    return Err(err);
                }
            }
        }

        indexed.sort_by_key(|(i, _)| *i);
        let records: Vec<EvaluationRecord> =
            indexed.into_iter().map(|(_, record)| record).collect();

        Ok(BatchSummary {
            averages: average_scores(&records),
            records,
        })
    }

    /// Loads the persisted test set and runs a batch over it.
    ///
    /// # Errors
    ///
    /// See [`Evaluator::run_batch`].
    pub async fn run_batch_from_file(&self, ctx: &RequestContext) -> Result<BatchSummary> {
        let questions = load_test_set(&self.paths.test_set)?;
        self.run_batch(ctx, &questions).await
    }

    /// Full evaluation: synthesise a test set, run the batch, and persist
    /// the report and history snapshot. History is written only after all
    /// scoring finishes.
    ///
    /// # Errors
    ///
    /// Propagates generation, batch, and persistence failures.
    pub async fn run_full(
        &self,
        ctx: &RequestContext,
        index: &Index,
        num_questions: i64,
    ) -> Result<FullEvaluation> {
        let questions = self.generate_test_set(ctx, index, num_questions).await?;
        let summary = self.run_batch(ctx, &questions).await?;

        write_report(&self.paths.report, &summary.records)?;
        let history_path = append_history(&self.paths.history_dir, &summary.records)?;

        Ok(FullEvaluation {
            summary,
            report_path: self.paths.report.clone(),
            history_path,
        })
    }

    /// Answers and scores one test question.
    async fn evaluate_one(
        &self,
        ctx: &RequestContext,
        i: usize,
        question: &TestQuestion,
    ) -> Result<(usize, EvaluationRecord)> {
        ctx.ensure_active().map_err(Error::from)?;

        let session = format!("eval-{i}");
        let outcome = self
            .answerer
            .answer(ctx, &session, &question.question)
            .await?;
        self.answerer.clear_session(&session).await;

        let source_texts: Vec<String> = outcome
            .sources
            .iter()
            .map(|p| p.segment.text.clone())
            .collect();

        let verdict = judge_answer(
            &self.generator,
            &question.question,
            &outcome.answer,
            &source_texts,
        )
        .await?;

        let similarity = answer_similarity(&outcome.answer, &question.ground_truth);
        let precision = context_precision(&source_texts, &question.source_segment);

        let record = EvaluationRecord {
            question: question.question.clone(),
            ground_truth: question.ground_truth.clone(),
            answer: outcome.answer,
            faithfulness: verdict.faithfulness,
            relevance: verdict.relevance,
            context_precision: precision,
            answer_similarity: similarity,
            judge_reasoning: verdict.reasoning,
            sources: source_texts,
        };

        Ok((i, record))
    }
}
