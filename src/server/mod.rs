//! Thin HTTP surface over the retrieval core.
//!
//! Routes:
//! - `GET  /api/ai/chat?prompt=…` — synchronous plain-text answer
//! - `POST /api/ai/stream` — SSE fragment stream
//! - `POST /api/evaluation/generate-test-set?numQuestions=…`
//! - `POST /api/evaluation/run-batch-test`
//! - `POST /api/evaluation/run-full-evaluation?numQuestions=…`
//! - `GET  /api/evaluation/report` — JSON-wrapped Markdown report

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::answer::Answerer;
use crate::error::{Error, ModelError};
use crate::eval::Evaluator;
use crate::index::Index;
use crate::core::RequestContext;

/// Session id used by the browser chat surface.
const CHAT_SESSION: &str = "http-chat";

/// Default per-request deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared server state.
pub struct AppState {
    /// Chat answering.
    pub answerer: Arc<Answerer>,
    /// Evaluation harness.
    pub evaluator: Arc<Evaluator>,
    /// The frozen index (evaluation test-set generation reads it).
    pub index: Arc<Index>,
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ai/chat", get(chat))
        .route("/api/ai/stream", post(stream))
        .route(
            "/api/evaluation/generate-test-set",
            post(generate_test_set),
        )
        .route("/api/evaluation/run-batch-test", post(run_batch_test))
        .route(
            "/api/evaluation/run-full-evaluation",
            post(run_full_evaluation),
        )
        .route("/api/evaluation/report", get(report))
        .with_state(state)
}

/// Serves the router on `addr` until the process is stopped.
///
/// # Errors
///
/// Returns an error when the listener cannot bind.
pub async fn serve(state: Arc<AppState>, addr: &str) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Io(e.to_string()))?;
    tracing::info!(%addr, "http surface listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::Io(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct ChatParams {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct StreamBody {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct TestSetParams {
    #[serde(rename = "numQuestions", default = "default_num_questions")]
    num_questions: i64,
}

const fn default_num_questions() -> i64 {
    20
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: String,
    #[serde(rename = "numQuestions")]
    num_questions: usize,
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    #[serde(rename = "numQuestions")]
    num_questions: usize,
    #[serde(rename = "averageScores")]
    average_scores: crate::eval::AverageScores,
}

#[derive(Debug, Serialize)]
struct FullEvaluationResponse {
    #[serde(rename = "numQuestions")]
    num_questions: usize,
    #[serde(rename = "averageScores")]
    average_scores: crate::eval::AverageScores,
    #[serde(rename = "reportPath")]
    report_path: String,
    #[serde(rename = "historyPath")]
    history_path: String,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    report: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChatParams>,
) -> Result<String, (StatusCode, String)> {
    if params.prompt.trim().is_empty() {
        return Err(error_response(Error::EmptyInput {
            context: "chat prompt".to_string(),
        }));
    }
    let ctx = RequestContext::with_timeout(REQUEST_TIMEOUT);
    let outcome = state
        .answerer
        .answer(&ctx, CHAT_SESSION, &params.prompt)
        .await
        .map_err(model_error_response)?;
    Ok(outcome.answer)
}

async fn stream(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<StreamBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    if body.prompt.trim().is_empty() {
        return Err(error_response(Error::EmptyInput {
            context: "stream prompt".to_string(),
        }));
    }
    let ctx = RequestContext::with_timeout(REQUEST_TIMEOUT);
    let fragments = state
        .answerer
        .stream_answer(&ctx, CHAT_SESSION, &body.prompt)
        .await
        .map_err(model_error_response)?;

    let events = fragments.map(|item| {
        let event = match item {
            Ok(fragment) => Event::default().data(fragment),
            Err(err) => Event::default().event("error").data(err.to_string()),
        };
        Ok(event)
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn generate_test_set(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TestSetParams>,
) -> Result<axum::Json<StatusResponse>, (StatusCode, String)> {
    let ctx = RequestContext::new();
    let questions = state
        .evaluator
        .generate_test_set(&ctx, &state.index, params.num_questions)
        .await
        .map_err(error_response)?;

    Ok(axum::Json(StatusResponse {
        status: "generated".to_string(),
        num_questions: questions.len(),
    }))
}

async fn run_batch_test(
    State(state): State<Arc<AppState>>,
) -> Result<axum::Json<BatchResponse>, (StatusCode, String)> {
    let ctx = RequestContext::new();
    let summary = state
        .evaluator
        .run_batch_from_file(&ctx)
        .await
        .map_err(error_response)?;

    Ok(axum::Json(BatchResponse {
        num_questions: summary.records.len(),
        average_scores: summary.averages,
    }))
}

async fn run_full_evaluation(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TestSetParams>,
) -> Result<axum::Json<FullEvaluationResponse>, (StatusCode, String)> {
    let ctx = RequestContext::new();
    let full = state
        .evaluator
        .run_full(&ctx, &state.index, params.num_questions)
        .await
        .map_err(error_response)?;

    Ok(axum::Json(FullEvaluationResponse {
        num_questions: full.summary.records.len(),
        average_scores: full.summary.averages,
        report_path: full.report_path.display().to_string(),
        history_path: full.history_path.display().to_string(),
    }))
}

async fn report(
    State(state): State<Arc<AppState>>,
) -> Result<axum::Json<ReportResponse>, (StatusCode, String)> {
    let path = &state.evaluator.paths().report;
    let markdown = std::fs::read_to_string(path).map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            "no evaluation report has been generated yet".to_string(),
        )
    })?;
    Ok(axum::Json(ReportResponse { report: markdown }))
}

fn model_error_response(err: ModelError) -> (StatusCode, String) {
    let status = match &err {
        ModelError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ModelError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        ModelError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        ModelError::UpstreamServer { .. } => StatusCode::BAD_GATEWAY,
        ModelError::Request(_) | ModelError::EmptyResponse => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn error_response(err: Error) -> (StatusCode, String) {
    match err {
        Error::Model(model) => model_error_response(model),
        Error::EmptyInput { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        Error::Eval(_) => (StatusCode::CONFLICT, err.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_statuses() {
        let (status, _) = model_error_response(ModelError::RateLimited {
            message: "q".to_string(),
        });
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, _) = model_error_response(ModelError::Unauthorized {
            message: "k".to_string(),
        });
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = model_error_response(ModelError::Cancelled);
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

        let (status, _) = model_error_response(ModelError::UpstreamServer {
            status: 503,
            message: "down".to_string(),
        });
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_error_response_mapping() {
        let (status, _) = error_response(Error::EmptyInput {
            context: "chat".to_string(),
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_response(Error::Io("disk".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_default_num_questions() {
        let params: TestSetParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.num_questions, 20);

        let params: TestSetParams = serde_json::from_str(r#"{"numQuestions": 5}"#).unwrap();
        assert_eq!(params.num_questions, 5);
    }
}
