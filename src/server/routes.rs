use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::AppState;
use crate::error::{AppError, Result};
use crate::ingest::IngestOutcome;
use crate::rag::ChatAnswer;

pub const SUGGESTED_QUESTIONS: [&str; 8] = [
    "How do I apply for annual leave?",
    "What are the requirements for promotion from GL 08 to GL 09?",
    "How is pension calculated under the Contributory Pension Scheme?",
    "What is the disciplinary procedure for a civil servant?",
    "What are the salary grade levels in the civil service?",
    "How do I apply for study leave with pay?",
    "What are the functions of the Civil Service Commission?",
    "What is the probation period for new civil servants?",
];

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub documents_loaded: bool,
    pub chunk_count: usize,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub chunks_loaded: usize,
}

#[derive(Debug, Serialize)]
pub struct SuggestedQuestions {
    pub questions: Vec<&'static str>,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::EmptyMessage => error_body(StatusCode::BAD_REQUEST, self.to_string()),
            Self::IngestInProgress => error_body(StatusCode::CONFLICT, self.to_string()),
            other => {
                error!("Request failed: {other}");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred. Please try again later.",
                )
            }
        }
    }
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let chunk_count = state.db.lock().await.chunk_count()?;
    Ok(Json(HealthResponse {
        status: "ok",
        documents_loaded: chunk_count > 0,
        chunk_count,
    }))
}

/// Answer a question from the indexed documents
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>> {
    let answer = state
        .pipeline
        .answer(&request.message, request.conversation_id)
        .await?;
    Ok(Json(answer))
}

/// Rebuild the index from the documents directory
pub async fn ingest(State(state): State<AppState>) -> Response {
    let Ok(_guard) = state.ingest_guard.try_lock() else {
        return AppError::IngestInProgress.into_response();
    };

    let outcome = match state.ingestor.run(&state.db).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Ingestion failed: {e}");
            return error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Ingestion failed: {e}"),
            );
        }
    };

    match outcome {
        IngestOutcome::NoDocumentsDir => info!("Documents folder was missing; index unchanged"),
        IngestOutcome::NoPdfs => info!("No PDFs to ingest; index unchanged"),
        IngestOutcome::Ingested(report) => info!("Re-ingested {} chunks", report.chunks),
    }

    match state.db.lock().await.chunk_count() {
        Ok(chunks_loaded) => Json(IngestResponse {
            status: "success",
            chunks_loaded,
        })
        .into_response(),
        Err(e) => error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Ingestion failed: {e}"),
        ),
    }
}

pub async fn suggested_questions() -> Json<SuggestedQuestions> {
    Json(SuggestedQuestions {
        questions: SUGGESTED_QUESTIONS.to_vec(),
    })
}
