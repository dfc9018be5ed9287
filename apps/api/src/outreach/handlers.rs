//! Axum route handlers for the outreach API.
//!
//! These are the display collaborator for the pipeline: they collect what a
//! run delivers and render it as JSON.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::outreach::composer::GeneratedEmail;
use crate::outreach::extractor::JobPosting;
use crate::outreach::pipeline::{JobFailure, OutputSink, RunStatus};
use crate::outreach::portfolio::{PortfolioIndex, PortfolioRecord};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Where the job posting comes from. Exactly one field must be set.
#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub url: Option<String>,
    pub page_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateEmailsResponse {
    pub run_id: Option<Uuid>,
    pub status: Option<RunStatus>,
    pub extractor_used: Option<&'static str>,
    pub jobs_extracted: usize,
    pub jobs_dropped_by_cap: usize,
    pub emails: Vec<GeneratedEmail>,
    pub failures: Vec<JobFailure>,
}

#[derive(Debug, Serialize)]
pub struct ExtractJobsResponse {
    pub jobs: Vec<JobPosting>,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub skills: Vec<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub links: Vec<String>,
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    pub records: Vec<PortfolioRecord>,
}

/// Collects what a run delivers into the response body.
#[derive(Debug, Default)]
struct ResponseSink {
    emails: Vec<GeneratedEmail>,
    failures: Vec<JobFailure>,
    run_id: Option<Uuid>,
    status: Option<RunStatus>,
}

impl OutputSink for ResponseSink {
    fn email(&mut self, email: &GeneratedEmail) {
        self.emails.push(email.clone());
    }

    fn job_failed(&mut self, failure: &JobFailure) {
        self.failures.push(failure.clone());
    }

    fn finished(&mut self, run_id: Uuid, status: &RunStatus) {
        self.run_id = Some(run_id);
        self.status = Some(status.clone());
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/emails/generate
///
/// Full run: fetch (if `url`) → normalize → extract → match → compose.
/// A failed run is still a 200: its status carries the reason.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<PageRequest>,
) -> Result<Json<GenerateEmailsResponse>, AppError> {
    let page_text = resolve_page_text(&state, request).await?;
    let index = load_portfolio(&state).await?;
    let cancel = state.shutdown.child_token();

    let mut sink = ResponseSink::default();
    let report = state
        .pipeline
        .run_and_deliver(&page_text, &index, &cancel, &mut sink)
        .await;

    Ok(Json(GenerateEmailsResponse {
        run_id: sink.run_id,
        status: sink.status,
        extractor_used: report.extractor_used,
        jobs_extracted: report.jobs_extracted,
        jobs_dropped_by_cap: report.jobs_dropped_by_cap,
        emails: sink.emails,
        failures: sink.failures,
    }))
}

/// POST /api/v1/jobs/extract
///
/// Normalization + extraction only. Useful for previewing what a page yields.
pub async fn handle_extract_jobs(
    State(state): State<AppState>,
    Json(request): Json<PageRequest>,
) -> Result<Json<ExtractJobsResponse>, AppError> {
    let page_text = resolve_page_text(&state, request).await?;
    let jobs = state.pipeline.preview_jobs(&page_text).await?;
    Ok(Json(ExtractJobsResponse { jobs }))
}

/// POST /api/v1/portfolio/match
pub async fn handle_match(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    let top_k = request.top_k.unwrap_or(state.pipeline.options().top_k);
    if top_k == 0 {
        return Err(AppError::Validation("top_k must be at least 1".to_string()));
    }

    let index = load_portfolio(&state).await?;
    let response = match index.query_links(&request.skills, top_k) {
        Ok(links) => MatchResponse {
            links,
            warning: None,
        },
        Err(err) => MatchResponse {
            links: Vec::new(),
            warning: Some(err.to_string()),
        },
    };
    Ok(Json(response))
}

/// GET /api/v1/portfolio
pub async fn handle_list_portfolio(
    State(state): State<AppState>,
) -> Result<Json<PortfolioResponse>, AppError> {
    let index = load_portfolio(&state).await?;
    Ok(Json(PortfolioResponse {
        records: index.records().cloned().collect(),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn resolve_page_text(state: &AppState, request: PageRequest) -> Result<String, AppError> {
    match (request.url, request.page_text) {
        (Some(url), None) => {
            info!("Fetching job page {url}");
            Ok(state.fetcher.fetch_text(&url).await?)
        }
        (None, Some(text)) => {
            if text.trim().is_empty() {
                return Err(AppError::Validation("page_text cannot be empty".to_string()));
            }
            Ok(text)
        }
        (Some(_), Some(_)) => Err(AppError::Validation(
            "provide either url or page_text, not both".to_string(),
        )),
        (None, None) => Err(AppError::Validation(
            "one of url or page_text is required".to_string(),
        )),
    }
}

/// Loads a fresh portfolio snapshot for one request.
async fn load_portfolio(state: &AppState) -> Result<PortfolioIndex, AppError> {
    let catalog = state.catalog.clone();
    let index = tokio::task::spawn_blocking(move || PortfolioIndex::from_source(catalog.as_ref()))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    Ok(index)
}
