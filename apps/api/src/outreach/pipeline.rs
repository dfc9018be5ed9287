//! Outreach pipeline: orchestrates one run from raw page text to emails.
//!
//! Flow: normalize → extract (primary, then fallback if configured) →
//!       per job: match portfolio links → compose email.
//!
//! `run` produces a complete, immutable `RunReport` first; `deliver` then hands
//! it to an `OutputSink` in extraction order. Job-level failures are recorded
//! on the job and never fail the run. Only extraction (or cancellation) can.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::outreach::composer::{EmailComposer, GeneratedEmail};
use crate::outreach::extractor::{ExtractionError, JobExtractor, JobPosting};
use crate::outreach::normalizer::normalize;
use crate::outreach::portfolio::{PortfolioIndex, DEFAULT_TOP_K};

// ────────────────────────────────────────────────────────────────────────────
// Run data models
// ────────────────────────────────────────────────────────────────────────────

/// States a run moves through. `Failed` is reachable from any step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Normalizing,
    Extracting,
    MatchingAndComposing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ExtractionFormat,
    ExtractionTransport,
    Cancelled,
}

/// Why a run failed. `message` carries the full cause chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: "run was cancelled".to_string(),
        }
    }
}

impl From<&ExtractionError> for FailureReason {
    fn from(err: &ExtractionError) -> Self {
        let kind = match err {
            ExtractionError::Format { .. } => FailureKind::ExtractionFormat,
            ExtractionError::Transport(_) => FailureKind::ExtractionTransport,
        };
        Self {
            kind,
            message: error_chain(err),
        }
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Failed { reason: FailureReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFailureKind {
    EmailGeneration,
    Cancelled,
}

/// A job that was skipped during matching and composing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    pub job_role: String,
    pub kind: JobFailureKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Composed {
        email: GeneratedEmail,
        /// Set when the portfolio could not be queried and zero links were used.
        match_warning: Option<String>,
    },
    Failed(JobFailure),
}

/// Everything one run produced, in extraction order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phases: Vec<RunPhase>,
    /// Backend of the extractor whose output was used, if any succeeded.
    pub extractor_used: Option<&'static str>,
    pub jobs_extracted: usize,
    pub jobs_dropped_by_cap: usize,
    pub outcomes: Vec<JobOutcome>,
    pub status: RunStatus,
}

impl RunReport {
    pub fn emails(&self) -> impl Iterator<Item = &GeneratedEmail> {
        self.outcomes.iter().filter_map(|o| match o {
            JobOutcome::Composed { email, .. } => Some(email),
            JobOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobFailure> {
        self.outcomes.iter().filter_map(|o| match o {
            JobOutcome::Failed(failure) => Some(failure),
            JobOutcome::Composed { .. } => None,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output boundary
// ────────────────────────────────────────────────────────────────────────────

/// Display/output collaborator. Receives one call per email, one per skipped
/// job, and exactly one terminal status per run.
pub trait OutputSink: Send {
    fn email(&mut self, email: &GeneratedEmail);
    fn job_failed(&mut self, failure: &JobFailure);
    fn finished(&mut self, run_id: Uuid, status: &RunStatus);
}

/// Hands a finished report to `sink` in extraction order.
pub fn deliver(report: &RunReport, sink: &mut dyn OutputSink) {
    for outcome in &report.outcomes {
        match outcome {
            JobOutcome::Composed { email, .. } => sink.email(email),
            JobOutcome::Failed(failure) => sink.job_failed(failure),
        }
    }
    sink.finished(report.run_id, &report.status);
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Links per job, at least 1.
    pub top_k: usize,
    /// Jobs beyond this many are dropped before composing.
    pub max_jobs_per_run: Option<usize>,
    /// Jobs matched and composed at the same time, at least 1.
    pub job_concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_jobs_per_run: None,
            job_concurrency: 1,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    extractor: Arc<dyn JobExtractor>,
    fallback_extractor: Option<Arc<dyn JobExtractor>>,
    composer: Arc<dyn EmailComposer>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn JobExtractor>,
        composer: Arc<dyn EmailComposer>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            extractor,
            fallback_extractor: None,
            composer,
            options,
        }
    }

    /// Extractor used when the primary one fails entirely.
    pub fn with_fallback_extractor(mut self, fallback: Arc<dyn JobExtractor>) -> Self {
        self.fallback_extractor = Some(fallback);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Normalizes and extracts without matching or composing.
    pub async fn preview_jobs(&self, raw_text: &str) -> Result<Vec<JobPosting>, ExtractionError> {
        let normalized = normalize(raw_text);
        self.extract_with_fallback(&normalized)
            .await
            .map(|(jobs, _)| jobs)
            .map_err(|failed| failed.error)
    }

    /// Runs the pipeline and returns the complete report. Emits nothing.
    pub async fn run(
        &self,
        raw_text: &str,
        index: &PortfolioIndex,
        cancel: &CancellationToken,
    ) -> RunReport {
        let mut run = RunTracker::start();
        info!("Run {} started ({} chars of page text)", run.id, raw_text.len());

        run.enter(RunPhase::Normalizing);
        let normalized = normalize(raw_text);

        run.enter(RunPhase::Extracting);
        if cancel.is_cancelled() {
            return run.fail(FailureReason::cancelled());
        }
        let extracted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return run.fail(FailureReason::cancelled()),
            result = self.extract_with_fallback(&normalized) => result,
        };
        let mut jobs = match extracted {
            Ok((jobs, backend)) => {
                run.extractor_used = Some(backend);
                jobs
            }
            Err(failed) => return run.fail(failed.reason),
        };

        run.jobs_extracted = jobs.len();
        if let Some(cap) = self.options.max_jobs_per_run {
            if jobs.len() > cap {
                warn!(
                    "Run {}: {} jobs extracted, composing only the first {}",
                    run.id,
                    jobs.len(),
                    cap
                );
                run.jobs_dropped_by_cap = jobs.len() - cap;
                jobs.truncate(cap);
            }
        }
        info!("Run {}: composing emails for {} jobs", run.id, jobs.len());

        run.enter(RunPhase::MatchingAndComposing);
        let concurrency = self.options.job_concurrency.max(1);
        let outcomes: Vec<JobOutcome> = stream::iter(jobs)
            .map(|job| self.process_job(job, index, cancel))
            .buffered(concurrency)
            .collect()
            .await;
        run.outcomes = outcomes;

        if cancel.is_cancelled() {
            return run.fail(FailureReason::cancelled());
        }
        run.finish()
    }

    /// `run`, then `deliver` the report to `sink`.
    pub async fn run_and_deliver(
        &self,
        raw_text: &str,
        index: &PortfolioIndex,
        cancel: &CancellationToken,
        sink: &mut dyn OutputSink,
    ) -> RunReport {
        let report = self.run(raw_text, index, cancel).await;
        deliver(&report, sink);
        report
    }

    async fn extract_with_fallback(
        &self,
        normalized: &str,
    ) -> Result<(Vec<JobPosting>, &'static str), FailedExtraction> {
        let primary_err = match self.extractor.extract(normalized).await {
            Ok(jobs) => return Ok((jobs, self.extractor.backend())),
            Err(err) => err,
        };

        let Some(fallback) = &self.fallback_extractor else {
            return Err(FailedExtraction {
                reason: FailureReason::from(&primary_err),
                error: primary_err,
            });
        };

        warn!(
            "Primary extractor '{}' failed ({}); trying fallback '{}'",
            self.extractor.backend(),
            error_chain(&primary_err),
            fallback.backend()
        );

        match fallback.extract(normalized).await {
            Ok(jobs) => Ok((jobs, fallback.backend())),
            Err(fallback_err) => {
                let mut reason = FailureReason::from(&fallback_err);
                reason.message = format!(
                    "fallback extractor '{}' failed: {}; primary extractor '{}' failed: {}",
                    fallback.backend(),
                    reason.message,
                    self.extractor.backend(),
                    error_chain(&primary_err)
                );
                Err(FailedExtraction {
                    error: fallback_err,
                    reason,
                })
            }
        }
    }

    async fn process_job(
        &self,
        job: JobPosting,
        index: &PortfolioIndex,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        if cancel.is_cancelled() {
            return JobOutcome::Failed(JobFailure {
                job_role: job.role,
                kind: JobFailureKind::Cancelled,
                reason: "run was cancelled before this job started".to_string(),
            });
        }

        let (links, match_warning) = match index.query_links(&job.skills, self.options.top_k) {
            Ok(links) => (links, None),
            Err(err) => {
                warn!("Portfolio match for '{}' degraded to zero links: {err}", job.role);
                (Vec::new(), Some(err.to_string()))
            }
        };

        let composed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return JobOutcome::Failed(JobFailure {
                    job_role: job.role,
                    kind: JobFailureKind::Cancelled,
                    reason: "run was cancelled while composing this job".to_string(),
                });
            }
            result = self.composer.compose(&job, &links) => result,
        };

        match composed {
            Ok(body) => {
                debug!("Composed email for '{}' with {} links", job.role, links.len());
                JobOutcome::Composed {
                    email: GeneratedEmail {
                        job_role: job.role,
                        body,
                        links,
                    },
                    match_warning,
                }
            }
            Err(err) => {
                let reason = error_chain(&err);
                warn!("Skipping job '{}': {reason}", job.role);
                JobOutcome::Failed(JobFailure {
                    job_role: job.role,
                    kind: JobFailureKind::EmailGeneration,
                    reason,
                })
            }
        }
    }
}

/// Extraction gave up: the last error, plus the run-level reason naming every
/// extractor that was tried.
struct FailedExtraction {
    error: ExtractionError,
    reason: FailureReason,
}

/// Accumulates a report while the run advances through its phases.
struct RunTracker {
    id: Uuid,
    started_at: DateTime<Utc>,
    phases: Vec<RunPhase>,
    extractor_used: Option<&'static str>,
    jobs_extracted: usize,
    jobs_dropped_by_cap: usize,
    outcomes: Vec<JobOutcome>,
}

impl RunTracker {
    fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            phases: vec![RunPhase::Idle],
            extractor_used: None,
            jobs_extracted: 0,
            jobs_dropped_by_cap: 0,
            outcomes: Vec::new(),
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!("Run {}: {:?} -> {:?}", self.id, self.phases.last(), phase);
        self.phases.push(phase);
    }

    fn fail(mut self, reason: FailureReason) -> RunReport {
        warn!("Run {} failed ({:?}): {}", self.id, reason.kind, reason.message);
        self.enter(RunPhase::Failed);
        self.into_report(RunStatus::Failed { reason })
    }

    fn finish(mut self) -> RunReport {
        self.enter(RunPhase::Done);
        let report = self.into_report(RunStatus::Done);
        info!(
            "Run {} done: {} emails, {} skipped jobs",
            report.run_id,
            report.emails().count(),
            report.failures().count()
        );
        report
    }

    fn into_report(self, status: RunStatus) -> RunReport {
        RunReport {
            run_id: self.id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            phases: self.phases,
            extractor_used: self.extractor_used,
            jobs_extracted: self.jobs_extracted,
            jobs_dropped_by_cap: self.jobs_dropped_by_cap,
            outcomes: self.outcomes,
            status,
        }
    }
}

/// Renders an error and all of its sources as "outer: inner: root".
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
