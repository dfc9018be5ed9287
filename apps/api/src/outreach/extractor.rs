//! Job Extractor: turns normalized page text into structured job postings.
//!
//! Two backends behind the `JobExtractor` trait:
//! - `LlmJobExtractor`: the model reads the page under a strict JSON contract.
//! - `KeywordJobExtractor`: deterministic, no model call. Used as the configured
//!   fallback, or as the primary extractor when the service runs offline.
//!
//! The pipeline holds `Arc<dyn JobExtractor>` and picks backends from config.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{strip_json_fences, CompletionModel, LlmError};
use crate::outreach::portfolio::skill_key;
use crate::outreach::prompts::{EXTRACTION_PROMPT_TEMPLATE, EXTRACTION_SYSTEM};

/// Default cap on page text sent to the model.
pub const DEFAULT_MAX_PAGE_CHARS: usize = 20_000;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// One open role found on the page.
///
/// `role` is never empty. `skills` keeps first-occurrence order and holds no
/// blank or case-insensitively duplicated entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobPosting {
    pub role: String,
    pub experience: Option<String>,
    pub skills: Vec<String>,
    pub description: String,
}

/// Wire shape the extraction contract asks the model for.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPosting {
    role: String,
    #[serde(default)]
    experience: Option<String>,
    skills: Vec<String>,
    description: String,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The model answered, but not in the required JSON shape.
    #[error("extraction output did not match the job posting contract: {message}")]
    Format { message: String },

    /// The model could not be reached or returned an error.
    #[error("extraction model call failed")]
    Transport(#[source] LlmError),
}

impl ExtractionError {
    fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait JobExtractor: Send + Sync {
    async fn extract(&self, normalized_text: &str) -> Result<Vec<JobPosting>, ExtractionError>;

    /// "llm" or "keyword", reported in run results.
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmJobExtractor
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmJobExtractor {
    model: Arc<dyn CompletionModel>,
    max_page_chars: usize,
}

impl LlmJobExtractor {
    pub fn new(model: Arc<dyn CompletionModel>, max_page_chars: usize) -> Self {
        Self {
            model,
            max_page_chars,
        }
    }

    fn build_prompt(&self, normalized_text: &str) -> String {
        let page_text = truncate_chars(normalized_text, self.max_page_chars);
        EXTRACTION_PROMPT_TEMPLATE.replace("{page_text}", page_text)
    }
}

#[async_trait]
impl JobExtractor for LlmJobExtractor {
    async fn extract(&self, normalized_text: &str) -> Result<Vec<JobPosting>, ExtractionError> {
        let system = format!("{EXTRACTION_SYSTEM} {JSON_ONLY_SYSTEM}");
        let prompt = self.build_prompt(normalized_text);

        let raw = self
            .model
            .complete(&system, &prompt)
            .await
            .map_err(ExtractionError::Transport)?;

        let postings = parse_job_postings(&raw)?;
        debug!("LLM extractor returned {} postings", postings.len());
        Ok(postings)
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

/// Parses model output into postings, enforcing the extraction contract.
pub fn parse_job_postings(raw: &str) -> Result<Vec<JobPosting>, ExtractionError> {
    let text = strip_json_fences(raw);

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ExtractionError::format(format!("output is not valid JSON: {e}")))?;
    if !value.is_array() {
        return Err(ExtractionError::format("top-level value must be a JSON array"));
    }

    let raw_postings: Vec<RawPosting> = serde_json::from_value(value)
        .map_err(|e| ExtractionError::format(format!("unexpected posting shape: {e}")))?;

    raw_postings
        .into_iter()
        .enumerate()
        .map(|(i, raw)| validate_posting(i, raw))
        .collect()
}

fn validate_posting(index: usize, raw: RawPosting) -> Result<JobPosting, ExtractionError> {
    let role = raw.role.trim().to_string();
    if role.is_empty() {
        return Err(ExtractionError::format(format!(
            "posting {index} has an empty role"
        )));
    }

    let mut seen = HashSet::new();
    let mut skills = Vec::with_capacity(raw.skills.len());
    for skill in raw.skills {
        let skill = skill.trim();
        if skill.is_empty() {
            return Err(ExtractionError::format(format!(
                "posting {index} ({role}) lists a blank skill"
            )));
        }
        if seen.insert(skill_key(skill)) {
            skills.push(skill.to_string());
        }
    }

    let experience = raw
        .experience
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    Ok(JobPosting {
        role,
        experience,
        skills,
        description: raw.description.trim().to_string(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordJobExtractor (deterministic fallback)
// ────────────────────────────────────────────────────────────────────────────

/// Skills recognized by the keyword extractor in addition to any configured terms.
pub const DEFAULT_VOCABULARY: &[&str] = &[
    "Rust", "Go", "Golang", "Python", "Java", "Kotlin", "Scala", "Swift", "C++", "C#",
    "JavaScript", "TypeScript", "Ruby", "PHP", "Elixir", "SQL", "PostgreSQL", "MySQL",
    "MongoDB", "Redis", "Kafka", "Spark", "Airflow", "Snowflake", "React", "Angular",
    "Vue", "Node.js", "Django", "Flask", "FastAPI", "Spring", "Rails", ".NET", "GraphQL",
    "REST", "gRPC", "Docker", "Kubernetes", "Terraform", "AWS", "GCP", "Azure", "Linux",
    "CI/CD", "Machine Learning", "Deep Learning", "PyTorch", "TensorFlow", "NLP", "LLM",
    "iOS", "Android", "Flutter",
];

static ROLE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(?:Senior|Sr\.?|Junior|Jr\.?|Lead|Staff|Principal)\s+)?(?:[A-Z][A-Za-z0-9+#./-]*\s+){0,3}(?:Engineer|Developer|Scientist|Architect|Designer|Analyst|Manager|Consultant|Specialist|Administrator)\b",
    )
    .expect("role title pattern is valid")
});

const DESCRIPTION_CHARS: usize = 500;

pub struct KeywordJobExtractor {
    vocabulary: Vec<String>,
}

impl Default for KeywordJobExtractor {
    fn default() -> Self {
        Self::with_terms(std::iter::empty::<String>())
    }
}

impl KeywordJobExtractor {
    /// Builds an extractor recognizing `DEFAULT_VOCABULARY` plus `extra` terms
    /// (typically the portfolio catalog's skills).
    pub fn with_terms<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let vocabulary = DEFAULT_VOCABULARY
            .iter()
            .map(|s| s.to_string())
            .chain(extra.into_iter().map(|s| s.as_ref().trim().to_string()))
            .filter(|s| !s.is_empty() && seen.insert(skill_key(s)))
            .collect();
        Self { vocabulary }
    }

    fn extract_sync(&self, text: &str) -> Result<Vec<JobPosting>, ExtractionError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let role = ROLE_TITLE
            .find(text)
            .map(|m| m.as_str().trim().to_string())
            .ok_or_else(|| ExtractionError::format("no job title found in page text"))?;

        let lower = text.to_lowercase();
        let mut found: Vec<(usize, &str)> = self
            .vocabulary
            .iter()
            .filter_map(|term| find_term(&lower, &term.to_lowercase()).map(|at| (at, term.as_str())))
            .collect();
        // stable: terms found at the same offset keep vocabulary order
        found.sort_by_key(|(at, _)| *at);

        let mut seen = HashSet::new();
        let skills = found
            .into_iter()
            .filter(|(_, term)| seen.insert(skill_key(term)))
            .map(|(_, term)| term.to_string())
            .collect();

        info!("Keyword extractor found role '{role}'");
        Ok(vec![JobPosting {
            role,
            experience: None,
            skills,
            description: truncate_chars(text, DESCRIPTION_CHARS).to_string(),
        }])
    }
}

#[async_trait]
impl JobExtractor for KeywordJobExtractor {
    async fn extract(&self, normalized_text: &str) -> Result<Vec<JobPosting>, ExtractionError> {
        self.extract_sync(normalized_text)
    }

    fn backend(&self) -> &'static str {
        "keyword"
    }
}

/// Byte offset of the first whole-word occurrence of `term` in `text`.
/// Both arguments must already be lowercased.
fn find_term(text: &str, term: &str) -> Option<usize> {
    if term.is_empty() {
        return None;
    }
    text.match_indices(term).map(|(at, _)| at).find(|&at| {
        let before_ok = text[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[at + term.len()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '+' || c == '#'));
        before_ok && after_ok
    })
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
