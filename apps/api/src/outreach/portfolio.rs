//! Portfolio Index: a small catalog of (skill set, link) records answering
//! "which past projects best demonstrate these skills?".
//!
//! Matching is a case-insensitive overlap count between the required skills
//! and each record's skill set. Records are ranked by overlap descending; ties
//! keep catalog insertion order. Records with zero overlap are never returned.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Links returned per job when the caller does not say otherwise.
pub const DEFAULT_TOP_K: usize = 2;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// One catalog entry: a project link and the skills it demonstrates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRecord {
    /// Deduplicated (case-insensitively), in the order the catalog listed them.
    pub skills: Vec<String>,
    pub link: String,
}

impl PortfolioRecord {
    pub fn new<I, S>(skills: I, link: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let skills = skills
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(skill_key(s)))
            .collect();
        Self {
            skills,
            link: link.into().trim().to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read portfolio catalog {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("portfolio catalog {path} is missing the '{column}' column")]
    MissingColumn { path: String, column: &'static str },

    #[error("portfolio catalog row {row} has no link")]
    MissingLink { row: usize },
}

/// Defensive category for an index that cannot answer a query.
/// The pipeline degrades these to "zero links" instead of failing the job.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("portfolio catalog is empty")]
    EmptyCatalog,

    #[error("top_k must be at least 1")]
    InvalidTopK,
}

// ────────────────────────────────────────────────────────────────────────────
// Catalog sources
// ────────────────────────────────────────────────────────────────────────────

/// Supplies catalog records. The index is (re)built from one of these.
pub trait CatalogSource: Send + Sync {
    fn load_records(&self) -> Result<Vec<PortfolioRecord>, CatalogError>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// CSV catalog with a `Techstack` column (comma-separated skills) and a
/// `Links` column. Header names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct CsvCatalog {
    path: PathBuf,
}

impl CsvCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

const TECHSTACK_COLUMN: &str = "techstack";
const LINKS_COLUMN: &str = "links";

impl CatalogSource for CsvCatalog {
    fn load_records(&self) -> Result<Vec<PortfolioRecord>, CatalogError> {
        let path = self.path.display().to_string();
        let csv_err = |source| CatalogError::Csv {
            path: path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)
            .map_err(csv_err)?;

        let headers = reader.headers().map_err(csv_err)?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| CatalogError::MissingColumn {
                    path: path.clone(),
                    column: name,
                })
        };
        let skills_idx = column(TECHSTACK_COLUMN)?;
        let link_idx = column(LINKS_COLUMN)?;

        let mut records = Vec::new();
        for (i, row) in reader.records().enumerate() {
            let row = row.map_err(csv_err)?;
            let techstack = row.get(skills_idx).unwrap_or_default();
            let link = row.get(link_idx).unwrap_or_default();

            if techstack.is_empty() && link.is_empty() {
                continue;
            }
            if link.is_empty() {
                // header is line 1, first data row is line 2
                return Err(CatalogError::MissingLink { row: i + 2 });
            }

            records.push(PortfolioRecord::new(techstack.split(','), link));
        }

        Ok(records)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog(pub Vec<PortfolioRecord>);

impl CatalogSource for StaticCatalog {
    fn load_records(&self) -> Result<Vec<PortfolioRecord>, CatalogError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("static:{} records", self.0.len())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Index
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct IndexedRecord {
    record: PortfolioRecord,
    keys: HashSet<String>,
}

/// Read-only snapshot of a catalog, built once per pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PortfolioIndex {
    entries: Vec<IndexedRecord>,
}

impl PortfolioIndex {
    pub fn from_records(records: Vec<PortfolioRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|record| IndexedRecord {
                keys: record.skills.iter().map(|s| skill_key(s)).collect(),
                record,
            })
            .collect();
        Self { entries }
    }

    pub fn from_source(source: &dyn CatalogSource) -> Result<Self, CatalogError> {
        let mut index = Self::default();
        index.load(source)?;
        Ok(index)
    }

    /// Replaces the in-memory records with a fresh load of `source`.
    /// On error the previous records are kept.
    pub fn load(&mut self, source: &dyn CatalogSource) -> Result<(), CatalogError> {
        let records = source.load_records()?;
        info!(
            "Portfolio index loaded {} records from {}",
            records.len(),
            source.describe()
        );
        *self = Self::from_records(records);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &PortfolioRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    /// Returns up to `top_k` links ranked by skill overlap.
    ///
    /// An empty `required_skills` list, or no record with any overlap, yields
    /// an empty result rather than an error.
    pub fn query_links(
        &self,
        required_skills: &[String],
        top_k: usize,
    ) -> Result<Vec<String>, MatchError> {
        if top_k == 0 {
            return Err(MatchError::InvalidTopK);
        }
        if self.entries.is_empty() {
            return Err(MatchError::EmptyCatalog);
        }

        let required: HashSet<String> = required_skills
            .iter()
            .map(|s| skill_key(s))
            .filter(|k| !k.is_empty())
            .collect();
        if required.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, &PortfolioRecord)> = self
            .entries
            .iter()
            .map(|e| (e.keys.intersection(&required).count(), &e.record))
            .filter(|(overlap, _)| *overlap > 0)
            .collect();

        // sort_by is stable: equal overlaps keep insertion order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let mut seen = HashSet::new();
        let links: Vec<String> = scored
            .into_iter()
            .filter(|&(_, record)| seen.insert(record.link.as_str()))
            .take(top_k)
            .map(|(_, record)| record.link.clone())
            .collect();

        debug!(
            "Matched {} links for {} required skills",
            links.len(),
            required.len()
        );
        Ok(links)
    }

    /// Every distinct skill in the catalog, in first-seen order.
    pub fn vocabulary(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records()
            .flat_map(|r| r.skills.iter())
            .filter(|s| seen.insert(skill_key(s)))
            .cloned()
            .collect()
    }
}

/// Comparison key for a skill: trimmed, lowercased, inner whitespace collapsed.
pub fn skill_key(skill: &str) -> String {
    skill
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
