use anyhow::{bail, Context, Result};

use crate::outreach::composer::Persona;
use crate::outreach::extractor::DEFAULT_MAX_PAGE_CHARS;
use crate::outreach::pipeline::PipelineOptions;
use crate::outreach::portfolio::DEFAULT_TOP_K;

/// Which implementations back the extractor and composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    /// LlmJobExtractor + LlmEmailComposer over the Anthropic API.
    Anthropic,
    /// KeywordJobExtractor + TemplateEmailComposer, no model calls.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackExtractor {
    None,
    Keyword,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_backend: LlmBackend,
    pub anthropic_api_key: Option<String>,
    pub fallback_extractor: FallbackExtractor,
    pub portfolio_csv: String,
    pub pipeline: PipelineOptions,
    pub max_page_chars: usize,
    pub fetch_timeout_secs: u64,
    pub persona: Persona,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm_backend = match var("LLM_BACKEND").as_deref().map(str::trim) {
            None | Some("anthropic") => LlmBackend::Anthropic,
            Some("offline") => LlmBackend::Offline,
            Some(other) => bail!("LLM_BACKEND must be 'anthropic' or 'offline', got '{other}'"),
        };

        let anthropic_api_key = var("ANTHROPIC_API_KEY");
        if llm_backend == LlmBackend::Anthropic && anthropic_api_key.is_none() {
            bail!("Required environment variable 'ANTHROPIC_API_KEY' is not set (or set LLM_BACKEND=offline)");
        }

        let fallback_extractor = match var("FALLBACK_EXTRACTOR").as_deref().map(str::trim) {
            None | Some("none") => FallbackExtractor::None,
            Some("keyword") => FallbackExtractor::Keyword,
            Some(other) => bail!("FALLBACK_EXTRACTOR must be 'none' or 'keyword', got '{other}'"),
        };

        let top_k = parse_or(&var, "TOP_K", DEFAULT_TOP_K)?;
        if top_k == 0 {
            bail!("TOP_K must be at least 1");
        }
        let max_jobs_per_run = match var("MAX_JOBS_PER_RUN") {
            Some(raw) => {
                let cap: usize = raw
                    .trim()
                    .parse()
                    .context("MAX_JOBS_PER_RUN must be a positive integer")?;
                if cap == 0 {
                    bail!("MAX_JOBS_PER_RUN must be at least 1");
                }
                Some(cap)
            }
            None => None,
        };
        let job_concurrency = parse_or(&var, "JOB_CONCURRENCY", 1)?;
        if job_concurrency == 0 {
            bail!("JOB_CONCURRENCY must be at least 1");
        }

        let defaults = Persona::default();
        let persona = Persona {
            sender_name: var("SENDER_NAME").unwrap_or(defaults.sender_name),
            company_name: var("COMPANY_NAME").unwrap_or(defaults.company_name),
            company_pitch: var("COMPANY_PITCH").unwrap_or(defaults.company_pitch),
        };

        Ok(Config {
            llm_backend,
            anthropic_api_key,
            fallback_extractor,
            portfolio_csv: var("PORTFOLIO_CSV").unwrap_or_else(|| "data/portfolio.csv".to_string()),
            pipeline: PipelineOptions {
                top_k,
                max_jobs_per_run,
                job_concurrency,
            },
            max_page_chars: parse_or(&var, "MAX_PAGE_CHARS", DEFAULT_MAX_PAGE_CHARS)?,
            fetch_timeout_secs: parse_or(&var, "FETCH_TIMEOUT_SECS", 30)?,
            persona,
            port: parse_or(&var, "PORT", 8080)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_api_key() {
        let config = config_from(&[("ANTHROPIC_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.llm_backend, LlmBackend::Anthropic);
        assert_eq!(config.fallback_extractor, FallbackExtractor::None);
        assert_eq!(config.pipeline, PipelineOptions::default());
        assert_eq!(config.pipeline.top_k, 2);
        assert_eq!(config.portfolio_csv, "data/portfolio.csv");
        assert_eq!(config.max_page_chars, DEFAULT_MAX_PAGE_CHARS);
        assert_eq!(config.port, 8080);
        assert_eq!(config.persona, Persona::default());
    }

    #[test]
    fn test_anthropic_backend_requires_key() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_offline_backend_needs_no_key() {
        let config = config_from(&[("LLM_BACKEND", "offline")]).unwrap();
        assert_eq!(config.llm_backend, LlmBackend::Offline);
        assert!(config.anthropic_api_key.is_none());
    }

    #[test]
    fn test_pipeline_options_are_read() {
        let config = config_from(&[
            ("LLM_BACKEND", "offline"),
            ("TOP_K", "3"),
            ("MAX_JOBS_PER_RUN", "5"),
            ("JOB_CONCURRENCY", "4"),
            ("FALLBACK_EXTRACTOR", "keyword"),
        ])
        .unwrap();
        assert_eq!(
            config.pipeline,
            PipelineOptions {
                top_k: 3,
                max_jobs_per_run: Some(5),
                job_concurrency: 4,
            }
        );
        assert_eq!(config.fallback_extractor, FallbackExtractor::Keyword);
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        let err = config_from(&[("LLM_BACKEND", "offline"), ("TOP_K", "0")]).unwrap_err();
        assert!(err.to_string().contains("TOP_K"));
    }

    #[test]
    fn test_zero_job_cap_is_rejected() {
        assert!(config_from(&[("LLM_BACKEND", "offline"), ("MAX_JOBS_PER_RUN", "0")]).is_err());
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        let err = config_from(&[("LLM_BACKEND", "offline"), ("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(config_from(&[("LLM_BACKEND", "openai")]).is_err());
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("LLM_BACKEND", "offline"),
            ("TOP_K", "  "),
            ("SENDER_NAME", ""),
        ])
        .unwrap();
        assert_eq!(config.pipeline.top_k, 2);
        assert_eq!(config.persona.sender_name, Persona::default().sender_name);
    }

    #[test]
    fn test_persona_overrides() {
        let config = config_from(&[
            ("LLM_BACKEND", "offline"),
            ("SENDER_NAME", "Priya"),
            ("COMPANY_NAME", "Acme Labs"),
        ])
        .unwrap();
        assert_eq!(config.persona.sender_name, "Priya");
        assert_eq!(config.persona.company_name, "Acme Labs");
    }
}
