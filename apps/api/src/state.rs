use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, FallbackExtractor, LlmBackend};
use crate::fetch::PageFetcher;
use crate::llm_client::{self, CompletionModel, LlmClient};
use crate::outreach::composer::{EmailComposer, LlmEmailComposer, TemplateEmailComposer};
use crate::outreach::extractor::{JobExtractor, KeywordJobExtractor, LlmJobExtractor};
use crate::outreach::pipeline::Pipeline;
use crate::outreach::portfolio::CatalogSource;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Extractor/composer backends are chosen once at startup from config.
    pub pipeline: Pipeline,
    /// Each run loads its own portfolio snapshot from here.
    pub catalog: Arc<dyn CatalogSource>,
    pub fetcher: PageFetcher,
    pub config: Config,
    /// Cancelled on shutdown; every run works under a child token.
    pub shutdown: CancellationToken,
}

/// Wires extractor, fallback and composer backends from config.
///
/// `vocabulary` extends the keyword extractor's built-in skill list,
/// typically with the portfolio catalog's skills.
pub fn build_pipeline(config: &Config, vocabulary: &[String]) -> Result<Pipeline> {
    let keyword_extractor = || Arc::new(KeywordJobExtractor::with_terms(vocabulary));

    let (extractor, composer): (Arc<dyn JobExtractor>, Arc<dyn EmailComposer>) =
        match config.llm_backend {
            LlmBackend::Anthropic => {
                let api_key = config
                    .anthropic_api_key
                    .clone()
                    .context("ANTHROPIC_API_KEY is required for the anthropic backend")?;
                let model: Arc<dyn CompletionModel> =
                    Arc::new(LlmClient::new(api_key).context("Failed to build LLM client")?);
                info!("LLM client initialized (model: {})", llm_client::MODEL);
                (
                    Arc::new(LlmJobExtractor::new(model.clone(), config.max_page_chars)),
                    Arc::new(LlmEmailComposer::new(model, config.persona.clone())),
                )
            }
            LlmBackend::Offline => {
                info!("Offline backend: keyword extractor + template composer");
                (
                    keyword_extractor(),
                    Arc::new(TemplateEmailComposer::new(config.persona.clone())),
                )
            }
        };

    let mut pipeline = Pipeline::new(extractor, composer, config.pipeline.clone());
    if config.fallback_extractor == FallbackExtractor::Keyword {
        info!("Fallback extractor: keyword");
        pipeline = pipeline.with_fallback_extractor(keyword_extractor());
    }
    Ok(pipeline)
}
