// Outreach pipeline: job posting page → structured postings → matched
// portfolio links → one cold email per posting.
// Model calls go through llm_client::CompletionModel only.

pub mod composer;
pub mod extractor;
pub mod handlers;
pub mod normalizer;
pub mod pipeline;
pub mod portfolio;
pub mod prompts;
