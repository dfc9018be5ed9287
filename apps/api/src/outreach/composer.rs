//! Email Composer: writes one cold email for one job posting and its matched
//! portfolio links.
//!
//! `LlmEmailComposer` writes under the persona contract in `outreach::prompts`.
//! `TemplateEmailComposer` is deterministic and needs no model.
//! Both must include every supplied link, and neither may invent links when
//! none are supplied.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::llm_client::prompts::NO_PREAMBLE_INSTRUCTION;
use crate::llm_client::{CompletionModel, LlmError};
use crate::outreach::extractor::JobPosting;
use crate::outreach::prompts::{
    EMAIL_PROMPT_TEMPLATE, EMAIL_SYSTEM_TEMPLATE, LINKS_SECTION_TEMPLATE, NO_LINKS_SECTION,
};

/// Who the emails are written as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub sender_name: String,
    pub company_name: String,
    pub company_pitch: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            sender_name: "Alex Morgan".to_string(),
            company_name: "Northwind Software".to_string(),
            company_pitch: "Northwind Software is a software consultancy that builds and \
                operates custom web, data and AI systems for its clients."
                .to_string(),
        }
    }
}

/// A finished email for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedEmail {
    pub job_role: String,
    pub body: String,
    pub links: Vec<String>,
}

#[derive(Debug, Error)]
pub enum EmailGenerationError {
    #[error("email model call failed")]
    Transport(#[source] LlmError),

    #[error("model returned an empty email body")]
    EmptyBody,

    #[error("email body omitted required portfolio links: {}", missing.join(", "))]
    MissingLinks { missing: Vec<String> },
}

#[async_trait]
pub trait EmailComposer: Send + Sync {
    /// Returns the email body for `job`, mentioning every entry of `links`.
    async fn compose(
        &self,
        job: &JobPosting,
        links: &[String],
    ) -> Result<String, EmailGenerationError>;

    /// "llm" | "template"
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmEmailComposer
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmEmailComposer {
    model: Arc<dyn CompletionModel>,
    persona: Persona,
}

impl LlmEmailComposer {
    pub fn new(model: Arc<dyn CompletionModel>, persona: Persona) -> Self {
        Self { model, persona }
    }

    fn build_system(&self) -> String {
        let system = self.fill_persona(EMAIL_SYSTEM_TEMPLATE);
        format!("{system} {NO_PREAMBLE_INSTRUCTION}")
    }

    fn build_prompt(&self, job: &JobPosting, links: &[String]) -> String {
        // JobPosting holds only strings; serialization cannot fail
        let job_json = serde_json::to_string_pretty(job).unwrap_or_else(|_| job.role.clone());

        let links_section = if links.is_empty() {
            NO_LINKS_SECTION.to_string()
        } else {
            let link_list = links
                .iter()
                .map(|l| format!("- {l}"))
                .collect::<Vec<_>>()
                .join("\n");
            LINKS_SECTION_TEMPLATE.replace("{link_list}", &link_list)
        };

        self.fill_persona(
            &EMAIL_PROMPT_TEMPLATE
                .replace("{job_json}", &job_json)
                .replace("{links_section}", &links_section),
        )
    }

    fn fill_persona(&self, template: &str) -> String {
        template
            .replace("{sender_name}", &self.persona.sender_name)
            .replace("{company_name}", &self.persona.company_name)
            .replace("{company_pitch}", &self.persona.company_pitch)
    }
}

#[async_trait]
impl EmailComposer for LlmEmailComposer {
    async fn compose(
        &self,
        job: &JobPosting,
        links: &[String],
    ) -> Result<String, EmailGenerationError> {
        let raw = self
            .model
            .complete(&self.build_system(), &self.build_prompt(job, links))
            .await
            .map_err(EmailGenerationError::Transport)?;

        let body = clean_body(&raw);
        check_body(&body, links)?;

        debug!("Composed {}-char email for '{}'", body.len(), job.role);
        Ok(body)
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

/// Trims whitespace and a wrapping code fence, if the model added one.
fn clean_body(raw: &str) -> String {
    let text = raw.trim();
    let text = match text.strip_prefix("```") {
        Some(rest) => {
            // drop an optional language tag on the fence line
            let rest = rest.split_once('\n').map_or("", |(_, body)| body);
            rest.trim_end().strip_suffix("```").unwrap_or(rest)
        }
        None => text,
    };
    text.trim().to_string()
}

/// Post-conditions shared by every backend.
fn check_body(body: &str, links: &[String]) -> Result<(), EmailGenerationError> {
    if body.is_empty() {
        return Err(EmailGenerationError::EmptyBody);
    }
    let missing: Vec<String> = links
        .iter()
        .filter(|l| !body.contains(l.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(EmailGenerationError::MissingLinks { missing });
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// TemplateEmailComposer (deterministic fallback)
// ────────────────────────────────────────────────────────────────────────────

pub struct TemplateEmailComposer {
    persona: Persona,
}

impl TemplateEmailComposer {
    pub fn new(persona: Persona) -> Self {
        Self { persona }
    }

    fn render(&self, job: &JobPosting, links: &[String]) -> String {
        let Persona {
            sender_name,
            company_name,
            company_pitch,
        } = &self.persona;

        let mut body = format!(
            "Subject: {company_name} for your {role} opening\n\n\
             Hello Hiring Team,\n\n\
             I noticed you are hiring a {role}. {company_pitch}",
            role = job.role,
        );

        if !job.skills.is_empty() {
            body.push_str(&format!(
                " Our engineers work with {} every day and can start contributing quickly.",
                job.skills.join(", ")
            ));
        }

        if !links.is_empty() {
            body.push_str("\n\nA few projects that show relevant work:\n");
            for link in links {
                body.push_str(&format!("- {link}\n"));
            }
        } else {
            body.push('\n');
        }

        body.push_str(&format!(
            "\nWould you be open to a short call this week?\n\nBest regards,\n{sender_name}\n{company_name}"
        ));
        body
    }
}

#[async_trait]
impl EmailComposer for TemplateEmailComposer {
    async fn compose(
        &self,
        job: &JobPosting,
        links: &[String],
    ) -> Result<String, EmailGenerationError> {
        let body = self.render(job, links);
        check_body(&body, links)?;
        Ok(body)
    }

    fn backend(&self) -> &'static str {
        "template"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records system/prompt pairs and answers with a fixed body.
    struct RecordingModel {
        answer: String,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingModel {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionModel for RecordingModel {
        async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            Ok(self.answer.clone())
        }
    }

    struct DownModel;

    #[async_trait]
    impl CompletionModel for DownModel {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::RateLimited { retries: 3 })
        }
    }

    fn backend_job() -> JobPosting {
        JobPosting {
            role: "Backend Engineer".to_string(),
            experience: Some("3+ years".to_string()),
            skills: vec!["Go".to_string(), "PostgreSQL".to_string()],
            description: "Build and run payment APIs.".to_string(),
        }
    }

    fn links(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_prompt_carries_persona_job_and_links() {
        let model = RecordingModel::new("Hi team, see https://ex.com/go-proj. Regards, Alex");
        let composer = LlmEmailComposer::new(model.clone(), Persona::default());

        let body = composer
            .compose(&backend_job(), &links(&["https://ex.com/go-proj"]))
            .await
            .unwrap();
        assert!(body.contains("https://ex.com/go-proj"));

        let calls = model.calls.lock().unwrap();
        let (system, prompt) = &calls[0];
        assert!(system.contains("Alex Morgan"));
        assert!(system.contains("Northwind Software"));
        assert!(system.contains("preamble"));
        assert!(prompt.contains("\"role\": \"Backend Engineer\""));
        assert!(prompt.contains("- https://ex.com/go-proj"));
        assert!(prompt.contains("Sign the email as Alex Morgan, Northwind Software."));
        assert!(!prompt.contains("{links_section}"));
    }

    #[tokio::test]
    async fn test_prompt_without_links_forbids_inventing_them() {
        let model = RecordingModel::new("Hi team, we can help. Regards, Alex");
        let composer = LlmEmailComposer::new(model.clone(), Persona::default());

        composer.compose(&backend_job(), &[]).await.unwrap();

        let calls = model.calls.lock().unwrap();
        assert!(calls[0].1.contains("do NOT invent any links"));
        assert!(!calls[0].1.contains("PORTFOLIO LINKS"));
    }

    #[tokio::test]
    async fn test_missing_link_is_rejected() {
        let model = RecordingModel::new("Hi team, see https://ex.com/a only.");
        let composer = LlmEmailComposer::new(model, Persona::default());

        let err = composer
            .compose(&backend_job(), &links(&["https://ex.com/a", "https://ex.com/b"]))
            .await
            .unwrap_err();

        match err {
            EmailGenerationError::MissingLinks { missing } => {
                assert_eq!(missing, vec!["https://ex.com/b"]);
            }
            other => panic!("expected MissingLinks, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_answer_is_empty_body() {
        let composer = LlmEmailComposer::new(RecordingModel::new("  \n "), Persona::default());
        let err = composer.compose(&backend_job(), &[]).await.unwrap_err();
        assert!(matches!(err, EmailGenerationError::EmptyBody));
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let composer = LlmEmailComposer::new(Arc::new(DownModel), Persona::default());
        let err = composer.compose(&backend_job(), &[]).await.unwrap_err();
        assert!(matches!(err, EmailGenerationError::Transport(_)));
    }

    #[test]
    fn test_clean_body_strips_fences() {
        assert_eq!(clean_body("```text\nHello\n```"), "Hello");
        assert_eq!(clean_body("```\nHello\n```\n"), "Hello");
        assert_eq!(clean_body("  Hello  "), "Hello");
    }

    #[tokio::test]
    async fn test_template_includes_every_link() {
        let composer = TemplateEmailComposer::new(Persona::default());
        let all = links(&["https://ex.com/go-proj", "https://ex.com/go-pg"]);

        let body = composer.compose(&backend_job(), &all).await.unwrap();

        assert!(body.contains("Backend Engineer"));
        assert!(body.contains("Go, PostgreSQL"));
        for link in &all {
            assert!(body.contains(link.as_str()));
        }
    }

    #[tokio::test]
    async fn test_template_without_links_has_no_portfolio_paragraph() {
        let composer = TemplateEmailComposer::new(Persona::default());
        let body = composer.compose(&backend_job(), &[]).await.unwrap();

        assert!(!body.contains("projects that show"));
        assert!(!body.contains("http"));
        assert!(body.ends_with("Northwind Software"));
    }
}
