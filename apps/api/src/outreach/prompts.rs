// All LLM prompt constants for the outreach pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for job extraction. Append `llm_client::prompts::JSON_ONLY_SYSTEM`.
pub const EXTRACTION_SYSTEM: &str = "You are a precise job posting extractor. \
    You read text scraped from a careers page and return the open roles it describes.";

/// Extraction prompt template. Replace `{page_text}` before sending.
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"The text below was scraped from the careers page of a website.
Extract every job posting it describes.

Return a JSON ARRAY. Each element MUST have EXACTLY these keys and no others:
[
  {
    "role": "Backend Engineer",
    "experience": "3+ years",
    "skills": ["Go", "PostgreSQL"],
    "description": "One or two sentences summarizing the role."
  }
]

RULES:
1. "role" is the job title. Never leave it empty.
2. "skills" lists required technical skills in the order they first appear in the text. Use [] only if the text names none.
3. "experience" is the required experience as written, or null if the text does not say.
4. If the page describes several distinct roles, return one element per role.
5. If the page describes no job at all, return [].

SCRAPED TEXT:
{page_text}"#;

/// System prompt for email composition. Replace `{sender_name}`, `{company_name}`,
/// `{company_pitch}`; append `llm_client::prompts::NO_PREAMBLE_INSTRUCTION`.
pub const EMAIL_SYSTEM_TEMPLATE: &str = "You are {sender_name}, a sales representative at \
    {company_name}. {company_pitch} \
    You write short, specific cold emails to hiring teams, explaining how {company_name} \
    can fill the role they are hiring for. The email must be ready to send as-is.";

/// Email prompt template. Replace `{job_json}` and `{links_section}`.
pub const EMAIL_PROMPT_TEMPLATE: &str = r#"Write a cold email to the hiring team for the job below.

JOB POSTING:
{job_json}

{links_section}

Sign the email as {sender_name}, {company_name}."#;

/// Links section when the portfolio produced matches. Replace `{link_list}`.
pub const LINKS_SECTION_TEMPLATE: &str = r#"PORTFOLIO LINKS (include EVERY link below verbatim, each exactly once, in a short paragraph showing relevant past work):
{link_list}"#;

/// Links section when nothing in the portfolio matched.
pub const NO_LINKS_SECTION: &str = "No portfolio links are available for this role. \
    Do NOT mention a portfolio and do NOT invent any links or URLs.";
