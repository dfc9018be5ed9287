// Cross-cutting prompt fragments shared by every model-backed component.
// Each component keeps its own contract strings in `outreach::prompts`.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Fragment forbidding preambles and placeholders in free-text output.
pub const NO_PREAMBLE_INSTRUCTION: &str = "Return ONLY the finished text. \
    Do NOT add a preamble such as 'Here is the email'. \
    Do NOT leave placeholders such as [Name] or <company>.";
