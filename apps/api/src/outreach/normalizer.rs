//! Text Normalizer: turns scraped page text into a single-line string that is
//! safe to embed in a model prompt.
//!
//! `normalize` never fails and never grows its input. It repeats one cleaning
//! pass until the text stops changing. After the first pass only URL removal can
//! still change the text, and that always shortens it, so the loop terminates
//! and `normalize(normalize(x)) == normalize(x)`.

use std::sync::LazyLock;

use regex::Regex;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("HTML tag pattern is valid"));

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+").expect("URL pattern is valid"));

/// Punctuation that carries meaning inside skill names and job titles
/// (C++, C#, Node.js, CI/CD, R&D, 5+ years).
const SEMANTIC_PUNCTUATION: &[char] = &['+', '#', '.', ',', ':', ';', '/', '-', '(', ')', '&', '\'', '%'];

/// Normalizes raw page text. See module docs for the guarantees.
pub fn normalize(raw: &str) -> String {
    let mut current = clean_pass(raw);
    loop {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_pass(text: &str) -> String {
    let without_tags = HTML_TAG.replace_all(text, " ");
    let without_urls = URL.replace_all(&without_tags, " ");

    let mut out = String::with_capacity(without_urls.len());
    let mut pending_space = false;
    for c in without_urls.chars() {
        if c.is_whitespace() || c.is_control() {
            pending_space = true;
        } else if c.is_alphanumeric() || SEMANTIC_PUNCTUATION.contains(&c) {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
        // anything else is dropped without breaking the current word
    }
    out
}
