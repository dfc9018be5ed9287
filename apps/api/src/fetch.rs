//! Page fetcher: downloads one job posting page and reduces it to text.
//!
//! Script and style blocks are removed here; remaining markup is left for the
//! outreach normalizer.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::info;

const USER_AGENT: &str = concat!("coldmail-api/", env!("CARGO_PKG_VERSION"));

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<!--.*?-->")
        .expect("script/style pattern is valid")
});

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid page URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to fetch {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
}

#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `url` and returns its text with scripts, styles and comments removed.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = parse_page_url(url)?;

        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(parsed).send().await.map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(http_err)?;
        info!("Fetched {} ({} bytes)", url, html.len());
        Ok(strip_non_content(&html))
    }
}

fn parse_page_url(url: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Removes `<script>`, `<style>` and comment blocks, which carry no posting text.
pub fn strip_non_content(html: &str) -> String {
    SCRIPT_OR_STYLE.replace_all(html, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_non_content_removes_scripts_styles_and_comments() {
        let html = r#"<html><head><style>.a { color: red }</style>
            <SCRIPT type="text/javascript">var jobs = [];</SCRIPT></head>
            <body><!-- nav --><h1>Data Engineer</h1></body></html>"#;
        let text = strip_non_content(html);
        assert!(!text.contains("color"));
        assert!(!text.contains("var jobs"));
        assert!(!text.contains("nav"));
        assert!(text.contains("<h1>Data Engineer</h1>"));
    }

    #[test]
    fn test_parse_page_url_accepts_http_and_https() {
        assert!(parse_page_url("https://careers.example.com/job/1").is_ok());
        assert!(parse_page_url(" http://example.com ").is_ok());
    }

    #[test]
    fn test_parse_page_url_rejects_other_schemes_and_garbage() {
        assert!(matches!(
            parse_page_url("file:///etc/passwd"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_page_url("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }
}
