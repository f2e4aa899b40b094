// src/services/extractor.rs

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{
    config::{MAX_CONTENT_CHARS, MIN_PARAGRAPH_CHARS},
    utils::text::{collapse_whitespace, truncate_chars},
};

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article").unwrap());
static MAIN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("main, [role=main]").unwrap());
static PARAGRAPHS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p, blockquote, pre").unwrap());

const HIDDEN_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

/// Where quiz content comes from.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// Free-form topic text, embedded in the prompt as-is.
    Topic(String),
    /// An `http(s)://` page to fetch.
    Url(String),
    /// An uploaded document; the file name decides how it is decoded.
    Document { file_name: String, bytes: Vec<u8> },
}

impl ContentSource {
    /// Short description of the source, stored as the quiz subject.
    pub fn descriptor(&self) -> String {
        match self {
            ContentSource::Topic(topic) => truncate_chars(topic.trim(), 200).to_string(),
            ContentSource::Url(url) => url.clone(),
            ContentSource::Document { file_name, .. } => file_name.clone(),
        }
    }
}

/// Document decoders, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Html,
    PlainText,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> Self {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => DocumentKind::Pdf,
            "html" | "htm" | "xhtml" => DocumentKind::Html,
            _ => DocumentKind::PlainText,
        }
    }
}

#[derive(Debug)]
pub enum ExtractionError {
    /// The source is not something we can read, e.g. a non-http(s) URL.
    InvalidSource(String),
    /// Fetching failed: network error, timeout or a non-success status.
    Unreachable(String),
    /// The document could not be decoded.
    Decode(String),
    /// Extraction succeeded but produced no text.
    NoContent,
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::InvalidSource(msg) => write!(f, "invalid source: {}", msg),
            ExtractionError::Unreachable(msg) => write!(f, "source unreachable: {}", msg),
            ExtractionError::Decode(msg) => write!(f, "could not decode document: {}", msg),
            ExtractionError::NoContent => write!(f, "no readable content found"),
        }
    }
}

impl std::error::Error for ExtractionError {}

/// Normalizes any `ContentSource` into bounded plain text.
#[derive(Clone)]
pub struct ContentExtractor {
    client: reqwest::Client,
}

impl ContentExtractor {
    pub fn new(fetch_timeout: Duration) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .user_agent("Mozilla/5.0 (compatible; quizgen/0.1)")
            .build()
            .map_err(|e| ExtractionError::Unreachable(e.to_string()))?;
        Ok(Self { client })
    }

    /// Extracts at most `MAX_CONTENT_CHARS` characters of text from the source.
    /// An empty result is reported as `NoContent`, never returned.
    pub async fn extract(&self, source: &ContentSource) -> Result<String, ExtractionError> {
        let text = match source {
            ContentSource::Topic(topic) => topic.clone(),
            ContentSource::Url(raw) => {
                let url = parse_source_url(raw)?;
                let html = self.fetch_page(url).await?;
                extract_page_text(&html)
            }
            ContentSource::Document { file_name, bytes } => {
                extract_document_text(DocumentKind::from_file_name(file_name), bytes)?
                    .trim()
                    .to_string()
            }
        };

        bounded(text)
    }

    async fn fetch_page(&self, url: Url) -> Result<String, ExtractionError> {
        tracing::info!(%url, "Fetching page content");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%url, error = %e, "Page fetch failed");
                ExtractionError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Unreachable(format!("{} returned {}", url, status)));
        }

        response
            .text()
            .await
            .map_err(|e| ExtractionError::Unreachable(e.to_string()))
    }
}

/// Accepts only absolute `http://` or `https://` URLs.
pub fn parse_source_url(raw: &str) -> Result<Url, ExtractionError> {
    let url = Url::parse(raw.trim()).map_err(|e| ExtractionError::InvalidSource(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ExtractionError::InvalidSource(format!(
            "unsupported URL scheme '{}'",
            other
        ))),
    }
}

/// Pulls readable text out of an HTML page.
///
/// The title and first heading come first, then the article blocks, else the
/// main blocks, else every paragraph-like block of at least
/// `MIN_PARAGRAPH_CHARS` characters.
pub fn extract_page_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut parts: Vec<String> = Vec::new();
    for selector in [&*TITLE, &*HEADING] {
        if let Some(el) = document.select(selector).next() {
            let text = visible_text(el);
            if !text.is_empty() && !parts.contains(&text) {
                parts.push(text);
            }
        }
    }

    let body = [&*ARTICLE, &*MAIN]
        .into_iter()
        .map(|selector| join_blocks(document.select(selector).map(visible_text)))
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| {
            join_blocks(
                document
                    .select(&PARAGRAPHS)
                    .map(visible_text)
                    .filter(|text| text.chars().count() >= MIN_PARAGRAPH_CHARS),
            )
        });

    if !body.is_empty() {
        parts.push(body);
    }
    parts.join("\n\n")
}

/// Decodes an uploaded document into text.
pub fn extract_document_text(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractionError> {
    match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractionError::Decode(e.to_string())),
        DocumentKind::Html => {
            let html = std::str::from_utf8(bytes).map_err(|e| ExtractionError::Decode(e.to_string()))?;
            Ok(extract_page_text(html))
        }
        DocumentKind::PlainText => String::from_utf8(bytes.to_vec())
            .map_err(|_| ExtractionError::Decode("document is not UTF-8 text".to_string())),
    }
}

/// Blank text is `NoContent`; anything else is cut to `MAX_CONTENT_CHARS`.
fn bounded(text: String) -> Result<String, ExtractionError> {
    if text.trim().is_empty() {
        return Err(ExtractionError::NoContent);
    }
    Ok(truncate_chars(&text, MAX_CONTENT_CHARS).to_string())
}

fn join_blocks(blocks: impl Iterator<Item = String>) -> String {
    blocks.filter(|b| !b.is_empty()).collect::<Vec<_>>().join("\n")
}

/// Text of an element, skipping script-like subtrees, with whitespace collapsed.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
        });
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }
    collapse_whitespace(&raw)
}
