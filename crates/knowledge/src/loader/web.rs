//! Fetch web pages and PDFs and extract their text.

use super::pdf::{extract_pdf_text, is_pdf};
use super::LoadOutcome;
use crate::progress::ProgressReporter;
use crate::types::{Document, SourceKind};
use askwell_core::{AppError, AppResult};
use reqwest::Client;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Elements whose text is never shown to a reader.
const HIDDEN_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "head", "template",
];

/// Page title and visible text of an HTML document.
///
/// Text nodes are trimmed and joined with newlines. When the document has no
/// `<body>`, the whole tree is walked.
pub fn extract_page(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut parts = Vec::new();
    collect_text(root, &mut parts);

    (title, parts.join("\n"))
}

fn collect_text(element: ElementRef, parts: &mut Vec<String>) {
    if HIDDEN_ELEMENTS.contains(&element.value().name()) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, parts);
                }
            }
            _ => {}
        }
    }
}

/// How a fetched body is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    Html,
    Pdf,
    Text,
    /// Kept only if the body turns out to be a PDF
    Unsupported,
}

impl PageKind {
    /// Classify by `Content-Type`, falling back to the URL path when the
    /// server sends none or a generic binary type.
    fn detect(content_type: Option<&str>, url: &str) -> Self {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());

        match mime.as_deref() {
            Some("application/pdf") | Some("application/x-pdf") => Self::Pdf,
            Some(m) if m.contains("html") => Self::Html,
            Some(m) if m.starts_with("text/") => Self::Text,
            Some("application/octet-stream") | Some("binary/octet-stream") | None
                if has_pdf_path(url) =>
            {
                Self::Pdf
            }
            None => Self::Html,
            Some(_) => Self::Unsupported,
        }
    }
}

fn has_pdf_path(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".pdf")
}

/// HTTP page loader sharing one pooled client.
#[derive(Debug, Clone)]
pub struct WebLoader {
    client: Client,
}

impl WebLoader {
    pub fn new(user_agent: &str) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AppError::Ingest(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch one page and turn it into a [`Document`].
    ///
    /// HTML is reduced to its visible text, PDFs to their page text and other
    /// `text/*` bodies are kept as they are. Any other content type is an error.
    pub async fn fetch(&self, url: &str) -> AppResult<Document> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Ingest(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Ingest(format!("Failed to fetch {}: HTTP {}", url, status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let kind = PageKind::detect(content_type.as_deref(), url);

        let document = match kind {
            PageKind::Html | PageKind::Text => {
                let body = response.text().await.map_err(|e| {
                    AppError::Ingest(format!("Failed to read body of {}: {}", url, e))
                })?;
                if kind == PageKind::Text {
                    Document::new(url, SourceKind::Web, body)
                } else {
                    let (title, text) = extract_page(&body);
                    let document = Document::new(url, SourceKind::Web, text);
                    match title {
                        Some(title) => document.with_title(title),
                        None => document,
                    }
                }
            }
            PageKind::Pdf | PageKind::Unsupported => {
                let bytes = response.bytes().await.map_err(|e| {
                    AppError::Ingest(format!("Failed to read body of {}: {}", url, e))
                })?;
                if kind == PageKind::Unsupported && !is_pdf(&bytes) {
                    return Err(AppError::Ingest(format!(
                        "Unsupported content type {} for {}",
                        content_type.as_deref().unwrap_or("(none)"),
                        url
                    )));
                }

                let source = url.to_string();
                let text = tokio::task::spawn_blocking(move || {
                    extract_pdf_text(&bytes, &source)
                })
                .await
                .map_err(|e| AppError::Ingest(format!("PDF extraction task failed: {}", e)))??;
                Document::new(url, SourceKind::Web, text)
            }
        };

        if document.text.trim().is_empty() {
            return Err(AppError::Ingest(format!("No text extracted from {}", url)));
        }

        Ok(document)
    }

    /// Fetch every URL in order, one at a time, skipping failures.
    pub async fn load_all(&self, urls: &[String], progress: &ProgressReporter) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        let total = urls.len() as u64;

        for (i, url) in urls.iter().enumerate() {
            match self.fetch(url).await {
                Ok(document) => {
                    tracing::debug!(url = %url, bytes = document.text.len(), "Loaded page");
                    outcome.documents.push(document);
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Skipping page");
                    outcome.failed.push((url.clone(), e.to_string()));
                }
            }
            progress.load(i as u64 + 1, Some(total), url);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::pdf::sample_pdf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response on a local port and return the URL to fetch.
    async fn serve_once(path: &str, content_type: &str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
             Connection: close\r\n\r\n",
            content_type,
            body.len()
        );

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            socket.write_all(header.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}{}", addr, path)
    }

    #[test]
    fn test_page_kind_detection() {
        let url = "https://docs.example.com/page";
        assert_eq!(PageKind::detect(Some("text/html; charset=utf-8"), url), PageKind::Html);
        assert_eq!(PageKind::detect(Some("application/pdf"), url), PageKind::Pdf);
        assert_eq!(PageKind::detect(Some("text/plain"), url), PageKind::Text);
        assert_eq!(PageKind::detect(None, url), PageKind::Html);
        assert_eq!(PageKind::detect(Some("image/png"), url), PageKind::Unsupported);
        assert_eq!(
            PageKind::detect(Some("application/octet-stream"), url),
            PageKind::Unsupported
        );
        assert_eq!(
            PageKind::detect(
                Some("application/octet-stream"),
                "https://a.example.com/x.PDF?v=2"
            ),
            PageKind::Pdf
        );
        assert_eq!(PageKind::detect(None, "https://a.example.com/paper.pdf"), PageKind::Pdf);
    }

    #[tokio::test]
    async fn test_fetch_pdf_extracts_text() {
        let url = serve_once("/paper.pdf", "application/pdf", sample_pdf("Security pillar")).await;
        let loader = WebLoader::new("askwell-test").unwrap();

        let doc = loader.fetch(&url).await.unwrap();
        assert!(doc.text.contains("Security"), "got: {:?}", doc.text);
        assert!(!doc.text.contains('\u{FFFD}'));
        assert_eq!(doc.source, url);
    }

    #[tokio::test]
    async fn test_fetch_sniffs_pdf_behind_generic_type() {
        let url = serve_once("/download", "application/octet-stream", sample_pdf("Cost pillar"))
            .await;
        let loader = WebLoader::new("askwell-test").unwrap();

        let doc = loader.fetch(&url).await.unwrap();
        assert!(doc.text.contains("Cost"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_binary_content() {
        let url = serve_once("/logo.png", "image/png", vec![0x89, b'P', b'N', b'G', 0, 1, 2]).await;
        let loader = WebLoader::new("askwell-test").unwrap();

        let err = loader.fetch(&url).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported content type image/png"));
    }

    #[test]
    fn test_extract_page_skips_hidden_content() {
        let html = r#"<html>
            <head><title> Security Pillar </title><style>p { color: red; }</style></head>
            <body>
              <h1>Security</h1>
              <script>window.track = function() {};</script>
              <p>Apply security at <b>all layers</b>.</p>
              <noscript>Enable JavaScript</noscript>
            </body></html>"#;

        let (title, text) = extract_page(html);
        assert_eq!(title.as_deref(), Some("Security Pillar"));
        assert_eq!(text, "Security\nApply security at\nall layers\n.");
        assert!(!text.contains("window.track"));
        assert!(!text.contains("Enable JavaScript"));
    }

    #[test]
    fn test_extract_page_without_title() {
        let (title, text) = extract_page("<p>Just a fragment</p>");
        assert!(title.is_none());
        assert_eq!(text, "Just a fragment");
    }

    #[tokio::test]
    async fn test_load_all_skips_unreachable_pages() {
        let loader = WebLoader::new("askwell-test").unwrap();
        let urls = vec!["http://127.0.0.1:9/unreachable".to_string()];

        let outcome = loader.load_all(&urls, &ProgressReporter::noop()).await;
        assert!(outcome.documents.is_empty());
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, urls[0]);
    }
}
