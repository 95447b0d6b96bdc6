//! Sitemap URL extraction.

use askwell_core::{AppError, AppResult};
use regex::Regex;
use reqwest::Client;
use std::path::Path;

/// Every `<loc>` value in a sitemap document, in document order.
///
/// Namespace prefixes, CDATA sections and the five XML entities are
/// handled; duplicates are kept out.
pub fn extract_locs(xml: &str) -> AppResult<Vec<String>> {
    let re = Regex::new(r"(?s)<(?:[\w-]+:)?loc>\s*(.*?)\s*</(?:[\w-]+:)?loc>")
        .map_err(|e| AppError::Other(format!("Invalid sitemap pattern: {}", e)))?;

    let mut urls: Vec<String> = Vec::new();
    for cap in re.captures_iter(xml) {
        let raw = cap[1].trim();
        let raw = raw
            .strip_prefix("<![CDATA[")
            .and_then(|s| s.strip_suffix("]]>"))
            .unwrap_or(raw)
            .trim();
        let url = unescape(raw);
        if !url.is_empty() && !urls.contains(&url) {
            urls.push(url);
        }
    }
    Ok(urls)
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Read a sitemap from a local file or an `http(s)` URL and list its URLs.
pub async fn read_sitemap(location: &str, client: &Client) -> AppResult<Vec<String>> {
    let xml = if location.starts_with("http://") || location.starts_with("https://") {
        let response = client
            .get(location)
            .send()
            .await
            .map_err(|e| AppError::Ingest(format!("Failed to fetch sitemap {}: {}", location, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Ingest(format!(
                "Failed to fetch sitemap {}: HTTP {}",
                location, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::Ingest(format!("Failed to read sitemap {}: {}", location, e)))?
    } else {
        std::fs::read_to_string(Path::new(location))
            .map_err(|e| AppError::Ingest(format!("Failed to read sitemap {}: {}", location, e)))?
    };

    let urls = extract_locs(&xml)?;
    tracing::info!("Found {} URLs in sitemap {}", urls.len(), location);
    Ok(urls)
}
