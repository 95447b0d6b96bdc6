//! Document loaders: sitemaps, web pages, PDFs and local files.
//!
//! Loaders are lenient. A page or file that cannot be read is logged,
//! recorded in [`LoadOutcome::failed`] and skipped.

pub mod files;
pub mod pdf;
pub mod sitemap;
pub mod web;

pub use files::{load_path, ContentType};
pub use pdf::extract_pdf_text;
pub use sitemap::{extract_locs, read_sitemap};
pub use web::{extract_page, WebLoader};

use crate::types::Document;

/// Documents a loader produced, plus the sources it had to skip.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    /// `(source, reason)` for each skipped source
    pub failed: Vec<(String, String)>,
}

impl LoadOutcome {
    pub fn extend(&mut self, other: LoadOutcome) {
        self.documents.extend(other.documents);
        self.failed.extend(other.failed);
    }
}
