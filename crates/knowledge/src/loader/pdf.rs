//! PDF text extraction.

use askwell_core::{AppError, AppResult};
use std::panic::{self, AssertUnwindSafe};

/// Does `bytes` start with the PDF file signature?
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Extract the text of every page, blank lines removed.
///
/// `source` only names the document in error messages.
pub fn extract_pdf_text(bytes: &[u8], source: &str) -> AppResult<String> {
    if !is_pdf(bytes) {
        return Err(AppError::Ingest(format!("{} is not a PDF", source)));
    }

    // pdf-extract panics on some malformed files instead of returning an error.
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }))
    .map_err(|_| AppError::Ingest(format!("Failed to parse PDF {}", source)))?
    .map_err(|e| {
        AppError::Ingest(format!("Failed to extract text from PDF {}: {}", source, e))
    })?;

    let text = extracted
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        return Err(AppError::Ingest(format!(
            "No text extracted from PDF {}",
            source
        )));
    }

    tracing::debug!(source = %source, chars = text.len(), "Extracted PDF text");
    Ok(text)
}

/// A single-page PDF showing `line` in Helvetica.
#[cfg(test)]
pub(crate) fn sample_pdf(line: &str) -> Vec<u8> {
    let content = format!("BT /F1 18 Tf 72 720 Td ({}) Tj ET", line);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}
