//! Load local files and directories.

use super::{pdf::extract_pdf_text, web::extract_page, LoadOutcome};
use crate::progress::ProgressReporter;
use crate::types::{Document, SourceKind};
use askwell_core::{AppError, AppResult};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    Pdf,
    Code,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("pdf") => Self::Pdf,
            Some("rs") | Some("py") | Some("js") | Some("ts") | Some("go") | Some("java")
            | Some("sh") | Some("yaml") | Some("yml") | Some("json") | Some("toml") => Self::Code,
            Some("txt") | Some("rst") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Code => "code",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Read one file into a [`Document`].
///
/// Markdown loses heading markers, rules and fences; HTML is reduced to its
/// visible text; PDFs are reduced to their page text. Other files that are
/// not UTF-8 or contain NUL bytes are rejected.
pub fn load_file(path: &Path) -> AppResult<Document> {
    let bytes = fs::read(path)
        .map_err(|e| AppError::Ingest(format!("Failed to read {}: {}", path.display(), e)))?;
    let source = path.display().to_string();

    let document = match ContentType::from_path(path) {
        ContentType::Pdf => {
            let text = extract_pdf_text(&bytes, &source)?;
            Document::new(source, SourceKind::File, text)
        }
        ContentType::Markdown => {
            let raw = decode_text(path, bytes)?;
            Document::new(source, SourceKind::File, clean_markdown(&raw))
        }
        ContentType::Html => {
            let (title, text) = extract_page(&decode_text(path, bytes)?);
            let document = Document::new(source, SourceKind::File, text);
            match title {
                Some(title) => document.with_title(title),
                None => document,
            }
        }
        ContentType::Code | ContentType::PlainText | ContentType::Unknown => {
            Document::new(source, SourceKind::File, decode_text(path, bytes)?)
        }
    };

    Ok(document)
}

fn decode_text(path: &Path, bytes: Vec<u8>) -> AppResult<String> {
    let raw = String::from_utf8(bytes)
        .map_err(|_| AppError::Ingest(format!("{} is not UTF-8 text", path.display())))?;
    if raw.contains('\0') {
        return Err(AppError::Ingest(format!("{} looks binary", path.display())));
    }
    Ok(raw)
}

/// Load a file, or every file under a directory.
///
/// Hidden entries (names starting with `.`) are not descended into.
pub fn load_path(path: &Path, progress: &ProgressReporter) -> AppResult<LoadOutcome> {
    if !path.exists() {
        return Err(AppError::Ingest(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }

    let mut outcome = LoadOutcome::default();

    let mut files = Vec::new();
    let walker = WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                let source = e
                    .path()
                    .unwrap_or(path)
                    .display()
                    .to_string();
                tracing::warn!(path = %source, error = %e, "Skipping unreadable entry");
                outcome.failed.push((source, e.to_string()));
            }
        }
    }

    let total = files.len() as u64;
    for (i, file) in files.iter().enumerate() {
        let source = file.display().to_string();
        match load_file(file) {
            Ok(document) if document.text.trim().is_empty() => {
                tracing::debug!("Skipping empty file {}", source);
            }
            Ok(document) => outcome.documents.push(document),
            Err(e) => {
                tracing::warn!(file = %source, error = %e, "Skipping file");
                outcome.failed.push((source.clone(), e.to_string()));
            }
        }
        progress.load(i as u64 + 1, Some(total), &source);
    }

    Ok(outcome)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            ContentType::from_path(Path::new("pillars.MD")),
            ContentType::Markdown
        );
        assert_eq!(
            ContentType::from_path(Path::new("page.htm")),
            ContentType::Html
        );
        assert_eq!(
            ContentType::from_path(Path::new("stack.yaml")),
            ContentType::Code
        );
        assert_eq!(
            ContentType::from_path(Path::new("whitepaper.PDF")),
            ContentType::Pdf
        );
        assert_eq!(
            ContentType::from_path(Path::new("README")),
            ContentType::Unknown
        );
    }

    #[test]
    fn test_load_pdf_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("framework.pdf");
        fs::write(&path, crate::loader::pdf::sample_pdf("Operational excellence")).unwrap();

        let doc = load_file(&path).unwrap();
        assert!(doc.text.contains("Operational"), "got: {:?}", doc.text);
        assert!(!doc.text.contains('\u{FFFD}'));
        assert_eq!(doc.kind, SourceKind::File);
    }

    #[test]
    fn test_directory_with_pdf_and_broken_pdf() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("a-paper.pdf"),
            crate::loader::pdf::sample_pdf("Sustainability pillar"),
        )
        .unwrap();
        fs::write(temp.path().join("b-broken.pdf"), b"%PDF-1.4 truncated").unwrap();
        fs::write(temp.path().join("c-notes.txt"), "Plain notes").unwrap();

        let outcome = load_path(temp.path(), &ProgressReporter::noop()).unwrap();
        assert_eq!(outcome.documents.len(), 2);
        assert!(outcome.documents[0].text.contains("Sustainability"));
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.failed[0].0.ends_with("b-broken.pdf"));
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSome text\n\n```rust\ncode\n```\n\nMore text";
        let output = clean_markdown(input);
        assert!(output.starts_with("Header\n"));
        assert!(output.contains("Some text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_load_html_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("page.html");
        fs::write(
            &path,
            "<html><head><title>Ops</title></head><body><p>Run books</p></body></html>",
        )
        .unwrap();

        let doc = load_file(&path).unwrap();
        assert_eq!(doc.text, "Run books");
        assert_eq!(doc.title.as_deref(), Some("Ops"));
        assert_eq!(doc.kind, SourceKind::File);
    }

    #[test]
    fn test_binary_file_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob.bin");
        fs::write(&path, [0u8, 159, 146, 150]).unwrap();
        assert!(matches!(load_file(&path), Err(AppError::Ingest(_))));
    }

    #[test]
    fn test_load_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.md"), "# Cost\nTag resources").unwrap();
        fs::write(temp.path().join("a.txt"), "Plain notes").unwrap();
        fs::write(temp.path().join("empty.txt"), "  ").unwrap();
        fs::write(temp.path().join("bad.dat"), [0u8, 255]).unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git").join("HEAD"), "ref: main").unwrap();

        let outcome = load_path(temp.path(), &ProgressReporter::noop()).unwrap();
        let names: Vec<String> = outcome
            .documents
            .iter()
            .map(|d| {
                Path::new(&d.source)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);
        assert_eq!(outcome.failed.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_recorded_as_failed() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("readme.md"), "# Ops\nRun books").unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("secret.txt"), "hidden").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still list the directory.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let outcome = load_path(temp.path(), &ProgressReporter::noop()).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.failed[0].0.ends_with("locked"));
    }

    #[test]
    fn test_missing_path() {
        let result = load_path(Path::new("/no/such/dir"), &ProgressReporter::noop());
        assert!(result.is_err());
    }
}
