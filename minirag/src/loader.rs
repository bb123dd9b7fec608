//! Text extraction for uploaded documents.
//!
//! PDF and DOCX support are behind the `pdf` and `docx` cargo features (both
//! on by default); when a feature is disabled its format reports
//! [`RagError::UnsupportedFormat`].

use std::path::Path;

use tracing::{debug, info, warn};

use crate::document::{Document, DocumentFormat};
use crate::error::{RagError, Result};

/// Extract the text of `bytes`, declared as `format`, into a [`Document`].
///
/// `source_name` (usually the uploaded file name) is recorded in the
/// document's metadata.
///
/// # Errors
///
/// - [`RagError::UnsupportedFormat`] if support for `format` was compiled out
/// - [`RagError::DocumentLoad`] if the bytes cannot be parsed as `format`
pub fn load_document(
    bytes: &[u8],
    format: DocumentFormat,
    source_name: Option<&str>,
) -> Result<Document> {
    let text = match format {
        DocumentFormat::Text => String::from_utf8_lossy(bytes).into_owned(),
        DocumentFormat::Pdf => extract_pdf(bytes)?,
        DocumentFormat::Docx => extract_docx(bytes)?,
    };

    let mut document = Document::from_parts(bytes, text, format);
    if let Some(name) = source_name {
        document = document.with_source(name);
    }

    info!(
        document.id = %document.id,
        %format,
        bytes = bytes.len(),
        chars = document.text.chars().count(),
        "loaded document"
    );
    Ok(document)
}

/// Read the file at `path` and load it with the format implied by its extension.
///
/// # Errors
///
/// - [`RagError::UnsupportedFormat`] for an unknown extension
/// - [`RagError::StorageFailure`] if the file cannot be read
/// - [`RagError::DocumentLoad`] if its contents cannot be parsed
pub fn load_file(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path)?;
    debug!(path = %path.display(), %format, "reading document");

    let bytes = std::fs::read(path).map_err(|e| RagError::StorageFailure {
        path: path.to_path_buf(),
        message: format!("failed to read document: {e}"),
    })?;
    let name = path.file_name().and_then(|n| n.to_str());
    load_document(&bytes, format, name)
}

/// Extract PDF text on a scoped worker thread.
///
/// `pdf-extract` panics on some well-formed inputs (unsupported font
/// encodings among them); a panic is reported as a load error.
#[cfg(feature = "pdf")]
fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let load_error = |message: String| RagError::DocumentLoad {
        format: DocumentFormat::Pdf.to_string(),
        message,
    };

    let outcome = std::thread::scope(|scope| {
        scope.spawn(|| pdf_extract::extract_text_from_mem(bytes)).join()
    });
    let raw = match outcome {
        Ok(extracted) => extracted.map_err(|e| load_error(e.to_string()))?,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(%message, "PDF extraction panicked");
            return Err(load_error(format!("PDF extraction aborted: {message}")));
        }
    };
    Ok(clean_pdf_text(&raw))
}

#[cfg(feature = "pdf")]
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_bytes: &[u8]) -> Result<String> {
    Err(RagError::UnsupportedFormat("PDF support is not enabled (feature `pdf`)".to_string()))
}

/// Drop NUL characters and blank lines left behind by PDF text extraction.
#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn clean_pdf_text(raw: &str) -> String {
    raw.replace('\0', "")
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(feature = "docx")]
fn extract_docx(bytes: &[u8]) -> Result<String> {
    use docx_rs::{DocumentChild, ParagraphChild, RunChild};

    let docx = docx_rs::read_docx(bytes).map_err(|e| RagError::DocumentLoad {
        format: DocumentFormat::Docx.to_string(),
        message: e.to_string(),
    })?;

    let mut paragraphs = Vec::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            let mut line = String::new();
            for child in &paragraph.children {
                if let ParagraphChild::Run(run) = child {
                    for piece in &run.children {
                        if let RunChild::Text(text) = piece {
                            line.push_str(&text.text);
                        }
                    }
                }
            }
            paragraphs.push(line);
        }
    }
    Ok(paragraphs.join("\n"))
}

#[cfg(not(feature = "docx"))]
fn extract_docx(_bytes: &[u8]) -> Result<String> {
    Err(RagError::UnsupportedFormat("DOCX support is not enabled (feature `docx`)".to_string()))
}
