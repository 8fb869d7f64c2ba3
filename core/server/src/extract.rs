//! Plain-text extraction from uploaded reading material.
//!
//! Uploads arrive as raw bytes together with the client's file name; the
//! extension picks the format. Plain text, PDF and Word (.docx) files are
//! understood.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Largest upload accepted by the upload endpoints.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Format implied by a file name's extension, ignoring case.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(DocumentFormat::PlainText),
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0:?}")]
    Unsupported(String),
    #[error("failed to parse {format:?} file: {reason}")]
    Parse {
        format: DocumentFormat,
        reason: String,
    },
}

/// Pull the text out of `bytes`, dispatching on the extension of `file_name`.
pub fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let format = DocumentFormat::from_file_name(file_name)
        .ok_or_else(|| ExtractError::Unsupported(file_name.to_string()))?;

    let text = match format {
        DocumentFormat::PlainText => String::from_utf8(bytes.to_vec()).map_err(|e| {
            ExtractError::Parse {
                format,
                reason: e.to_string(),
            }
        })?,
        DocumentFormat::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Parse {
                format,
                reason: e.to_string(),
            })?
        }
        DocumentFormat::Docx => docx_text(bytes).map_err(|reason| ExtractError::Parse {
            format,
            reason,
        })?,
    };

    debug!(
        "Extracted {} chars from {} ({:?})",
        text.chars().count(),
        file_name,
        format
    );
    Ok(text)
}

/// File name without its extension, used as a default title.
pub fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
        .to_string()
}

/// Paragraph text of `word/document.xml`, one paragraph per line.
fn docx_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| format!("not a ZIP archive: {}", e))?;

    let mut doc_xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| "missing word/document.xml".to_string())?
        .read_to_string(&mut doc_xml)
        .map_err(|e| format!("failed to read document.xml: {}", e))?;

    let mut reader = Reader::from_str(&doc_xml);
    let mut paragraphs = Vec::new();
    let mut paragraph = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"p" => {
                    if !paragraph.trim().is_empty() {
                        paragraphs.push(std::mem::take(&mut paragraph));
                    }
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|e| format!("bad text in document.xml: {}", e))?;
                paragraph.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n"))
}
