//! Text extraction from uploaded files: PDF via lopdf, everything else decoded as UTF-8.

use lopdf::Document;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    #[error("No text could be extracted from {0}")]
    Empty(String),
}

/// Lower-cased extension of `filename`, without the dot.
fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Page texts joined by blank lines. Pages without text are skipped.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ExtractError::Pdf(format!("Failed to load PDF: {}", e)))?;

    let mut parts = Vec::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) if !text.trim().is_empty() => parts.push(text),
            Ok(_) => {}
            Err(e) => debug!(page = page_num, error = %e, "Skipping PDF page without text"),
        }
    }
    Ok(parts.join("\n\n"))
}

/// Invalid byte sequences are dropped.
fn decode_utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}

/// Raw text of an uploaded file, chosen by the file name's extension.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    match extension(filename).as_str() {
        "pdf" => extract_pdf_text(bytes),
        _ => Ok(decode_utf8(bytes)),
    }
}

/// Trims every line and drops blank ones.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// [`extract_text`] + [`clean_text`]; empty results are an error.
pub fn extract_clean_text(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    let text = clean_text(&extract_text(bytes, filename)?);
    if text.is_empty() {
        return Err(ExtractError::Empty(filename.to_string()));
    }
    Ok(text)
}
