//! File name and content normalisation for GraphRAG input files.

/// Documents shorter than this get a warning; GraphRAG extracts little from them.
pub const SHORT_DOCUMENT_CHARS: usize = 100;

/// Reduces an uploaded file name to a safe `.txt` name inside the input directory.
///
/// Keeps only the final path component, replaces anything other than ASCII alphanumerics,
/// `-`, `_`, `.` and spaces with `_`, then swaps the extension for `.txt`.
pub fn input_file_name(original: &str) -> String {
    let last = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');

    if cleaned.ends_with(".txt") && cleaned.len() > ".txt".len() {
        return cleaned.to_string();
    }
    let stem = match cleaned.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => cleaned,
    };
    let stem = stem.trim();
    if stem.is_empty() {
        "document.txt".to_string()
    } else {
        format!("{}.txt", stem)
    }
}

/// Inserts `suffix` before the `.txt` extension.
pub fn with_suffix(file_name: &str, suffix: &str) -> String {
    match file_name.strip_suffix(".txt") {
        Some(stem) => format!("{}-{}.txt", stem, suffix),
        None => format!("{}-{}", file_name, suffix),
    }
}

/// Formats document content for chunking.
///
/// Trims, breaks single-block text longer than 200 characters into paragraphs at `". "`,
/// and guarantees a trailing newline.
pub fn prepare_content(content: &str) -> String {
    let mut text = content.trim().to_string();
    if !text.contains("\n\n") && text.chars().count() > 200 {
        text = text.replace(". ", ".\n\n");
    }
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
