//! Keyword-overlap search over the raw input documents.
//!
//! Used when no index exists or a GraphRAG query fails.

use std::collections::HashSet;

/// Paragraphs shorter than this are ignored.
pub const MIN_PARAGRAPH_CHARS: usize = 50;
/// Each returned paragraph is cut to this many characters.
pub const MAX_PARAGRAPH_CHARS: usize = 800;
pub const DEFAULT_MAX_RESULTS: usize = 3;

const SEPARATOR: &str = "\n\n---\n\n";

struct Hit<'a> {
    overlap: usize,
    paragraph: String,
    file: &'a str,
}

/// Ranks blank-line separated paragraphs by the number of distinct query words they share.
///
/// `documents` are `(file name, content)` pairs. Returns the top `max_results` paragraphs as
/// `[From: file]\n<paragraph>` joined by `---` separators, or `None` when nothing overlaps.
pub fn keyword_search(
    documents: &[(String, String)],
    query: &str,
    max_results: usize,
) -> Option<String> {
    let query_words: HashSet<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if query_words.is_empty() {
        return None;
    }

    let mut hits: Vec<Hit<'_>> = Vec::new();
    for (file, content) in documents {
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.chars().count() < MIN_PARAGRAPH_CHARS {
                continue;
            }
            let words: HashSet<String> =
                paragraph.split_whitespace().map(str::to_lowercase).collect();
            let overlap = words.intersection(&query_words).count();
            if overlap >= 1 {
                hits.push(Hit {
                    overlap,
                    paragraph: paragraph.chars().take(MAX_PARAGRAPH_CHARS).collect(),
                    file,
                });
            }
        }
    }

    if hits.is_empty() {
        return None;
    }

    // Stable: equal overlaps keep document/paragraph order.
    hits.sort_by(|a, b| b.overlap.cmp(&a.overlap));
    let chunks: Vec<String> = hits
        .iter()
        .take(max_results)
        .map(|h| format!("[From: {}]\n{}", h.file, h.paragraph))
        .collect();

    tracing::info!(chunk_count = chunks.len(), "Keyword search found relevant chunks");
    Some(chunks.join(SEPARATOR))
}
