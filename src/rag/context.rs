// Context block for RAG-augmented prompts
use crate::rag::RetrievedChunk;

/// First line of every non-empty context block
pub const CONTEXT_PREAMBLE: &str =
    "Relevant context from the knowledge base (use this to answer accurately):";

/// Format chunks as a numbered context block.
///
/// Empty input gives an empty string. Otherwise the preamble is followed by
/// `[1] text`, `[2] text`, ... in input order, separated by blank lines.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = chunks
        .iter()
        .enumerate()
        .map(|(idx, chunk)| format!("[{}] {}", idx + 1, chunk.text.trim()))
        .collect();

    format!("{}\n\n{}", CONTEXT_PREAMBLE, parts.join("\n\n"))
}

/// First `max_chars` characters of a formatted context
pub fn context_snippet(formatted: &str, max_chars: usize) -> String {
    formatted.chars().take(max_chars).collect()
}
