//! Prompt construction.
//!
//! The prompt is the fixed [`PROMPT_HEADER`], one block per retrieved chunk,
//! and the question suffix:
//!
//! ```text
//! <header>---
//! [<title>] chunk#<chunk_index>
//! <content>
//!
//! ---
//! [<title>] chunk#<chunk_index>
//! <content>
//!
//!
//! Question: <question>
//! Answer:
//! ```
//!
//! Chunk content is inserted verbatim. A `---` line inside a note is not
//! escaped, so untrusted page content can blur block boundaries.

use crate::models::ChunkRecord;

/// Instruction header placed before the context blocks.
pub const PROMPT_HEADER: &str = "You are a helpful assistant answering questions about the user's notes. \
Use only the context below. If the answer is not in the context, say that you don't know.\n\n";

/// Format one retrieved chunk as a context block.
pub fn format_chunk(chunk: &ChunkRecord) -> String {
    format!(
        "---\n[{}] chunk#{}\n{}\n",
        chunk.title, chunk.chunk_index, chunk.content
    )
}

/// Build the full prompt for `question` from the retrieved chunks.
pub fn build_prompt(chunks: &[ChunkRecord], question: &str) -> String {
    let context = chunks
        .iter()
        .map(format_chunk)
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}{}\n\nQuestion: {}\nAnswer:", PROMPT_HEADER, context, question)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(title: &str, idx: u64, content: &str) -> ChunkRecord {
        ChunkRecord {
            id: format!("{}-{}", title, idx),
            content: content.to_string(),
            title: title.to_string(),
            page_id: "p".to_string(),
            chunk_index: idx,
        }
    }

    #[test]
    fn test_single_chunk_exact_format() {
        let prompt = build_prompt(&[chunk("T", 0, "C")], "Q?");
        let expected = format!("{}---\n[T] chunk#0\nC\n\n\nQuestion: Q?\nAnswer:", PROMPT_HEADER);
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_blocks_joined_by_blank_line() {
        let prompt = build_prompt(&[chunk("A", 0, "one"), chunk("B", 3, "two")], "why?");
        let body = prompt.strip_prefix(PROMPT_HEADER).unwrap();
        assert_eq!(
            body,
            "---\n[A] chunk#0\none\n\n---\n[B] chunk#3\ntwo\n\n\nQuestion: why?\nAnswer:"
        );
    }

    #[test]
    fn test_no_chunks() {
        let prompt = build_prompt(&[], "anything?");
        assert_eq!(
            prompt,
            format!("{}\n\nQuestion: anything?\nAnswer:", PROMPT_HEADER)
        );
    }

    #[test]
    fn test_delimiter_in_content_is_not_escaped() {
        let prompt = build_prompt(&[chunk("T", 0, "before\n---\nafter")], "Q");
        assert!(prompt.contains("[T] chunk#0\nbefore\n---\nafter\n"));
        assert_eq!(prompt.matches("---\n").count(), 2);
    }
}
