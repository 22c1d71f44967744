//! Text chunking for embedding.
//!
//! Sizes are measured in `char`s. Text is split on blank lines first, then
//! oversized paragraphs are cut at sentence boundaries.

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub position: usize,
}

/// Split `text` into chunks of roughly `chunk_size` chars. Each chunk after
/// the first starts with the last `overlap` chars of the previous one.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let base = split_into_chunks(text, chunk_size);
    let overlap = overlap.min(chunk_size.saturating_sub(1));

    let mut out = Vec::with_capacity(base.len());
    for (position, content) in base.iter().enumerate() {
        let content = if position > 0 && overlap > 0 {
            let tail = tail_chars(&base[position - 1], overlap);
            let tail = tail.trim();
            if tail.is_empty() {
                content.clone()
            } else {
                format!("{tail} {content}")
            }
        } else {
            content.clone()
        };
        out.push(Chunk { content, position });
    }
    out
}

fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

/// Cut `s` to at most `max` chars, marking the cut with an ellipsis.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max).collect();
    cut.push_str("...");
    cut
}

/// Splits text into chunks of approximately `chunk_size` characters.
pub fn split_into_chunks(content: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let char_count = content.chars().count();

    if char_count <= chunk_size {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current_chunk = String::new();
    let mut current_len = 0usize;

    for para in content.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let para_len = para.chars().count();

        if current_len > 0 && current_len + para_len + 2 > chunk_size {
            chunks.push(std::mem::take(&mut current_chunk));
            current_len = 0;
        }

        if para_len > chunk_size {
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current_chunk));
                current_len = 0;
            }
            chunks.extend(split_large_paragraph(para, chunk_size));
        } else {
            if current_len > 0 {
                current_chunk.push_str("\n\n");
                current_len += 2;
            }
            current_chunk.push_str(para);
            current_len += para_len;
        }
    }

    if !current_chunk.is_empty() {
        chunks.push(current_chunk);
    }

    chunks
}

/// Splits a large paragraph into smaller chunks, preferring sentence boundaries.
fn split_large_paragraph(para: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut chars: Vec<char> = para.chars().collect();

    while chars.len() > chunk_size {
        let mut cut_point = chunk_size;

        // Look back to half the chunk for a sentence end.
        let min_search = chunk_size / 2;
        for i in (min_search..=chunk_size).rev() {
            if i < chars.len() && matches!(chars[i], '.' | '!' | '?' | '\n' | '。') {
                cut_point = i + 1;
                break;
            }
        }
        cut_point = cut_point.min(chars.len());

        let piece: String = chars[..cut_point].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        let remaining: String = chars[cut_point..].iter().collect();
        chars = remaining.trim().chars().collect();
    }

    if !chars.is_empty() {
        chunks.push(chars.into_iter().collect());
    }

    chunks
}
