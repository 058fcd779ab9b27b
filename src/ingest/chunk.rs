use crate::index::{DocumentChunk, SourceMetadata};

/// Split extracted text into word-count-bounded chunks. The final partial
/// chunk is kept even when it falls under the bound; word order is preserved.
#[inline]
pub fn chunk_text(text: &str, max_words: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::with_capacity(max_words);

    for word in text.split_whitespace() {
        current.push(word);
        if current.len() >= max_words {
            chunks.push(current.join(" "));
            current.clear();
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

/// Deterministic chunk id: a pure function of the source path and chunk
/// index, so re-ingesting the same page always targets the same ids.
#[inline]
pub fn chunk_id(page_path: &str, chunk_index: usize) -> String {
    format!("site:{}:chunk:{}", page_path, chunk_index)
}

/// Turn one page's extracted text into indexed-ready chunks.
#[inline]
pub fn chunk_page(page_path: &str, text: &str, max_words: usize) -> Vec<DocumentChunk> {
    chunk_text(text, max_words)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| DocumentChunk {
            id: chunk_id(page_path, i),
            text: chunk,
            metadata: SourceMetadata {
                source: "site".to_string(),
                page: page_path.to_string(),
            },
        })
        .collect()
}
