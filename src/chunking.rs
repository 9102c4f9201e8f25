use crate::document::Document;
use crate::error::{RagError, Result};
use std::iter;

/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Unique identifier for the document this chunk belongs to
    pub document_id: String,
    /// Position of this chunk among the document's chunks
    pub chunk_index: usize,
    /// Starting byte position of this chunk in the original document
    pub start_position: usize,
    /// Byte position just past the end of this chunk
    pub end_position: usize,
    /// Leading bytes shared with the previous chunk of the same document
    pub overlap: usize,
    /// Page the chunk starts on, when the document has page metadata
    pub page: Option<usize>,
}

impl TextChunk {
    /// The part of the chunk that the previous chunk does not already cover
    pub fn fresh_text(&self) -> &str {
        &self.text[self.overlap..]
    }
}

/// Sliding-window splitter with a fixed window and overlap, both in characters
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Chunker {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split one document, tagging each chunk with the page it starts on
    pub fn split_document(&self, document: &Document) -> Vec<TextChunk> {
        let mut chunks = split_into_chunks(
            &document.content,
            &document.document_id,
            self.chunk_size,
            self.chunk_overlap,
        );
        for chunk in &mut chunks {
            chunk.page = document.page_at(chunk.start_position);
        }
        chunks
    }

    /// Split every document in order
    pub fn split_documents(&self, documents: &[Document]) -> Vec<TextChunk> {
        documents
            .iter()
            .flat_map(|document| self.split_document(document))
            .collect()
    }
}

/// Split text into windows of `chunk_size` characters advancing by
/// `chunk_size - chunk_overlap`.
///
/// Windowing stops as soon as a window reaches the end of the text, so a
/// trailing remainder that would fit entirely inside the previous window's
/// overlap is never emitted. The last chunk may be shorter than `chunk_size`.
/// Callers must ensure `chunk_overlap < chunk_size`.
pub fn split_into_chunks(
    text: &str,
    document_id: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<TextChunk> {
    if text.trim().is_empty() || chunk_size == 0 || chunk_overlap >= chunk_size {
        return Vec::new();
    }

    // Byte offset of every char plus the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;
    let stride = chunk_size - chunk_overlap;

    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(char_count);
        let start_position = boundaries[start];
        let end_position = boundaries[end];
        let overlap = chunks
            .last()
            .map(|prev| prev.end_position.saturating_sub(start_position))
            .unwrap_or(0);

        chunks.push(TextChunk {
            text: text[start_position..end_position].to_string(),
            document_id: document_id.to_string(),
            chunk_index: chunks.len(),
            start_position,
            end_position,
            overlap,
            page: None,
        });

        if end == char_count {
            break;
        }
        start += stride;
    }

    chunks
}

/// Rebuild the source text from consecutive chunks of one document
pub fn reconstruct(chunks: &[TextChunk]) -> String {
    chunks.iter().map(TextChunk::fresh_text).collect()
}
