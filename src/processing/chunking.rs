//! Textual serialization and character-bounded chunking of parsed documents.
//!
//! Documents are rendered as compact JSON after null-valued fields are stripped, then split
//! into fixed-width character chunks. Only the first chunk is ever forwarded to the model:
//! anything beyond it is intentionally invisible to analysis, while the untouched
//! [`ParsedDocument`] is still returned to the caller.

use crate::parsing::ParsedDocument;
use serde_json::Value;

use super::types::ChunkingError;

/// Render a document as compact JSON with null-valued fields removed.
pub fn serialize_document(document: &ParsedDocument) -> Result<String, ChunkingError> {
    let value = serde_json::to_value(document)?;
    Ok(serde_json::to_string(&strip_nulls(value))?)
}

/// Recursively drop null-valued object fields.
///
/// Arrays are cleaned element-wise (their null elements are kept); scalars pass through.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, field)| !field.is_null())
                .map(|(key, field)| (key, strip_nulls(field)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        scalar => scalar,
    }
}

/// Partition text into consecutive chunks of at most `chunk_size` characters.
///
/// The partition is lossless: concatenating the chunks reproduces `text`. Empty input yields
/// no chunks.
pub fn chunk_text(text: &str, chunk_size: usize) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let head = truncate_chars(rest, chunk_size);
        chunks.push(head.to_string());
        rest = &rest[head.len()..];
    }
    Ok(chunks)
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

/// Serialize a document and keep only its first chunk.
pub(crate) fn first_chunk(
    document: &ParsedDocument,
    chunk_size: usize,
) -> Result<String, ChunkingError> {
    let serialized = serialize_document(document)?;
    let chunks = chunk_text(&serialized, chunk_size)?;
    if chunks.len() > 1 {
        tracing::debug!(
            chunks = chunks.len(),
            chars = serialized.chars().count(),
            chunk_size,
            "Document exceeds chunk size; analyzing first chunk only"
        );
    }
    Ok(chunks.into_iter().next().unwrap_or_default())
}
