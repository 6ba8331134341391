//! Format-specific parsing of raw uploads into a [`ParsedDocument`].
//!
//! Dispatch is purely by filename extension. Spreadsheets go through `calamine`, delimited
//! text through `csv`, and page documents through `lopdf` content-stream operators. Unknown
//! extensions are rejected outright rather than guessed at.

mod delimited;
mod pdf;
mod spreadsheet;
pub mod types;

pub use types::{
    DocumentFormat, ExtractionStatus, ParseError, ParsedDocument, Row, Sheet, WorkbookKind,
};

use std::collections::HashSet;

/// Parse an upload into the intermediate representation matching its extension.
pub fn parse_document(filename: &str, bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
    let format =
        DocumentFormat::from_filename(filename).ok_or_else(|| ParseError::UnsupportedFormat {
            filename: filename.to_string(),
        })?;
    tracing::debug!(filename, %format, size = bytes.len(), "Parsing upload");

    let document = match format {
        DocumentFormat::Workbook(kind) => spreadsheet::parse_workbook(kind, bytes)?,
        DocumentFormat::Delimited => delimited::parse_delimited(bytes)?,
        DocumentFormat::PageDocument => pdf::parse_pdf(bytes)?,
    };

    tracing::debug!(filename, kind = document.kind(), "Upload parsed");
    Ok(document)
}

/// Derive unique column names from a header row.
///
/// Blank headers become `column_<n>` (1-based position); repeated names gain a `_<k>` suffix.
pub(crate) fn column_names<I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for (index, header) in headers.into_iter().enumerate() {
        let base = header
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("column_{}", index + 1));

        let mut candidate = base.clone();
        let mut suffix = 1;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        names.push(candidate);
    }

    names
}
