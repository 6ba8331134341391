//! Intermediate document representation produced by the format parsers.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors raised while turning an upload into a [`ParsedDocument`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// The filename's extension is not one of the recognized formats.
    #[error("Unsupported file format: {filename}")]
    UnsupportedFormat {
        /// Name of the rejected upload.
        filename: String,
    },
    /// Format-specific decoding failed for the whole document.
    #[error("Failed to parse {format} document: {cause}")]
    ParseFailure {
        /// Format the parser attempted to decode.
        format: DocumentFormat,
        /// Diagnostic reported by the decoder.
        cause: String,
    },
}

impl ParseError {
    pub(crate) fn failure(format: DocumentFormat, cause: impl fmt::Display) -> Self {
        Self::ParseFailure {
            format,
            cause: cause.to_string(),
        }
    }
}

/// Spreadsheet container flavours understood by the workbook parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookKind {
    /// Office Open XML workbook (`.xlsx`, `.xlsm`).
    Xlsx,
    /// Legacy binary workbook (`.xls`).
    Xls,
    /// OpenDocument spreadsheet (`.ods`).
    Ods,
}

/// Recognized upload formats, resolved from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Spreadsheet workbook with one or more sheets.
    Workbook(WorkbookKind),
    /// Comma-delimited text with a header row.
    Delimited,
    /// Paged document whose text is drawn by content-stream operators.
    PageDocument,
}

impl DocumentFormat {
    /// Resolve the format for a filename using its lower-cased extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, extension) = filename.rsplit_once('.')?;
        match extension.to_lowercase().as_str() {
            "xlsx" | "xlsm" => Some(Self::Workbook(WorkbookKind::Xlsx)),
            "xls" => Some(Self::Workbook(WorkbookKind::Xls)),
            "ods" => Some(Self::Workbook(WorkbookKind::Ods)),
            "csv" => Some(Self::Delimited),
            "pdf" => Some(Self::PageDocument),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Workbook(WorkbookKind::Xlsx) => "xlsx",
            Self::Workbook(WorkbookKind::Xls) => "xls",
            Self::Workbook(WorkbookKind::Ods) => "ods",
            Self::Delimited => "csv",
            Self::PageDocument => "pdf",
        };
        f.write_str(label)
    }
}

/// A single record keyed by column name, preserving column order.
///
/// Cells are normalized to either a string or null; serialization emits a JSON object whose
/// keys follow the header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(String, Option<String>)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cell under the given column.
    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
        self.cells.push((column.into(), value));
    }

    /// Look up a column; `Some(None)` means the column exists but holds null.
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_deref())
    }

    /// Column names in header order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// True when every cell is null or whitespace.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| {
            value
                .as_deref()
                .map(|text| text.trim().is_empty())
                .unwrap_or(true)
        })
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// A named worksheet and its data rows (header excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    /// Sheet name as stored in the workbook.
    pub name: String,
    /// Non-blank data rows in sheet order.
    pub rows: Vec<Row>,
}

/// Outcome of page-document text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// At least one page produced text.
    Success,
    /// No page produced any text.
    Empty,
}

/// Normalized representation of a parsed upload; exactly one variant per file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ParsedDocument {
    /// Spreadsheet workbook.
    #[serde(rename_all = "camelCase")]
    TabularWorkbook {
        /// Sheet names in workbook order.
        sheet_names: Vec<String>,
        /// Sheets in workbook order, serialized as an ordered name → rows object.
        #[serde(serialize_with = "serialize_sheets")]
        sheets: Vec<Sheet>,
    },
    /// Delimited text file.
    #[serde(rename_all = "camelCase")]
    TabularFlat {
        /// Data rows (header excluded).
        rows: Vec<Row>,
    },
    /// Paged text document.
    #[serde(rename_all = "camelCase")]
    TextDocument {
        /// Text of every page that produced any, separated by blank lines.
        extracted_text: String,
        /// Total number of pages, including pages without text.
        page_count: usize,
        /// Whether any text was recovered.
        extraction_status: ExtractionStatus,
    },
}

impl ParsedDocument {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TabularWorkbook { .. } => "tabular_workbook",
            Self::TabularFlat { .. } => "tabular_flat",
            Self::TextDocument { .. } => "text_document",
        }
    }
}

fn serialize_sheets<S: Serializer>(sheets: &[Sheet], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(sheets.len()))?;
    for sheet in sheets {
        map.serialize_entry(&sheet.name, &sheet.rows)?;
    }
    map.end()
}
