//! Workbook parsing via `calamine`.

use calamine::{Data, DataType, Ods, Range, Reader, Xls, Xlsx};
use std::fmt::Display;
use std::io::Cursor;

use super::column_names;
use super::types::{DocumentFormat, ParseError, ParsedDocument, Row, Sheet, WorkbookKind};

type Source<'a> = Cursor<&'a [u8]>;

pub(crate) fn parse_workbook(
    kind: WorkbookKind,
    bytes: &[u8],
) -> Result<ParsedDocument, ParseError> {
    let format = DocumentFormat::Workbook(kind);
    let source = Cursor::new(bytes);
    match kind {
        WorkbookKind::Xlsx => read_sheets(Xlsx::new(source), format),
        WorkbookKind::Xls => read_sheets(Xls::new(source), format),
        WorkbookKind::Ods => read_sheets(Ods::new(source), format),
    }
}

fn read_sheets<'a, R>(
    opened: Result<R, R::Error>,
    format: DocumentFormat,
) -> Result<ParsedDocument, ParseError>
where
    R: Reader<Source<'a>>,
    R::Error: Display,
{
    let mut workbook = opened.map_err(|error| ParseError::failure(format, error))?;
    let sheet_names = workbook.sheet_names();
    let mut sheets = Vec::with_capacity(sheet_names.len());

    for name in &sheet_names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|error| ParseError::failure(format, format!("sheet '{name}': {error}")))?;
        let rows = sheet_rows(&range);
        tracing::trace!(sheet = %name, rows = rows.len(), "Sheet parsed");
        sheets.push(Sheet {
            name: name.clone(),
            rows,
        });
    }

    Ok(ParsedDocument::TabularWorkbook {
        sheet_names,
        sheets,
    })
}

fn sheet_rows(range: &Range<Data>) -> Vec<Row> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let columns = column_names(header.iter().map(cell_text));

    rows.filter_map(|cells| {
        let mut row = Row::new();
        for (index, column) in columns.iter().enumerate() {
            row.push(column.clone(), cells.get(index).and_then(cell_text));
        }
        (!row.is_blank()).then_some(row)
    })
    .collect()
}

/// Normalize a cell to string-or-null; dates render as `YYYY-MM-DD`.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(value) | Data::DurationIso(value) => Some(value.clone()),
        Data::Int(value) => Some(value.to_string()),
        Data::Float(value) => Some(format_number(*value)),
        Data::Bool(value) => Some(value.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => Some(
            cell.as_date()
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| cell.to_string()),
        ),
        Data::Error(error) => Some(error.to_string()),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
