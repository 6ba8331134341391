//! Comma-delimited text parsing via the `csv` crate.

use csv::{ReaderBuilder, Trim};

use super::column_names;
use super::types::{DocumentFormat, ParseError, ParsedDocument, Row};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub(crate) fn parse_delimited(bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
    let input = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let headers: Vec<Option<String>> = reader
        .headers()
        .map_err(|error| ParseError::failure(DocumentFormat::Delimited, error))?
        .iter()
        .map(|value| Some(value.to_string()))
        .collect();
    let columns = column_names(headers.iter().cloned());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| ParseError::failure(DocumentFormat::Delimited, error))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        // surplus fields are named as if the header had blank cells there
        let widened;
        let names = if record.len() > columns.len() {
            widened = column_names(
                headers
                    .iter()
                    .cloned()
                    .chain(std::iter::repeat(None))
                    .take(record.len()),
            );
            &widened
        } else {
            &columns
        };

        let mut row = Row::new();
        for (index, column) in names.iter().enumerate() {
            row.push(column.clone(), record.get(index).map(str::to_string));
        }
        rows.push(row);
    }

    Ok(ParsedDocument::TabularFlat { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_of(input: &str) -> Vec<Row> {
        match parse_delimited(input.as_bytes()).expect("parsed") {
            ParsedDocument::TabularFlat { rows } => rows,
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn header_defines_columns_and_fields_are_trimmed() {
        let rows = rows_of(" name , qty \n  Widget ,  4 \nGadget,7\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["name", "qty"]);
        assert_eq!(rows[0].get("name"), Some(Some("Widget")));
        assert_eq!(rows[0].get("qty"), Some(Some("4")));
        assert_eq!(rows[1].get("name"), Some(Some("Gadget")));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let rows = rows_of("a,b\n\n1,2\n,\n\n3,4\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("a"), Some(Some("3")));
    }

    #[test]
    fn surplus_field_names_do_not_collide_with_header() {
        let rows = rows_of("a,column_3\n1,2,3\n");
        assert_eq!(
            rows[0].columns().collect::<Vec<_>>(),
            vec!["a", "column_3", "column_3_1"]
        );
        assert_eq!(rows[0].get("column_3"), Some(Some("2")));
        assert_eq!(rows[0].get("column_3_1"), Some(Some("3")));

        let rendered = serde_json::to_string(&rows[0]).expect("json");
        assert_eq!(rendered, r#"{"a":"1","column_3":"2","column_3_1":"3"}"#);
    }

    #[test]
    fn short_records_yield_nulls_and_surplus_fields_get_names() {
        let rows = rows_of("a,b\n1\n2,3,4\n");
        assert_eq!(rows[0].get("b"), Some(None));
        assert_eq!(rows[1].get("column_3"), Some(Some("4")));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let rows = rows_of("\u{feff}id,label\n1,x\n");
        assert_eq!(rows[0].get("id"), Some(Some("1")));
    }

    #[test]
    fn invalid_utf8_is_a_parse_failure() {
        let error = parse_delimited(b"a,b\n\xff\xfe,1\n").expect_err("invalid");
        assert!(matches!(
            error,
            ParseError::ParseFailure {
                format: DocumentFormat::Delimited,
                ..
            }
        ));
    }
}
