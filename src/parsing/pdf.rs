//! Page-document text extraction from content-stream text operators.
//!
//! Each page's content stream is decoded with `lopdf` and the string operands of the
//! text-showing operators (`Tj`, `TJ`, `'`, `"`) are concatenated. Line-positioning operators
//! start a new line. A page that fails to decode contributes no text but is still counted.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::types::{DocumentFormat, ExtractionStatus, ParseError, ParsedDocument};

pub(crate) fn parse_pdf(bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
    let format = DocumentFormat::PageDocument;
    // lopdf can panic on malformed cross-reference tables
    let document = catch_unwind(AssertUnwindSafe(|| Document::load_mem(bytes)))
        .map_err(|_| ParseError::failure(format, "decoder panicked on malformed input"))?
        .map_err(|error| ParseError::failure(format, error))?;

    let pages = document.get_pages();
    let page_count = pages.len();
    let mut page_texts = Vec::new();

    for (number, page_id) in pages {
        let text = match catch_unwind(AssertUnwindSafe(|| page_text(&document, page_id))) {
            Ok(Ok(text)) => text,
            Ok(Err(error)) => {
                tracing::warn!(page = number, error = %error, "Page text extraction failed");
                String::new()
            }
            Err(_) => {
                tracing::warn!(page = number, "Page text extraction panicked");
                String::new()
            }
        };
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            page_texts.push(trimmed.to_string());
        }
    }

    let extraction_status = if page_texts.is_empty() {
        ExtractionStatus::Empty
    } else {
        ExtractionStatus::Success
    };
    tracing::debug!(
        page_count,
        pages_with_text = page_texts.len(),
        "Page document parsed"
    );

    Ok(ParsedDocument::TextDocument {
        extracted_text: page_texts.join("\n\n"),
        page_count,
        extraction_status,
    })
}

fn page_text(document: &Document, page_id: ObjectId) -> Result<String, lopdf::Error> {
    let raw = document.get_page_content(page_id)?;
    let content = Content::decode(&raw)?;
    Ok(collect_text(&content.operations))
}

fn collect_text(operations: &[Operation]) -> String {
    let mut text = String::new();

    for operation in operations {
        match operation.operator.as_str() {
            "Tj" => push_strings(&mut text, operation.operands.last()),
            "TJ" => {
                if let Some(Object::Array(items)) = operation.operands.first() {
                    for item in items {
                        push_strings(&mut text, Some(item));
                    }
                }
            }
            "'" | "\"" => {
                break_line(&mut text);
                push_strings(&mut text, operation.operands.last());
            }
            "Td" | "TD" | "T*" => break_line(&mut text),
            _ => {}
        }
    }

    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_strings(text: &mut String, operand: Option<&Object>) {
    if let Some(Object::String(bytes, _)) = operand {
        text.push_str(&decode_pdf_string(bytes));
    }
}

fn break_line(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// Decode a PDF string operand: UTF-16BE when it carries a BOM, else UTF-8 or Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(encoded) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = encoded
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| char::from(byte)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn text_page_operations() -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal("Quarterly report")]),
            Operation::new("Td", vec![0.into(), (-14).into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Reve"),
                    (-120).into(),
                    Object::string_literal("nue up"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ]
    }

    fn build_pdf(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        build_pdf_from_streams(
            pages
                .into_iter()
                .map(|operations| {
                    let content = Content { operations };
                    Stream::new(dictionary! {}, content.encode().expect("encode content"))
                })
                .collect(),
        )
    }

    fn build_pdf_from_streams(streams: Vec<Stream>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for stream in streams {
            let content_id = doc.add_object(stream);
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("save pdf");
        buffer
    }

    #[test]
    fn extracts_text_operators_and_counts_empty_pages() {
        let bytes = build_pdf(vec![
            text_page_operations(),
            vec![Operation::new("BT", vec![]), Operation::new("ET", vec![])],
        ]);
        let doc = parse_pdf(&bytes).expect("parsed");
        let ParsedDocument::TextDocument {
            extracted_text,
            page_count,
            extraction_status,
        } = doc
        else {
            panic!("expected text document");
        };

        assert_eq!(page_count, 2);
        assert_eq!(extraction_status, ExtractionStatus::Success);
        assert_eq!(extracted_text, "Quarterly report\nRevenue up");
    }

    #[test]
    fn undecodable_page_contributes_no_text_but_is_counted() {
        let corrupt = Stream::new(
            dictionary! { "Filter" => "FlateDecode" },
            b"\x00\x13 definitely not deflate data".to_vec(),
        );
        let good = Stream::new(
            dictionary! {},
            Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tj", vec![Object::string_literal("Good page")]),
                    Operation::new("ET", vec![]),
                ],
            }
            .encode()
            .expect("encode content"),
        );

        let doc = parse_pdf(&build_pdf_from_streams(vec![corrupt, good])).expect("parsed");
        let ParsedDocument::TextDocument {
            extracted_text,
            page_count,
            extraction_status,
        } = doc
        else {
            panic!("expected text document");
        };

        assert_eq!(page_count, 2);
        assert_eq!(extracted_text, "Good page");
        assert_eq!(extraction_status, ExtractionStatus::Success);
    }

    #[test]
    fn document_without_text_reports_empty_status() {
        let bytes = build_pdf(vec![vec![]]);
        let doc = parse_pdf(&bytes).expect("parsed");
        assert!(matches!(
            doc,
            ParsedDocument::TextDocument {
                page_count: 1,
                extraction_status: ExtractionStatus::Empty,
                ..
            }
        ));
    }

    #[test]
    fn decodes_utf16_strings_with_bom() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
        assert_eq!(decode_pdf_string(&[0xE9]), "é");
    }

    #[test]
    fn quote_operators_start_new_lines() {
        let text = collect_text(&[
            Operation::new("Tj", vec![Object::string_literal("first")]),
            Operation::new("'", vec![Object::string_literal("second")]),
        ]);
        assert_eq!(text, "first\nsecond");
    }
}
