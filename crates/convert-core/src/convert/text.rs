//! PDF text extraction and PDF to Word

use std::io::{Cursor, Write};
use std::panic::{self, AssertUnwindSafe};

use quick_xml::escape::escape;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::{expect_format, DocumentFormat};
use crate::error::{ConvertError, Result};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = "<w:sectPr><w:pgSz w:w=\"12240\" w:h=\"15840\"/></w:sectPr></w:body></w:document>";

const PAGE_BREAK: char = '\u{c}';

/// Extract the text of every page
pub fn pdf_to_text(bytes: &[u8]) -> Result<String> {
    expect_format(bytes, DocumentFormat::Pdf)?;

    // pdf-extract panics on some malformed font programs
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }))
    .map_err(|_| {
        warn!("Text extraction panicked");
        ConvertError::ParseError("text extraction failed on a malformed document".into())
    })?
    .map_err(|e| ConvertError::ParseError(format!("PDF text extraction failed: {}", e)))?;

    info!("Extracted {} characters of text", extracted.chars().count());
    Ok(extracted)
}

/// Convert a PDF to a .docx holding its text, one paragraph per line
pub fn pdf_to_docx(bytes: &[u8]) -> Result<Vec<u8>> {
    let text = pdf_to_text(bytes)?;
    let body = document_body(&text);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let entries = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        (
            "word/document.xml",
            format!("{}{}{}", DOCUMENT_HEAD, body, DOCUMENT_TAIL),
        ),
    ];
    for (name, content) in entries {
        zip.start_file(name, SimpleFileOptions::default())
            .and_then(|_| zip.write_all(content.as_bytes()).map_err(Into::into))
            .map_err(|e| ConvertError::OperationError(format!("Failed to write {}: {}", name, e)))?;
    }

    let output = zip
        .finish()
        .map_err(|e| ConvertError::OperationError(format!("Failed to finish docx: {}", e)))?
        .into_inner();
    Ok(output)
}

/// WordprocessingML paragraphs for extracted text.
///
/// Runs of blank lines collapse to one empty paragraph; form feeds between
/// pages become page breaks.
fn document_body(text: &str) -> String {
    let mut body = String::new();
    let mut last_blank = true;

    for line in text.lines() {
        let page_break = line.contains(PAGE_BREAK);
        let line = line.replace(PAGE_BREAK, "");
        let line = line.trim_end();

        if page_break {
            body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
            last_blank = true;
        }
        if line.is_empty() {
            if !last_blank {
                body.push_str("<w:p/>");
            }
            last_blank = true;
            continue;
        }

        body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
        body.push_str(&escape(line));
        body.push_str("</w:t></w:r></w:p>");
        last_blank = false;
    }

    if body.is_empty() {
        body.push_str("<w:p/>");
    }
    body
}
