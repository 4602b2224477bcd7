//! Cross-format conversions
//!
//! | from | to | how |
//! |---|---|---|
//! | JPEG / PNG | PDF | [`images_to_pdf`] |
//! | PDF | text | [`pdf_to_text`] (pdf-extract) |
//! | PDF | Word | [`pdf_to_docx`] |
//! | Word | PDF | [`docx_to_pdf`] |
//! | PowerPoint | PDF | [`pptx_to_pdf`] |
//!
//! Only text and raster images cross formats. Layout, fonts and vector
//! graphics are not carried over.

mod images;
pub mod layout;
mod office;
mod text;

use std::fmt;

use serde::Serialize;

pub use images::images_to_pdf;
pub use office::{docx_paragraphs, docx_to_pdf, pptx_slides, pptx_to_pdf, Slide};
pub use text::{pdf_to_docx, pdf_to_text};

use crate::error::{ConvertError, Result};

/// Input kinds told apart by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Jpeg,
    Png,
    /// A ZIP container, which is what .docx and .pptx files are
    Zip,
    Unknown,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Jpeg => "JPEG",
            DocumentFormat::Png => "PNG",
            DocumentFormat::Zip => "a ZIP/Office package",
            DocumentFormat::Unknown => "an unknown format",
        };
        f.write_str(name)
    }
}

/// Identify a document by its magic bytes
pub fn detect_format(bytes: &[u8]) -> DocumentFormat {
    // PDF readers accept a header anywhere in the first KB
    let head = &bytes[..bytes.len().min(1024)];
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        DocumentFormat::Jpeg
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        DocumentFormat::Png
    } else if bytes.starts_with(b"PK\x03\x04") {
        DocumentFormat::Zip
    } else if head.windows(5).any(|w| w == b"%PDF-") {
        DocumentFormat::Pdf
    } else {
        DocumentFormat::Unknown
    }
}

/// Fail with `Unsupported` unless `bytes` look like `expected`
pub fn expect_format(bytes: &[u8], expected: DocumentFormat) -> Result<()> {
    match detect_format(bytes) {
        found if found == expected => Ok(()),
        found => Err(ConvertError::Unsupported(format!(
            "expected {}, got {}",
            expected, found
        ))),
    }
}
