//! Plain text layout onto PDF pages in Helvetica
//!
//! Used by the Office conversions. Lines are wrapped on word boundaries
//! using an average glyph width, which is close enough for Helvetica body
//! text without a font-metrics engine.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, StringFormat};

use crate::error::{ConvertError, Result};
use crate::pdf::{win_ansi_bytes, PdfBuilder};

const FONT_RESOURCE: &str = "F1";
const AVG_GLYPH_WIDTH: f64 = 0.5;
const LINE_SPACING: f64 = 1.25;
const TAB: &str = "    ";

/// Page size and margin, in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl PageGeometry {
    /// US Letter portrait with one-inch margins
    pub const LETTER: Self = Self {
        width: 612.0,
        height: 792.0,
        margin: 72.0,
    };

    /// 4:3 landscape slide
    pub const SLIDE: Self = Self {
        width: 720.0,
        height: 540.0,
        margin: 36.0,
    };

    fn text_width(&self) -> f64 {
        (self.width - 2.0 * self.margin).max(1.0)
    }
}

/// What to do with lines that do not fit on the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Continue on a fresh page
    NewPage,
    /// Drop them
    Truncate,
}

/// A paragraph of text at one font size
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub font_size: f64,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, font_size: f64) -> Self {
        Self {
            text: text.into(),
            font_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    text: String,
    font_size: f64,
    /// Baseline, from the bottom of the page
    y: f64,
}

/// Accumulates wrapped lines into pages
#[derive(Debug)]
pub struct TextLayout {
    geometry: PageGeometry,
    overflow: Overflow,
    pages: Vec<Vec<PlacedLine>>,
    /// Top of the next line, from the bottom of the page
    cursor: f64,
}

impl TextLayout {
    pub fn new(geometry: PageGeometry, overflow: Overflow) -> Self {
        Self {
            geometry,
            overflow,
            pages: Vec::new(),
            cursor: 0.0,
        }
    }

    /// Start a fresh page even if the current one has room
    pub fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = self.geometry.height - self.geometry.margin;
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Wrap a block and place its lines, followed by half a line of space
    pub fn push_block(&mut self, block: &TextBlock) {
        if self.pages.is_empty() {
            self.new_page();
        }

        let leading = block.font_size * LINE_SPACING;
        let max_chars = (self.geometry.text_width() / (block.font_size * AVG_GLYPH_WIDTH)) as usize;

        for line in wrap_text(&block.text, max_chars.max(1)) {
            if self.cursor - leading < self.geometry.margin {
                match self.overflow {
                    Overflow::NewPage => self.new_page(),
                    Overflow::Truncate => return,
                }
            }
            self.cursor -= leading;
            if let Some(page) = self.pages.last_mut() {
                page.push(PlacedLine {
                    text: line,
                    font_size: block.font_size,
                    y: self.cursor + (leading - block.font_size),
                });
            }
        }
        self.cursor -= leading / 2.0;
    }

    /// Render every page; an empty layout still yields one blank page
    pub fn into_pdf(mut self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            self.new_page();
        }

        let mut builder = PdfBuilder::new();
        let font_id = builder.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        for lines in &self.pages {
            let content = page_content(lines, self.geometry.margin)?;
            builder.add_page(
                self.geometry.width,
                self.geometry.height,
                content,
                dictionary! { "Font" => dictionary! { FONT_RESOURCE => font_id } },
            );
        }
        builder.finish()
    }
}

fn page_content(lines: &[PlacedLine], x: f64) -> Result<Vec<u8>> {
    let mut operations = vec![Operation::new("BT", vec![])];
    for line in lines {
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), Object::Real(line.font_size as f32)],
        ));
        operations.push(Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                Object::Real(x as f32),
                Object::Real(line.y as f32),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi_bytes(&line.text), StringFormat::Literal)],
        ));
    }
    operations.push(Operation::new("ET", vec![]));

    Content { operations }
        .encode()
        .map_err(|e| ConvertError::OperationError(format!("Failed to encode page text: {}", e)))
}

/// Greedy word wrap to at most `max_chars` per line.
///
/// Explicit newlines always break; words longer than a line are split.
/// An empty paragraph yields one empty line so it still takes up space.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.replace('\t', TAB);
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > max_chars {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > max_chars && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current_len += word.len();
            current.extend(word);
        }

        lines.push(current);
    }

    lines
}
