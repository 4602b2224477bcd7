//! Word and PowerPoint input: text extraction from OOXML packages
//!
//! Only the text is carried over. Paragraphs come from `w:p` elements of
//! `word/document.xml`; slides from `ppt/slides/slideN.xml`, one text box per
//! `p:sp` shape.

use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info};
use zip::ZipArchive;

use super::layout::{Overflow, PageGeometry, TextBlock, TextLayout};
use crate::error::{ConvertError, Result};

const BODY_SIZE: f64 = 11.0;
const SLIDE_TITLE_SIZE: f64 = 28.0;
const SLIDE_BODY_SIZE: f64 = 18.0;

/// Text of one slide
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slide {
    pub title: Option<String>,
    pub text_boxes: Vec<String>,
}

/// Render a .docx as Letter pages of Helvetica text
pub fn docx_to_pdf(bytes: &[u8]) -> Result<Vec<u8>> {
    let paragraphs = docx_paragraphs(bytes)?;

    let mut layout = TextLayout::new(PageGeometry::LETTER, Overflow::NewPage);
    for paragraph in &paragraphs {
        layout.push_block(&TextBlock::new(paragraph.as_str(), BODY_SIZE));
    }
    info!(
        "Laid out {} paragraphs on {} page(s)",
        paragraphs.len(),
        layout.page_count().max(1)
    );
    layout.into_pdf()
}

/// Render a .pptx with one landscape page per slide
pub fn pptx_to_pdf(bytes: &[u8]) -> Result<Vec<u8>> {
    let slides = pptx_slides(bytes)?;
    if slides.is_empty() {
        return Err(ConvertError::ParseError("presentation has no slides".into()));
    }

    let mut layout = TextLayout::new(PageGeometry::SLIDE, Overflow::Truncate);
    for slide in &slides {
        layout.new_page();
        if let Some(title) = &slide.title {
            layout.push_block(&TextBlock::new(title.as_str(), SLIDE_TITLE_SIZE));
        }
        for text in &slide.text_boxes {
            layout.push_block(&TextBlock::new(text.as_str(), SLIDE_BODY_SIZE));
        }
    }
    info!("Rendered {} slide(s)", slides.len());
    layout.into_pdf()
}

/// Paragraph texts of a .docx body, in document order
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = open_package(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?
        .ok_or_else(|| ConvertError::Unsupported("not a Word document (no word/document.xml)".into()))?;

    let mut reader = Reader::from_str(&xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if in_paragraph => match e.local_name().as_ref() {
                b"br" | b"cr" => current.push('\n'),
                b"tab" => current.push('\t'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"p" => {
                paragraphs.push(String::new());
            }
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|e| ConvertError::ParseError(format!("document.xml: {}", e)))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ConvertError::ParseError(format!(
                    "document.xml parse error at {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    debug!("Read {} paragraphs from document.xml", paragraphs.len());
    Ok(paragraphs)
}

/// Slides of a .pptx in slide-number order
pub fn pptx_slides(bytes: &[u8]) -> Result<Vec<Slide>> {
    let mut archive = open_package(bytes)?;

    let mut numbers: Vec<usize> = archive
        .file_names()
        .filter_map(|name| {
            name.strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()
        })
        .collect();
    if numbers.is_empty() && read_entry(&mut archive, "ppt/presentation.xml")?.is_none() {
        return Err(ConvertError::Unsupported(
            "not a PowerPoint presentation (no ppt/ content)".into(),
        ));
    }
    numbers.sort_unstable();

    let mut slides = Vec::with_capacity(numbers.len());
    for n in numbers {
        let name = format!("ppt/slides/slide{}.xml", n);
        if let Some(xml) = read_entry(&mut archive, &name)? {
            slides.push(parse_slide(&xml).map_err(|e| match e {
                ConvertError::ParseError(msg) => ConvertError::ParseError(format!("{}: {}", name, msg)),
                other => other,
            })?);
        }
    }
    Ok(slides)
}

fn parse_slide(xml: &str) -> Result<Slide> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut slide = Slide::default();

    let mut is_title = false;
    let mut in_text = false;
    let mut shape_text: Vec<String> = Vec::new();
    let mut paragraph = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"sp" => {
                    is_title = false;
                    shape_text.clear();
                }
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                b"ph" => is_title |= is_title_placeholder(e),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"ph" => is_title |= is_title_placeholder(e),
                b"br" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !paragraph.trim().is_empty() {
                        shape_text.push(std::mem::take(&mut paragraph));
                    }
                }
                b"sp" => {
                    if !shape_text.is_empty() {
                        let text = shape_text.join("\n");
                        if is_title && slide.title.is_none() {
                            slide.title = Some(text);
                        } else {
                            slide.text_boxes.push(text);
                        }
                    }
                    shape_text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|e| ConvertError::ParseError(e.to_string()))?;
                paragraph.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ConvertError::ParseError(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(slide)
}

fn is_title_placeholder(e: &quick_xml::events::BytesStart) -> bool {
    e.attributes().flatten().any(|attr| {
        attr.key.local_name().as_ref() == b"type"
            && matches!(attr.value.as_ref(), b"title" | b"ctrTitle")
    })
}

fn open_package(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConvertError::Unsupported(format!("not an Office document: {}", e)))
}

/// Read a UTF-8 entry, `None` if the package has no such entry
fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ConvertError::ParseError(format!("{}: {}", name, e))),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| ConvertError::ParseError(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}
