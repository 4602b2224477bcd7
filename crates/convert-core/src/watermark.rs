//! Text watermarks
//!
//! The watermark is drawn as an extra content stream on every page, centred
//! and rotated, with its own font and transparency resources. The original
//! page content is wrapped in `q`/`Q` so its graphics state cannot leak into
//! the overlay.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::Deserialize;
use tracing::info;

use crate::error::{ConvertError, Result};
use crate::pdf::{
    inherited_attribute, load_document, pack_document, page_ids, page_size, win_ansi_bytes,
};

const FONT_RESOURCE: &str = "FWm0";
const STATE_RESOURCE: &str = "GSWm0";

/// Average Helvetica glyph width as a fraction of the font size
const AVG_GLYPH_WIDTH: f64 = 0.55;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatermarkOptions {
    pub text: String,
    pub font_size: f64,
    /// Fill opacity, 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f64,
    /// Hex colour like `#808080`
    pub color: String,
    /// Counterclockwise rotation in degrees
    pub angle: f64,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 48.0,
            opacity: 0.3,
            color: "#808080".to_string(),
            angle: 45.0,
        }
    }
}

impl WatermarkOptions {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(f64, f64, f64)> {
        if self.text.trim().is_empty() {
            return Err(ConvertError::MissingOption("text"));
        }
        if !(self.font_size > 0.0 && self.font_size <= 500.0) {
            return Err(ConvertError::InvalidOption(format!(
                "font size must be between 0 and 500, got {}",
                self.font_size
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ConvertError::InvalidOption(format!(
                "opacity must be between 0 and 1, got {}",
                self.opacity
            )));
        }
        parse_hex_color(&self.color)
    }
}

/// Parse a hex colour string (`#FF0000` or `FF0000`) to RGB components in 0..1
pub fn parse_hex_color(color: &str) -> Result<(f64, f64, f64)> {
    let hex = color.trim().trim_start_matches('#');
    let invalid = || ConvertError::InvalidOption(format!("invalid colour '{}'", color));

    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map(|v| f64::from(v) / 255.0)
            .map_err(|_| invalid())
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Stamp `options.text` across every page.
///
/// Returns the output and the number of pages stamped.
pub fn apply_watermark(bytes: &[u8], options: &WatermarkOptions) -> Result<(Vec<u8>, usize)> {
    let color = options.validate()?;
    let mut doc = load_document(bytes)?;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let state_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(options.opacity as f32),
        "CA" => Object::Real(options.opacity as f32),
    });
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

    let pages = page_ids(&doc);
    for &page_id in &pages {
        let (width, height) = page_size(&doc, page_id);
        let overlay = overlay_content(options, color, width, height)?;
        let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

        let mut resources = page_resources(&doc, page_id);
        add_resource(&doc, &mut resources, b"Font", FONT_RESOURCE, font_id);
        add_resource(&doc, &mut resources, b"ExtGState", STATE_RESOURCE, state_id);

        let page = doc
            .get_dictionary_mut(page_id)
            .map_err(|e| ConvertError::ParseError(e.to_string()))?;

        let mut contents = vec![Object::Reference(save_id)];
        match page.get(b"Contents") {
            Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
            Ok(existing @ Object::Reference(_)) => contents.push(existing.clone()),
            _ => {}
        }
        contents.push(Object::Reference(overlay_id));

        page.set("Contents", contents);
        page.set("Resources", resources);
    }

    let output = pack_document(&mut doc)?;
    info!(
        "Watermarked {} page(s) with {:?}",
        pages.len(),
        options.text
    );
    Ok((output, pages.len()))
}

/// Content stream that restores the page state and draws the watermark
fn overlay_content(
    options: &WatermarkOptions,
    (r, g, b): (f64, f64, f64),
    width: f64,
    height: f64,
) -> Result<Vec<u8>> {
    let size = options.font_size;
    let text_width = options.text.chars().count() as f64 * size * AVG_GLYPH_WIDTH;
    let (sin, cos) = options.angle.to_radians().sin_cos();

    // Put the centre of the text's baseline box on the page centre
    let half_w = text_width / 2.0;
    let half_h = size / 3.0;
    let tx = width / 2.0 - (cos * half_w - sin * half_h);
    let ty = height / 2.0 - (sin * half_w + cos * half_h);

    let real = |v: f64| Object::Real(v as f32);
    let content = Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(STATE_RESOURCE.as_bytes().to_vec())]),
            Operation::new("rg", vec![real(r), real(g), real(b)]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), real(size)],
            ),
            Operation::new(
                "Tm",
                vec![real(cos), real(sin), real(-sin), real(cos), real(tx), real(ty)],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(
                    win_ansi_bytes(&options.text),
                    StringFormat::Literal,
                )],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| ConvertError::OperationError(format!("Failed to encode watermark: {}", e)))?;

    // Streams of a page are concatenated, so start on a token boundary
    let mut overlay = b"\n".to_vec();
    overlay.extend(encoded);
    Ok(overlay)
}

/// The page's effective resources as an owned, inline dictionary
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc
            .get_dictionary(id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    }
}

/// Add `name -> id` to a resource category, copying shared sub-dictionaries
fn add_resource(doc: &Document, resources: &mut Dictionary, category: &[u8], name: &str, id: ObjectId) {
    let mut entries = match resources.get(category) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(r)) => doc
            .get_dictionary(*r)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };
    entries.set(name, Object::Reference(id));
    resources.set(category, entries);
}
