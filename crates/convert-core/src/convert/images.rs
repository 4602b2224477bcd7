//! Images to PDF, one page per image

use std::io::{Cursor, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, DynamicImage, ImageDecoder};
use lopdf::{dictionary, Dictionary, Object, Stream};
use tracing::{debug, info};

use super::{detect_format, DocumentFormat};
use crate::error::{ConvertError, Result};
use crate::pdf::PdfBuilder;

const IMAGE_RESOURCE: &str = "Im0";

/// Build a PDF with one page per image, each page the image's pixel size.
///
/// JPEGs are embedded unchanged as DCTDecode streams. Other raster formats
/// are decoded and stored as Flate-compressed RGB, with a soft mask when the
/// image has an alpha channel.
pub fn images_to_pdf(images: Vec<Vec<u8>>) -> Result<Vec<u8>> {
    if images.is_empty() {
        return Err(ConvertError::MissingOption("images"));
    }

    let mut builder = PdfBuilder::new();
    for (i, bytes) in images.iter().enumerate() {
        let embedded = match detect_format(bytes) {
            DocumentFormat::Jpeg => embed_jpeg(bytes),
            DocumentFormat::Png => embed_decoded(bytes),
            other => Err(ConvertError::Unsupported(format!(
                "image {} is {}, not an image",
                i + 1,
                other
            ))),
        }
        .map_err(|e| match e {
            ConvertError::ParseError(msg) => {
                ConvertError::ParseError(format!("image {}: {}", i + 1, msg))
            }
            other => other,
        })?;

        let EmbeddedImage {
            mut stream,
            mask,
            width,
            height,
        } = embedded;
        debug!("Image {}: {}x{}", i + 1, width, height);

        if let Some(mask) = mask {
            let mask_id = builder.add_object(mask);
            stream.dict.set("SMask", mask_id);
        }
        let image_id = builder.add_object(stream);
        let (w, h) = (f64::from(width), f64::from(height));
        let content = format!("q {} 0 0 {} 0 0 cm /{} Do Q", w, h, IMAGE_RESOURCE).into_bytes();
        builder.add_page(
            w,
            h,
            content,
            dictionary! { "XObject" => dictionary! { IMAGE_RESOURCE => image_id } },
        );
    }

    info!("Converted {} image(s) to PDF", builder.page_count());
    builder.finish()
}

struct EmbeddedImage {
    stream: Stream,
    /// Soft mask from the alpha channel
    mask: Option<Stream>,
    width: u32,
    height: u32,
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    }
}

fn embed_jpeg(bytes: &[u8]) -> Result<EmbeddedImage> {
    let decoder = JpegDecoder::new(Cursor::new(bytes))
        .map_err(|e| ConvertError::ParseError(format!("invalid JPEG: {}", e)))?;
    let (width, height) = decoder.dimensions();
    // The decoder reports CMYK as RGB after converting, so the component
    // count comes from the frame header instead.
    let header = scan_jpeg_header(bytes);
    let color_space = jpeg_color_space(header, decoder.color_type());

    let mut dict = image_dict(width, height, color_space);
    dict.set("Filter", "DCTDecode");
    if color_space == "DeviceCMYK" && header.adobe {
        // Adobe writes CMYK samples inverted
        let decode = [1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer).to_vec();
        dict.set("Decode", decode);
    }
    let mut stream = Stream::new(dict, bytes.to_vec());
    stream.allows_compression = false;

    Ok(EmbeddedImage {
        stream,
        mask: None,
        width,
        height,
    })
}

/// What the JPEG marker segments say about the samples
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct JpegHeader {
    /// Component count from the start-of-frame segment
    components: Option<u8>,
    /// An Adobe APP14 segment is present
    adobe: bool,
}

/// Walk the marker segments up to the start of scan
fn scan_jpeg_header(bytes: &[u8]) -> JpegHeader {
    let mut header = JpegHeader::default();
    let mut pos = 2;

    while pos + 1 < bytes.len() && bytes[pos] == 0xFF {
        let marker = bytes[pos + 1];
        match marker {
            // fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD8 => {
                pos += 2;
                continue;
            }
            0xD9 | 0xDA => break,
            _ => {}
        }

        let Some(&[hi, lo]) = bytes.get(pos + 2..pos + 4) else {
            break;
        };
        let length = usize::from(u16::from_be_bytes([hi, lo]));
        let Some(segment) = bytes.get(pos + 4..pos + 2 + length.max(2)) else {
            break;
        };

        match marker {
            0xEE if segment.starts_with(b"Adobe") => header.adobe = true,
            // SOF0..SOF15, skipping DHT, JPG and DAC
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                header.components = segment.get(5).copied();
            }
            _ => {}
        }
        pos += 2 + length.max(2);
    }

    header
}

fn jpeg_color_space(header: JpegHeader, decoded: ColorType) -> &'static str {
    match header.components {
        Some(1) => "DeviceGray",
        Some(3) => "DeviceRGB",
        Some(4) => "DeviceCMYK",
        _ => match decoded {
            ColorType::L8 | ColorType::L16 => "DeviceGray",
            _ => "DeviceRGB",
        },
    }
}

fn embed_decoded(bytes: &[u8]) -> Result<EmbeddedImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ConvertError::ParseError(format!("could not decode image: {}", e)))?;
    let (width, height) = (img.width(), img.height());

    let mut dict = image_dict(width, height, "DeviceRGB");
    dict.set("Filter", "FlateDecode");
    let mask = if img.color().has_alpha() {
        Some(alpha_mask(&img)?)
    } else {
        None
    };

    let rgb = deflate(img.to_rgb8().as_raw())?;
    let mut stream = Stream::new(dict, rgb);
    stream.allows_compression = false;

    Ok(EmbeddedImage {
        stream,
        mask,
        width,
        height,
    })
}

/// Soft-mask image holding the alpha channel
fn alpha_mask(img: &DynamicImage) -> Result<Stream> {
    let alpha: Vec<u8> = img.to_rgba8().pixels().map(|p| p.0[3]).collect();
    let mut dict = image_dict(img.width(), img.height(), "DeviceGray");
    dict.set("Filter", "FlateDecode");
    let mut stream = Stream::new(dict, deflate(&alpha)?);
    stream.allows_compression = false;
    Ok(stream)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| ConvertError::OperationError(format!("Deflate failed: {}", e)))
}
