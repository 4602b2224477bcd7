//! Fixture builders shared by the unit tests

use std::io::{Cursor, Write};

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Create a simple PDF with N pages, each showing "Page N"
pub fn create_test_pdf(num_pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", i + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        page_ids.push(page_id);
    }

    finish_document(doc, pages_id, page_ids)
}

/// Encode a noisy RGB test image as JPEG
pub fn create_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)).wrapping_mul(2654435761) >> 24;
        image::Rgb([v as u8, (x % 256) as u8, (y % 256) as u8])
    });
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode(img.as_raw(), width, height, ColorType::Rgb8)
        .unwrap();
    bytes
}

/// Create a one-page PDF per image stream, each drawing that image
pub fn create_pdf_with_images(images: Vec<Stream>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for image in images {
        let image_id = doc.add_object(image);
        let content = b"q 612 0 0 792 0 0 cm /Im0 Do Q".to_vec();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        page_ids.push(page_id);
    }

    finish_document(doc, pages_id, page_ids)
}

/// An image XObject wrapping JPEG bytes
pub fn jpeg_image_stream(jpeg: Vec<u8>, width: u32, height: u32) -> Stream {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    let mut stream = Stream::new(dict, jpeg);
    stream.allows_compression = false;
    stream
}

/// A JPEG image XObject whose samples live in an external file
pub fn external_jpeg_image_stream(jpeg: Vec<u8>, width: u32, height: u32) -> Stream {
    let mut stream = jpeg_image_stream(jpeg, width, height);
    stream.dict.set("F", Object::string_literal("photo.jpg"));
    stream.dict.set("FFilter", "DCTDecode");
    stream
}

/// A DCT-encoded stencil mask (`/ImageMask true`)
pub fn stencil_mask_stream(jpeg: Vec<u8>, width: u32, height: u32) -> Stream {
    let mut stream = jpeg_image_stream(jpeg, width, height);
    stream.dict.remove(b"ColorSpace");
    stream.dict.set("ImageMask", true);
    stream.dict.set("BitsPerComponent", 1);
    stream
}

/// An uncompressed gray image XObject (not eligible for JPEG recompression)
pub fn raw_gray_image_stream(width: u32, height: u32) -> Stream {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceGray",
        "BitsPerComponent" => 8,
    };
    Stream::new(dict, vec![128u8; (width * height) as usize])
}

/// Create a one-page PDF that draws one JPEG image
pub fn create_pdf_with_jpeg(width: u32, height: u32) -> Vec<u8> {
    let jpeg = create_jpeg(width, height, 95);
    create_pdf_with_images(vec![jpeg_image_stream(jpeg, width, height)])
}

fn finish_document(mut doc: Document, pages_id: ObjectId, page_ids: Vec<ObjectId>) -> Vec<u8> {
    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => count,
            "Kids" => page_ids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Build a minimal .docx whose body holds the given paragraphs
pub fn create_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    create_zip(&[("word/document.xml", document)])
}

/// Build a minimal .pptx where each slide holds the given text boxes
pub fn create_pptx(slides: &[&[&str]]) -> Vec<u8> {
    let entries: Vec<(String, String)> = slides
        .iter()
        .enumerate()
        .map(|(i, boxes)| {
            let shapes: String = boxes
                .iter()
                .map(|text| {
                    format!(
                        "<p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>",
                        text
                    )
                })
                .collect();
            let xml = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>"#,
                shapes
            );
            (format!("ppt/slides/slide{}.xml", i + 1), xml)
        })
        .collect();
    let refs: Vec<(&str, String)> = entries
        .iter()
        .map(|(name, xml)| (name.as_str(), xml.clone()))
        .collect();
    create_zip(&refs)
}

fn create_zip(entries: &[(&str, String)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
