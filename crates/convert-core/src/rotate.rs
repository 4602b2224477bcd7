//! Page rotation

use std::collections::BTreeSet;

use lopdf::Object;
use tracing::info;

use crate::error::{ConvertError, Result};
use crate::page_range::PageSelection;
use crate::pdf::{inherited_attribute, load_document, pack_document, page_ids};

/// Rotate pages clockwise by `angle` degrees.
///
/// `angle` must be a multiple of 90; negative values rotate counterclockwise.
/// The new `/Rotate` is always written on the page itself, normalised to
/// `0..360`. `None` rotates every page. A page listed more than once in the
/// selection is still rotated once.
///
/// Returns the output and the number of pages rotated.
pub fn rotate_pages(
    bytes: &[u8],
    angle: i64,
    selection: Option<&PageSelection>,
) -> Result<(Vec<u8>, usize)> {
    if angle % 90 != 0 {
        return Err(ConvertError::InvalidOption(format!(
            "rotation angle must be a multiple of 90, got {}",
            angle
        )));
    }

    let mut doc = load_document(bytes)?;
    let pages = page_ids(&doc);

    let every_page;
    let selection = match selection {
        Some(selection) => selection,
        None => {
            every_page = PageSelection::all(pages.len());
            &every_page
        }
    };
    let targets: BTreeSet<usize> = selection
        .indices()
        .iter()
        .copied()
        .filter(|&i| i < pages.len())
        .collect();

    for &index in &targets {
        let page_id = pages[index];
        let current = inherited_attribute(&doc, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        let rotation = (current.rem_euclid(360) + angle.rem_euclid(360)) % 360;

        let page = doc
            .get_dictionary_mut(page_id)
            .map_err(|e| ConvertError::ParseError(format!("Page {}: {}", index + 1, e)))?;
        page.set("Rotate", Object::Integer(rotation));
    }

    let output = pack_document(&mut doc)?;
    info!("Rotated {} page(s) by {} degrees", targets.len(), angle);
    Ok((output, targets.len()))
}
