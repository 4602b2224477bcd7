//! PDF page extraction
//!
//! Builds a document holding exactly the pages of a [`PageSelection`], in
//! selection order. Everything the kept pages do not reference is pruned.

use std::collections::HashSet;

use lopdf::Object;
use tracing::info;

use crate::error::{ConvertError, Result};
use crate::page_range::PageSelection;
use crate::pdf::{flatten_page, load_document, pack_document, page_ids, pages_root_id, set_page_tree};

/// Extract the selected pages into a new PDF
///
/// 1. Reject an empty selection
/// 2. Flatten each selected page so inherited attributes travel with it
/// 3. The first use of a page reuses its object; repeats get a clone
/// 4. Replace the page tree with the flat list and prune the rest
pub fn extract_pages(bytes: &[u8], selection: &PageSelection) -> Result<Vec<u8>> {
    if selection.is_empty() {
        return Err(ConvertError::InvalidRange("no pages selected".into()));
    }

    let mut doc = load_document(bytes)?;
    let pages = page_ids(&doc);

    if let Some(&bad) = selection.indices().iter().find(|&&i| i >= pages.len()) {
        return Err(ConvertError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            bad + 1,
            pages.len()
        )));
    }

    let root_id = pages_root_id(&doc)?;
    let mut used = HashSet::new();
    let mut kids = Vec::with_capacity(selection.len());

    for &index in selection.indices() {
        let page_id = pages[index];
        let page = flatten_page(&doc, page_id)?;

        let id = if used.insert(page_id) {
            doc.objects.insert(page_id, Object::Dictionary(page));
            page_id
        } else {
            doc.add_object(page)
        };
        kids.push(id);
    }

    set_page_tree(&mut doc, root_id, &kids)?;

    let output = pack_document(&mut doc)?;
    info!(
        "Extracted {} of {} pages ({} bytes)",
        kids.len(),
        pages.len(),
        output.len()
    );
    Ok(output)
}
