//! PDF merge
//!
//! Combines multiple PDFs into a single document.

use lopdf::{Document, Object, ObjectId};
use tracing::info;

use crate::error::{ConvertError, Result};
use crate::pdf::{flatten_page, load_document, pack_document, page_ids, pages_root_id, set_page_tree};

/// Merge multiple PDFs into one, pages in input order
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, return it as-is once it is known to parse
/// 3. Use the first document as the destination
/// 4. For each further document:
///    a. Make every page self-contained (inherited attributes copied down)
///    b. Import all objects with IDs shifted past the destination's
///    c. Append its pages to the destination page list
/// 5. Rebuild the root page tree, pack and return the merged result
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>> {
    if documents.is_empty() {
        return Err(ConvertError::OperationError("No documents to merge".into()));
    }

    if documents.len() == 1 {
        let single = documents.into_iter().next().unwrap_or_default();
        load_document(&single)?;
        return Ok(single);
    }

    let mut loaded = Vec::with_capacity(documents.len());
    for (i, bytes) in documents.iter().enumerate() {
        let mut doc = load_document(bytes).map_err(|e| {
            ConvertError::ParseError(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        let pages = flatten_pages(&mut doc)?;
        loaded.push((doc, pages));
    }

    let mut loaded = loaded.into_iter();
    let Some((mut dest, mut dest_pages)) = loaded.next() else {
        return Err(ConvertError::OperationError("No documents to merge".into()));
    };
    let root_id = pages_root_id(&dest)?;
    let mut max_id = dest.max_id;

    for (source, source_pages) in loaded {
        let offset = max_id;

        for (old_id, mut object) in source.objects {
            remap_object_refs(&mut object, offset);
            dest.objects.insert((old_id.0 + offset, old_id.1), object);
        }
        dest_pages.extend(source_pages.iter().map(|id| (id.0 + offset, id.1)));

        max_id = max_id.max(source.max_id + offset);
    }

    dest.max_id = max_id;
    set_page_tree(&mut dest, root_id, &dest_pages)?;

    let merged = pack_document(&mut dest)?;
    info!(
        "Merged {} documents into {} pages ({} bytes)",
        documents.len(),
        dest_pages.len(),
        merged.len()
    );
    Ok(merged)
}

/// Copy inherited attributes into each page so it survives reparenting
fn flatten_pages(doc: &mut Document) -> Result<Vec<ObjectId>> {
    let pages = page_ids(doc);
    for &id in &pages {
        let page = flatten_page(doc, id)?;
        doc.objects.insert(id, Object::Dictionary(page));
    }
    Ok(pages)
}

/// Shift every object reference inside `obj` by `offset`
fn remap_object_refs(obj: &mut Object, offset: u32) {
    match obj {
        Object::Reference(id) => id.0 += offset,
        Object::Array(items) => items
            .iter_mut()
            .for_each(|item| remap_object_refs(item, offset)),
        Object::Dictionary(dict) => dict
            .iter_mut()
            .for_each(|(_, value)| remap_object_refs(value, offset)),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .for_each(|(_, value)| remap_object_refs(value, offset)),
        _ => {}
    }
}
