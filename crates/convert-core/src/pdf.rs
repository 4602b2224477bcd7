//! Loading and saving PDFs through lopdf

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::{ConvertError, Result};

/// Parse PDF bytes into a mutable document.
///
/// Documents protected only by an owner password (empty user password) are
/// decrypted in place so later edits can be saved in the clear.
pub fn load_document(bytes: &[u8]) -> Result<Document> {
    if bytes.is_empty() {
        return Err(ConvertError::ParseError("empty input".into()));
    }

    let mut doc = Document::load_mem(bytes).map_err(|e| ConvertError::ParseError(e.to_string()))?;

    if doc.is_encrypted() {
        debug!("Input is encrypted, trying empty user password");
        doc.decrypt("")
            .map_err(|_| ConvertError::ParseError("document is password protected".into()))?;
    }

    Ok(doc)
}

/// Parse PDF bytes and return page count
pub fn page_count(bytes: &[u8]) -> Result<usize> {
    Ok(load_document(bytes)?.get_pages().len())
}

/// Serialize a document without further restructuring
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ConvertError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Reassemble a document for minimum size and serialize it.
///
/// Drops unreachable and empty objects, renumbers the survivors densely and
/// deflates every stream that is not already compressed.
pub fn pack_document(doc: &mut Document) -> Result<Vec<u8>> {
    doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.renumber_objects();
    doc.compress();
    save_document(doc)
}

/// Builds a new document page by page, for conversions that produce PDFs
pub(crate) struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl PdfBuilder {
    pub(crate) fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Register a shared object, such as a font or an image
    pub(crate) fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    pub(crate) fn add_page(&mut self, width: f64, height: f64, content: Vec<u8>, resources: Dictionary) {
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id);
    }

    pub(crate) fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Write the page tree and catalog, then serialize
    pub(crate) fn finish(mut self) -> Result<Vec<u8>> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => count,
                "Kids" => self.kids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();
        save_document(&mut self.doc)
    }
}

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic Parent chains in damaged files
const MAX_TREE_DEPTH: usize = 64;

/// Object id of the root Pages node
pub(crate) fn pages_root_id(doc: &Document) -> Result<ObjectId> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| ConvertError::ParseError("No Root in trailer".into()))?;

    doc.get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| ConvertError::ParseError("Catalog has no Pages reference".into()))
}

/// Page ids in document order
pub(crate) fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Look up a page attribute, walking up the Parent chain if needed
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        node_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Copy of a page dictionary with every inheritable attribute made explicit
pub(crate) fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| ConvertError::ParseError(format!("Page {:?}: {}", page_id, e)))?
        .clone();

    for key in INHERITABLE_KEYS {
        if !page.has(key) {
            if let Some(value) = inherited_attribute(doc, page_id, key) {
                page.set(key, value);
            }
        }
    }
    Ok(page)
}

/// Make `kids` the complete, flat page list under the root Pages node
pub(crate) fn set_page_tree(doc: &mut Document, root_id: ObjectId, kids: &[ObjectId]) -> Result<()> {
    for &kid in kids {
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(kid) {
            page.set("Parent", root_id);
        }
    }

    match doc.objects.get_mut(&root_id) {
        Some(Object::Dictionary(root)) => {
            root.set(
                "Kids",
                kids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
            );
            root.set("Count", kids.len() as i64);
            Ok(())
        }
        _ => Err(ConvertError::OperationError(
            "Invalid pages dictionary".into(),
        )),
    }
}

/// Page size from the (possibly inherited) MediaBox, Letter if absent
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| match obj {
            Object::Array(values) if values.len() == 4 => {
                let v: Vec<f64> = values.iter().filter_map(number_value).collect();
                (v.len() == 4).then(|| ((v[2] - v[0]).abs(), (v[3] - v[1]).abs()))
            }
            _ => None,
        });
    media_box.unwrap_or((612.0, 792.0))
}

/// Encode text for a simple font with WinAnsiEncoding.
///
/// Latin-1 characters map to their own code; anything else becomes `?`.
pub(crate) fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Read a name-valued entry, looking through a one-element array
pub(crate) fn name_value(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(items) if items.len() == 1 => name_value(&items[0]),
        _ => None,
    }
}

/// Read a numeric entry as f64, whether stored as integer or real
pub(crate) fn number_value(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(n) => Some(*n as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}
