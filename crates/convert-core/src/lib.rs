//! Document operations behind the conversion API
//!
//! Every operation takes input bytes and returns output bytes, built on
//! lopdf for PDF structure and the `image` crate for raster work:
//! - `merge` / `split` / `rotate` / `watermark` / `protect`: PDF editing
//! - `recompress`: image recompression, optionally to a target size
//! - `convert`: images, text, Word and PowerPoint to and from PDF
//!
//! Page selections are written as 1-based range expressions and resolved by
//! [`page_range::resolve`]. Results are handed to a [`store::ContentStore`].

pub mod convert;
pub mod error;
pub mod merge;
pub mod page_range;
pub mod pdf;
pub mod protect;
pub mod recompress;
pub mod rotate;
pub mod split;
pub mod store;
pub mod watermark;

#[cfg(test)]
mod testing;

pub use convert::{detect_format, DocumentFormat};
pub use error::{ConvertError, Result};
pub use merge::merge_documents;
pub use page_range::{resolve, PageSelection};
pub use pdf::page_count;
pub use protect::{protect_pdf, ProtectOptions};
pub use recompress::{compress, CompressOptions, CompressionReport, QualityTier};
pub use rotate::rotate_pages;
pub use split::extract_pages;
pub use store::{ContentStore, DiskStore, MemoryStore, StoreError, StoredFile};
pub use watermark::{apply_watermark, WatermarkOptions};
