//! Request and response bodies

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use convert_core::{CompressionReport, DocumentFormat, StoredFile};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// An uploaded file: its client-side name and base64 content
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    #[serde(default)]
    pub name: String,
    pub data: String,
}

impl UploadedFile {
    /// Decode the payload, accepting a `data:` URL prefix as browsers send it
    pub fn decode(&self) -> Result<Vec<u8>, ServerError> {
        let data = match self.data.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => self.data.as_str(),
        };
        let bytes = BASE64
            .decode(data.trim())
            .map_err(|e| ServerError::InvalidRequest(format!("{}: invalid base64: {}", self.label(), e)))?;
        if bytes.is_empty() {
            return Err(ServerError::InvalidRequest(format!(
                "{} is empty",
                self.label()
            )));
        }
        Ok(bytes)
    }

    fn label(&self) -> &str {
        if self.name.is_empty() {
            "upload"
        } else {
            &self.name
        }
    }
}

/// Decode every file of a multi-file upload
pub fn decode_all(files: &[UploadedFile]) -> Result<Vec<Vec<u8>>, ServerError> {
    files.iter().map(UploadedFile::decode).collect()
}

#[derive(Debug, Deserialize)]
pub struct FileRequest {
    pub file: UploadedFile,
}

#[derive(Debug, Deserialize)]
pub struct FilesRequest {
    #[serde(default)]
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    pub file: UploadedFile,
    /// Page range expression like `"1,3,5-7"`; first page when absent
    pub pages: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompressRequest {
    pub file: UploadedFile,
    /// `low`, `medium` or `high`
    pub quality: Option<String>,
    pub target_size_kb: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RotateRequest {
    pub file: UploadedFile,
    pub angle: i64,
    /// All pages when absent
    pub pages: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WatermarkRequest {
    pub file: UploadedFile,
    #[serde(default)]
    pub text: String,
    pub font_size: Option<f64>,
    pub opacity: Option<f64>,
    pub color: Option<String>,
    pub angle: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ProtectRequest {
    pub file: UploadedFile,
    pub password: Option<String>,
    pub owner_password: Option<String>,
}

/// A stored output, as returned to clients
#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub id: String,
    pub filename: String,
    pub size_bytes: usize,
    pub download_url: String,
}

impl FileInfo {
    pub fn new(stored: &StoredFile, size_bytes: usize) -> Self {
        Self {
            download_url: format!("/api/files/{}", stored.id),
            id: stored.id.clone(),
            filename: stored.filename.clone(),
            size_bytes,
        }
    }
}

/// Processing metrics for one request
#[derive(Debug, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    /// Pages in the output, when it is a PDF
    pub page_count: Option<usize>,
    pub processing_time_ms: u64,
}

/// Compression outcome, reported on `/api/compress`
#[derive(Debug, Serialize)]
pub struct CompressionSummary {
    pub original_size: usize,
    pub output_size: usize,
    pub target_bytes: Option<usize>,
    pub target_reached: bool,
    pub attempts: usize,
    pub reencoded_images: usize,
    pub skipped_images: usize,
}

impl From<&CompressionReport> for CompressionSummary {
    fn from(report: &CompressionReport) -> Self {
        Self {
            original_size: report.original_size,
            output_size: report.output_size,
            target_bytes: report.target_bytes,
            target_reached: report.target_reached(),
            attempts: report.attempts.len(),
            reencoded_images: report.reencoded_images(),
            skipped_images: report.skipped_images(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub success: bool,
    pub file: FileInfo,
    pub metrics: ProcessMetrics,
    /// Pages rotated or watermarked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_affected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionSummary>,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    pub filename: String,
    pub format: DocumentFormat,
    pub size_bytes: usize,
    pub page_count: Option<usize>,
}

/// Output name derived from an upload name.
///
/// `("report.pdf", Some("compressed"), "pdf")` gives `report_compressed.pdf`;
/// `("deck.pptx", None, "pdf")` gives `deck.pdf`.
pub fn output_name(upload_name: &str, suffix: Option<&str>, extension: &str) -> String {
    let base = upload_name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => base,
    };
    let stem = stem.trim_start_matches('.');
    let stem = if stem.is_empty() { "document" } else { stem };

    match suffix {
        Some(suffix) => format!("{}_{}.{}", stem, suffix, extension),
        None => format!("{}.{}", stem, extension),
    }
}

/// Content type for a stored file, from its extension
pub fn content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}
