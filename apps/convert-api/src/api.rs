//! API handlers for the conversion server
//!
//! Every document endpoint follows the same path: decode the upload, check
//! cheap options up front, run the document work on the blocking pool, store
//! the output and answer with its download handle and timing metrics.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use convert_core::convert::{
    docx_to_pdf, images_to_pdf, pdf_to_docx, pdf_to_text, pptx_to_pdf,
};
use convert_core::page_range::parse_tokens;
use convert_core::{
    apply_watermark, compress, detect_format, extract_pages, merge_documents, page_count,
    protect_pdf, resolve, rotate_pages, CompressOptions, DocumentFormat, ProtectOptions,
    StoreError, WatermarkOptions,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ServerError;
use crate::models::{
    content_type, decode_all, output_name, CompressRequest, CompressionSummary, FileInfo,
    FileRequest, FilesRequest, InfoResponse, OperationResponse, ProcessMetrics, ProtectRequest,
    RotateRequest, SplitRequest, WatermarkRequest,
};
use crate::AppState;

type ApiResult<T> = Result<Json<T>, ServerError>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "convert-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Result of a document job, before it is stored
struct JobOutput {
    bytes: Vec<u8>,
    filename: String,
    pages_affected: Option<usize>,
    compression: Option<CompressionSummary>,
}

impl JobOutput {
    fn new(bytes: Vec<u8>, filename: String) -> Self {
        Self {
            bytes,
            filename,
            pages_affected: None,
            compression: None,
        }
    }
}

/// Run `job` on the blocking pool, store its output and build the response
async fn run_job<F>(
    state: &AppState,
    operation: &'static str,
    input_size: usize,
    job: F,
) -> ApiResult<OperationResponse>
where
    F: FnOnce() -> convert_core::Result<JobOutput> + Send + 'static,
{
    let started = Instant::now();
    let store = Arc::clone(&state.store);

    let (output, stored, pages) = tokio::task::spawn_blocking(move || {
        let output = job()?;
        let pages = match detect_format(&output.bytes) {
            DocumentFormat::Pdf => page_count(&output.bytes).ok(),
            _ => None,
        };
        let stored = store.put(&output.bytes, &output.filename)?;
        Ok::<_, ServerError>((output, stored, pages))
    })
    .await
    .map_err(|e| ServerError::Internal(format!("{} worker failed: {}", operation, e)))??;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let output_size = output.bytes.len();
    info!(
        "{}: {} -> {} bytes in {}ms ({})",
        operation, input_size, output_size, elapsed_ms, stored.filename
    );

    Ok(Json(OperationResponse {
        success: true,
        file: FileInfo::new(&stored, output_size),
        metrics: ProcessMetrics {
            input_size_bytes: input_size,
            output_size_bytes: output_size,
            page_count: pages,
            processing_time_ms: elapsed_ms,
        },
        pages_affected: output.pages_affected,
        compression: output.compression,
    }))
}

/// Reject a malformed page expression before any document work starts
fn check_pages(pages: Option<&str>) -> Result<(), ServerError> {
    if let Some(expression) = pages {
        parse_tokens(expression)?;
    }
    Ok(())
}

/// Handler: POST /api/info
pub async fn handle_info(Json(req): Json<FileRequest>) -> ApiResult<InfoResponse> {
    let bytes = req.file.decode()?;
    let format = detect_format(&bytes);
    let size_bytes = bytes.len();

    let pages = match format {
        DocumentFormat::Pdf => Some(
            tokio::task::spawn_blocking(move || page_count(&bytes))
                .await
                .map_err(|e| ServerError::Internal(format!("info worker failed: {}", e)))??,
        ),
        _ => None,
    };
    debug!("Info for {}: {} ({:?} pages)", req.file.name, format, pages);

    Ok(Json(InfoResponse {
        success: true,
        filename: req.file.name,
        format,
        size_bytes,
        page_count: pages,
    }))
}

/// Handler: POST /api/merge
pub async fn handle_merge(
    State(state): State<AppState>,
    Json(req): Json<FilesRequest>,
) -> ApiResult<OperationResponse> {
    let first = req
        .files
        .first()
        .ok_or_else(|| ServerError::InvalidRequest("no files uploaded".into()))?;
    let filename = output_name(&first.name, Some("merged"), "pdf");
    let inputs = decode_all(&req.files)?;
    let input_size = inputs.iter().map(Vec::len).sum();

    run_job(&state, "merge", input_size, move || {
        Ok(JobOutput::new(merge_documents(inputs)?, filename))
    })
    .await
}

/// Handler: POST /api/split
pub async fn handle_split(
    State(state): State<AppState>,
    Json(req): Json<SplitRequest>,
) -> ApiResult<OperationResponse> {
    check_pages(req.pages.as_deref())?;
    let bytes = req.file.decode()?;
    let filename = output_name(&req.file.name, Some("split"), "pdf");

    run_job(&state, "split", bytes.len(), move || {
        let selection = resolve(req.pages.as_deref(), page_count(&bytes)?)?;
        let output = extract_pages(&bytes, &selection)?;
        Ok(JobOutput::new(output, filename))
    })
    .await
}

/// Handler: POST /api/compress
pub async fn handle_compress(
    State(state): State<AppState>,
    Json(req): Json<CompressRequest>,
) -> ApiResult<OperationResponse> {
    let options = CompressOptions::from_request(req.quality.as_deref(), req.target_size_kb)?;
    let bytes = req.file.decode()?;
    let filename = output_name(&req.file.name, Some("compressed"), "pdf");

    run_job(&state, "compress", bytes.len(), move || {
        let (output, report) = compress(&bytes, &options)?;
        Ok(JobOutput {
            compression: Some(CompressionSummary::from(&report)),
            ..JobOutput::new(output, filename)
        })
    })
    .await
}

/// Handler: POST /api/rotate
pub async fn handle_rotate(
    State(state): State<AppState>,
    Json(req): Json<RotateRequest>,
) -> ApiResult<OperationResponse> {
    let pages = req.pages.filter(|p| !p.trim().is_empty());
    check_pages(pages.as_deref())?;
    let bytes = req.file.decode()?;
    let filename = output_name(&req.file.name, Some("rotated"), "pdf");
    let angle = req.angle;

    run_job(&state, "rotate", bytes.len(), move || {
        let selection = match pages {
            Some(expression) => Some(resolve(Some(&expression), page_count(&bytes)?)?),
            None => None,
        };
        let (output, rotated) = rotate_pages(&bytes, angle, selection.as_ref())?;
        Ok(JobOutput {
            pages_affected: Some(rotated),
            ..JobOutput::new(output, filename)
        })
    })
    .await
}

/// Handler: POST /api/watermark
pub async fn handle_watermark(
    State(state): State<AppState>,
    Json(req): Json<WatermarkRequest>,
) -> ApiResult<OperationResponse> {
    let defaults = WatermarkOptions::default();
    let options = WatermarkOptions {
        text: req.text,
        font_size: req.font_size.unwrap_or(defaults.font_size),
        opacity: req.opacity.unwrap_or(defaults.opacity),
        color: req.color.unwrap_or(defaults.color),
        angle: req.angle.unwrap_or(defaults.angle),
    };
    let bytes = req.file.decode()?;
    let filename = output_name(&req.file.name, Some("watermarked"), "pdf");

    run_job(&state, "watermark", bytes.len(), move || {
        let (output, pages) = apply_watermark(&bytes, &options)?;
        Ok(JobOutput {
            pages_affected: Some(pages),
            ..JobOutput::new(output, filename)
        })
    })
    .await
}

/// Handler: POST /api/protect
pub async fn handle_protect(
    State(state): State<AppState>,
    Json(req): Json<ProtectRequest>,
) -> ApiResult<OperationResponse> {
    let options = ProtectOptions {
        user_password: req.password,
        owner_password: req.owner_password,
    };
    let bytes = req.file.decode()?;
    let filename = output_name(&req.file.name, Some("protected"), "pdf");

    run_job(&state, "protect", bytes.len(), move || {
        Ok(JobOutput::new(protect_pdf(&bytes, &options)?, filename))
    })
    .await
}

/// Handler: POST /api/convert/images-to-pdf
pub async fn handle_images_to_pdf(
    State(state): State<AppState>,
    Json(req): Json<FilesRequest>,
) -> ApiResult<OperationResponse> {
    let first = req
        .files
        .first()
        .ok_or_else(|| ServerError::InvalidRequest("no images uploaded".into()))?;
    let filename = output_name(&first.name, None, "pdf");
    let images = decode_all(&req.files)?;
    let input_size = images.iter().map(Vec::len).sum();

    run_job(&state, "images-to-pdf", input_size, move || {
        Ok(JobOutput::new(images_to_pdf(images)?, filename))
    })
    .await
}

/// Handler: POST /api/convert/pdf-to-text
pub async fn handle_pdf_to_text(
    State(state): State<AppState>,
    Json(req): Json<FileRequest>,
) -> ApiResult<OperationResponse> {
    let bytes = req.file.decode()?;
    let filename = output_name(&req.file.name, None, "txt");

    run_job(&state, "pdf-to-text", bytes.len(), move || {
        let text = pdf_to_text(&bytes)?;
        Ok(JobOutput::new(text.into_bytes(), filename))
    })
    .await
}

/// Handler: POST /api/convert/pdf-to-word
pub async fn handle_pdf_to_word(
    State(state): State<AppState>,
    Json(req): Json<FileRequest>,
) -> ApiResult<OperationResponse> {
    let bytes = req.file.decode()?;
    let filename = output_name(&req.file.name, None, "docx");

    run_job(&state, "pdf-to-word", bytes.len(), move || {
        Ok(JobOutput::new(pdf_to_docx(&bytes)?, filename))
    })
    .await
}

/// Handler: POST /api/convert/word-to-pdf
pub async fn handle_word_to_pdf(
    State(state): State<AppState>,
    Json(req): Json<FileRequest>,
) -> ApiResult<OperationResponse> {
    let bytes = req.file.decode()?;
    let filename = output_name(&req.file.name, None, "pdf");

    run_job(&state, "word-to-pdf", bytes.len(), move || {
        Ok(JobOutput::new(docx_to_pdf(&bytes)?, filename))
    })
    .await
}

/// Handler: POST /api/convert/ppt-to-pdf
pub async fn handle_ppt_to_pdf(
    State(state): State<AppState>,
    Json(req): Json<FileRequest>,
) -> ApiResult<OperationResponse> {
    let bytes = req.file.decode()?;
    let filename = output_name(&req.file.name, None, "pdf");

    run_job(&state, "ppt-to-pdf", bytes.len(), move || {
        Ok(JobOutput::new(pptx_to_pdf(&bytes)?, filename))
    })
    .await
}

/// Handler: GET /api/files/:id
pub async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let store = Arc::clone(&state.store);
    let (file, bytes) = tokio::task::spawn_blocking(move || {
        let file = store.lookup(&id)?;
        let bytes = store.get(&file)?;
        Ok::<_, StoreError>((file, bytes))
    })
    .await
    .map_err(|e| ServerError::Internal(format!("download worker failed: {}", e)))??;

    debug!("Serving {} ({} bytes)", file.filename, bytes.len());
    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, content_type(&file.filename).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
