//! Document conversion server
//!
//! A JSON API over `convert-core`: uploads arrive base64-encoded, each
//! operation runs on the blocking pool and its output is written to a
//! content store, from where clients download it by id.
//!
//! - PDF editing: merge, split, compress, rotate, watermark, protect
//! - Conversions: images, text, Word and PowerPoint
//! - Downloads: `GET /api/files/:id`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use convert_core::{ContentStore, DiskStore};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
mod models;
#[cfg(test)]
mod tests;

use api::{
    handle_compress, handle_download, handle_health, handle_images_to_pdf, handle_info,
    handle_merge, handle_pdf_to_text, handle_pdf_to_word, handle_ppt_to_pdf, handle_protect,
    handle_rotate, handle_split, handle_watermark, handle_word_to_pdf,
};

/// Command-line arguments for the conversion server
#[derive(Parser, Debug)]
#[command(name = "convert-api")]
#[command(about = "HTTP API for PDF editing and document conversion")]
struct Args {
    /// Host address to bind to
    #[arg(long, env = "CONVERT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Directory generated files are written to
    #[arg(long, env = "CONVERT_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "CONVERT_MAX_UPLOAD_MB", default_value = "50")]
    max_upload_mb: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
}

impl AppState {
    pub fn new(store: impl ContentStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Request body limit for a given upload limit.
///
/// Uploads travel base64-encoded inside JSON, which is 4/3 of the raw size,
/// plus room for the surrounding fields.
pub fn body_limit(max_upload_mb: usize) -> usize {
    let raw = max_upload_mb.saturating_mul(1024 * 1024);
    raw.saturating_add(raw / 3).saturating_add(64 * 1024)
}

/// Build the router with every route and middleware layer
pub fn app(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // PDF operations
        .route("/api/info", post(handle_info))
        .route("/api/merge", post(handle_merge))
        .route("/api/split", post(handle_split))
        .route("/api/compress", post(handle_compress))
        .route("/api/rotate", post(handle_rotate))
        .route("/api/watermark", post(handle_watermark))
        .route("/api/protect", post(handle_protect))
        // Conversions
        .route("/api/convert/images-to-pdf", post(handle_images_to_pdf))
        .route("/api/convert/pdf-to-text", post(handle_pdf_to_text))
        .route("/api/convert/pdf-to-word", post(handle_pdf_to_word))
        .route("/api/convert/word-to-pdf", post(handle_word_to_pdf))
        .route("/api/convert/ppt-to-pdf", post(handle_ppt_to_pdf))
        // Generated files
        .route("/api/files/:id", get(handle_download))
        // Apply middleware
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting convert-api on {}:{}", args.host, args.port);

    let store = DiskStore::new(&args.output_dir)?;
    let state = AppState::new(store);
    let app = app(state, body_limit(args.max_upload_mb));

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Output directory: {}", args.output_dir.display());
    info!("Upload limit: {} MB", args.max_upload_mb);

    axum::serve(listener, app).await?;

    Ok(())
}
