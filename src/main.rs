//! Receipt Extractor - turns uploaded receipts into transaction candidates.

mod config;
mod error;
mod llm;
mod ocr;
mod pdf_text;
mod processor;
mod receipt_store;
mod schema;
mod text_extractor;
mod transactions;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use config::AppConfig;
use error::ApiError;
use processor::ReceiptProcessor;
use receipt_store::ReceiptStore;
use schema::{ExtractedTransaction, MediaType, RawDocument, ReceiptRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    processor: Arc<ReceiptProcessor>,
    receipts: ReceiptStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "receipt_extractor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let client = reqwest::Client::new();
    let detector = config.text_detector(&client)?;
    let completion = config.completion(&client);

    let state = AppState {
        processor: Arc::new(ReceiptProcessor::new(detector, completion)),
        receipts: ReceiptStore::new(),
    };

    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/receipts", get(list_receipts))
        .route("/receipts/upload", post(upload_receipt))
        .route("/receipts/{id}", get(get_receipt))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    receipt: ReceiptRecord,
    extracted_transactions: Vec<ExtractedTransaction>,
}

/// Upload a receipt and extract transaction candidates from it.
///
/// An empty `extractedTransactions` list is a successful response; the client
/// decides how to tell the user nothing was found.
async fn upload_receipt(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("receipt").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?.to_vec();
            upload = Some((file_name, content_type, bytes));
            break;
        }
    }

    let (file_name, content_type, bytes) = upload
        .filter(|(_, _, bytes)| !bytes.is_empty())
        .ok_or(ApiError::MissingFile)?;

    let media_type = MediaType::resolve(content_type.as_deref(), &bytes).ok_or_else(|| {
        ApiError::UnsupportedMediaType(content_type.unwrap_or_else(|| "unknown".to_string()))
    })?;

    let content_hash = {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    };

    let document = RawDocument::new(file_name, media_type, bytes);
    info!(
        "Received file: {} ({} bytes, {})",
        document.file_name,
        document.bytes.len(),
        document.media_type.as_mime()
    );

    let id = state
        .receipts
        .insert(ReceiptRecord::new(&document, content_hash));

    let extracted_transactions = state.processor.process_receipt(&document).await;

    let receipt = state
        .receipts
        .mark_processed(&id, extracted_transactions.clone())
        .ok_or_else(|| ApiError::ReceiptNotFound(id.clone()))?;

    info!(
        "Receipt {} processed: {} transactions",
        id,
        extracted_transactions.len()
    );

    Ok(Json(UploadResponse {
        receipt,
        extracted_transactions,
    }))
}

/// List uploaded receipts, newest first.
async fn list_receipts(State(state): State<AppState>) -> Json<Vec<ReceiptRecord>> {
    Json(state.receipts.list())
}

/// Get a receipt by ID.
async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReceiptRecord>, ApiError> {
    state
        .receipts
        .get(&id)
        .map(Json)
        .ok_or(ApiError::ReceiptNotFound(id))
}
