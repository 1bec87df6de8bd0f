//! HTTP boundary
//!
//! Exposes the processor over three routes:
//!
//! - `POST /api/remove-background` takes a multipart upload and returns the
//!   composited PNG as an attachment
//! - `GET /health` always reports `{"status": "ok", "model": "active"}`
//! - `GET /` and anything else under the static directory serves files
//!
//! Every failure leaves the server as a JSON `{"error": ...}` body. Processing
//! errors are logged with their details and answered with a generic message.

use crate::config::ServerConfig;
use crate::error::{BgRemovalError, Result};
use crate::processor::BackgroundRemovalProcessor;
use crate::tracing_config::spans;
use crate::utils::UploadValidator;
use bytes::BufMut;
use futures_util::TryStreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::Instrument;
use warp::http::header::{HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Multipart field carrying the uploaded image
pub const IMAGE_FIELD: &str = "image";

/// Optional multipart field toggling enhancement for one request
pub const ENHANCE_FIELD: &str = "enhance";

/// Response header carrying the per-request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const REMOVE_BACKGROUND_ROUTE: &str = "/api/remove-background";

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    model: &'static str,
}

/// State shared by every request handler
#[derive(Debug, Clone)]
pub struct AppState {
    processor: Arc<BackgroundRemovalProcessor>,
    config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(processor: BackgroundRemovalProcessor, config: ServerConfig) -> Self {
        Self {
            processor: Arc::new(processor),
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn processor(&self) -> &BackgroundRemovalProcessor {
        &self.processor
    }
}

/// Fields of an upload after the multipart body has been read
#[derive(Debug, Default)]
struct UploadForm {
    /// Client filename and file contents of the `image` field
    image: Option<(String, Vec<u8>)>,
    enhance: Option<bool>,
}

/// Interpret a form value as a boolean switch
///
/// `true`, `1`, `yes` and `on` (any case) enable; everything else disables.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn json_error(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorBody { error: message }), status)
        .into_response()
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Build the complete route tree for `state`
///
/// The returned filter never rejects, which lets it be driven directly by
/// `warp::test::request()`.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&HealthBody {
                status: "ok",
                model: "active",
            })
        });

    let upload = warp::path!("api" / "remove-background")
        .and(warp::post())
        .and(warp::multipart::form().max_length(state.config.max_content_length))
        .and(with_state(state.clone()))
        .and_then(remove_background);

    let index = warp::path::end()
        .and(warp::get())
        .and(warp::fs::file(state.config.static_dir.join("index.html")));

    let assets = warp::fs::dir(state.config.static_dir.clone());

    health
        .or(upload)
        .or(index)
        .or(assets)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

async fn remove_background(
    form: FormData,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = spans::request(&request_id, REMOVE_BACKGROUND_ROUTE);

    let mut response = handle_upload(form, state).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    Ok(response)
}

async fn handle_upload(form: FormData, state: AppState) -> Response {
    let upload = match read_form(form).await {
        Ok(upload) => upload,
        Err(e) => {
            log::warn!("Failed to read multipart body: {}", e);
            return json_error(StatusCode::BAD_REQUEST, "Malformed upload");
        },
    };

    let Some((filename, bytes)) = upload.image else {
        return json_error(StatusCode::BAD_REQUEST, "No image provided");
    };

    if let Err(e) = UploadValidator::validate_filename(&filename) {
        log::info!("Rejected upload: {}", e);
        return json_error(StatusCode::BAD_REQUEST, e.public_message());
    }

    let enhance = upload.enhance.unwrap_or(state.config.enhance_by_default);
    log::info!(
        "Processing '{}' ({} bytes, enhance={})",
        filename,
        bytes.len(),
        enhance
    );

    match process(&state, bytes, enhance).await {
        Ok(png) => png_attachment(png, &filename),
        Err(e) => {
            log::error!("Error processing image '{}': {}", filename, e);
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            json_error(status, e.public_message())
        },
    }
}

/// Run the pipeline off the async runtime, bounded by the request timeout
async fn process(state: &AppState, bytes: Vec<u8>, enhance: bool) -> Result<Vec<u8>> {
    let processor = Arc::clone(&state.processor);
    let span = tracing::Span::current();
    let task = tokio::task::spawn_blocking(move || {
        span.in_scope(|| processor.process_bytes(&bytes, Some(enhance)))
    });

    let timeout = state.config.request_timeout();
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result.map(|processed| processed.png),
        Ok(Err(join_error)) => Err(BgRemovalError::internal(format!(
            "Processing task failed: {}",
            join_error
        ))),
        Err(_) => Err(BgRemovalError::segmentation(format!(
            "Processing timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

fn png_attachment(png: Vec<u8>, filename: &str) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        UploadValidator::download_name(filename)
    );
    let reply = warp::reply::with_header(png, CONTENT_TYPE, "image/png");
    warp::reply::with_header(reply, CONTENT_DISPOSITION, disposition).into_response()
}

/// Collect the fields the upload route understands
///
/// Parts are consumed one at a time: each body must be read (or the part
/// dropped) before the next part can be pulled from the stream. An `image`
/// part without a filename is a plain text field and does not count as a file.
async fn read_form(mut form: FormData) -> std::result::Result<UploadForm, warp::Error> {
    let mut upload = UploadForm::default();

    while let Some(part) = form.try_next().await? {
        let name = part.name().to_string();
        match name.as_str() {
            IMAGE_FIELD if upload.image.is_none() => {
                let Some(filename) = part.filename().map(str::to_string) else {
                    log::debug!("Ignoring '{}' field without a filename", IMAGE_FIELD);
                    continue;
                };
                let bytes = read_part(part).await?;
                upload.image = Some((filename, bytes));
            },
            ENHANCE_FIELD => {
                let value = read_part(part).await?;
                upload.enhance = Some(parse_flag(&String::from_utf8_lossy(&value)));
            },
            other => log::debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(upload)
}

async fn read_part(part: Part) -> std::result::Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut data, chunk| async move {
            data.put(chunk);
            Ok(data)
        })
        .await
}

/// Translate boundary rejections into JSON errors
async fn handle_rejection(err: Rejection) -> std::result::Result<Response, Infallible> {
    let response = if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        json_error(StatusCode::PAYLOAD_TOO_LARGE, "File too large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        json_error(StatusCode::LENGTH_REQUIRED, "Length required")
    } else if err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        json_error(StatusCode::BAD_REQUEST, "No image provided")
    } else if err.is_not_found() {
        json_error(StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    Ok(response)
}

/// Bind `config`'s address and serve until Ctrl-C
///
/// Creates the static directory when it is missing. In-flight requests are
/// allowed to finish after the shutdown signal.
///
/// # Errors
/// - Invalid server configuration
/// - Static directory cannot be created
/// - Address already in use or not bindable
pub async fn run_server(config: ServerConfig, processor: BackgroundRemovalProcessor) -> Result<()> {
    config.validate()?;
    let addr = config.socket_addr()?;

    tokio::fs::create_dir_all(&config.static_dir)
        .await
        .map_err(|e| BgRemovalError::file_io_error("create static directory", &config.static_dir, &e))?;

    let state = AppState::new(processor, config);
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, shutdown_signal())
        .map_err(|e| BgRemovalError::network_error("Failed to bind server", e))?;

    log::info!("🚀 Listening on http://{}", bound);
    log::info!("   POST {}", REMOVE_BACKGROUND_ROUTE);
    log::info!("   GET  /health");

    server.await;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received, draining connections");
}
