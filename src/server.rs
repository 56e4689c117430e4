//! HTTP surface: multipart endpoints over the [`Orchestrator`].

use std::{collections::HashMap, future::Future, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, MatchedPath, Multipart, State,
    },
    http::{header, HeaderMap, HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tokio::{net::TcpListener, sync::watch};
use tower_http::{
    classify::ServerErrorsFailureClass,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{Orientation, PageRange, UploadField};
use crate::error::ConvertError;
use crate::job::ConversionOptions;
use crate::orchestrator::{ConversionOutput, Orchestrator};
use crate::validate::UploadedArtifact;

const HEALTHZ_PATH: &str = "/healthz";
const HEALTHZ_STATUS: &str = "ok";
const REQUEST_ID_HEADER: &str = "x-request-id";
const GENERIC_FAILURE: &str = "conversion failed";
/// Allowance for multipart boundaries and part headers on top of the
/// payload ceiling.
const MULTIPART_OVERHEAD: usize = 64 * 1024;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MARGIN_MM: u32 = 8;

type AppState = Arc<Orchestrator>;

/// Errors that stop the server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listen address must not be empty")]
    EmptyListenAddr,
    #[error("invalid listen address `{address}`: {source}")]
    InvalidListenAddr {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind `{address}`: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read local address: {source}")]
    LocalAddr {
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Serialize, Copy, Clone, PartialEq, Eq)]
struct HealthzResponse {
    status: &'static str,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ShutdownEvent {
    Pending,
    CtrlC,
    SigTerm,
    ListenerFailed,
}

// ── Error responses ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: String,
}

/// A JSON `{error}` response with its status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            body: ApiErrorBody {
                error: message.into(),
            },
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, message)
    }

    fn resource_not_found(path: &str) -> Self {
        ApiError::new(StatusCode::NOT_FOUND, format!("resource `{path}` not found"))
    }

    fn method_not_allowed(method: &str, path: &str) -> Self {
        ApiError::new(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("method `{method}` not allowed for `{path}`"),
        )
    }

    fn multipart(error: MultipartError, limit: u64) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::bad_request(format!(
                "upload exceeds the size limit of {limit} bytes"
            ));
        }
        ApiError::bad_request(format!("malformed multipart body: {}", error.body_text()))
    }
}

impl From<ConvertError> for ApiError {
    fn from(error: ConvertError) -> Self {
        if error.is_client_error() {
            tracing::info!(%error, "request rejected");
            return ApiError::bad_request(error.to_string());
        }
        tracing::error!(%error, "conversion failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ── Multipart form ───────────────────────────────────────────────────────

/// A fully buffered multipart form.
#[derive(Debug, Default)]
struct Form {
    files: Vec<(String, UploadedArtifact)>,
    fields: HashMap<String, String>,
}

impl Form {
    /// Buffer every part. Parts named after an upload field, or carrying a
    /// filename, are files; everything else is a text field.
    async fn read(mut multipart: Multipart, limit: u64) -> Result<Self, ApiError> {
        let mut form = Form::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::multipart(e, limit))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            if filename.is_some() || UploadField::from_name(&name).is_some() {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::multipart(e, limit))?;
                form.files.push((
                    name,
                    UploadedArtifact {
                        filename,
                        bytes: bytes.to_vec(),
                    },
                ));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::multipart(e, limit))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    fn take_file(&mut self, field: UploadField) -> Option<UploadedArtifact> {
        let index = self.files.iter().position(|(n, _)| n == field.name())?;
        Some(self.files.remove(index).1)
    }

    fn take_files(&mut self, field: UploadField) -> Vec<UploadedArtifact> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(n, _)| n == field.name());
        self.files = rest;
        taken.into_iter().map(|(_, artifact)| artifact).collect()
    }

    /// A non-blank text field.
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn parse_number<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, ConvertError> {
        self.field(name)
            .map(|raw| {
                raw.parse().map_err(|_| ConvertError::InvalidOption {
                    field: name.to_string(),
                    reason: format!("expected a non-negative integer, got '{raw}'"),
                })
            })
            .transpose()
    }

    fn page_range(&self) -> Result<Option<PageRange>, ConvertError> {
        let start = self.parse_number::<usize>("page_start")?;
        let end = self.parse_number::<usize>("page_end")?;
        if start.is_none() && end.is_none() {
            return Ok(None);
        }
        PageRange::new(start.unwrap_or(0), end).map(Some)
    }

    fn image_options(&self) -> Result<ConversionOptions, ConvertError> {
        let orientation = match self.field("orientation") {
            Some(raw) => raw.parse::<Orientation>()?,
            None => Orientation::default(),
        };
        let margin_mm = self.parse_number::<u32>("margin")?.unwrap_or(DEFAULT_MARGIN_MM);
        Ok(ConversionOptions {
            orientation,
            margin_mm,
            page_range: None,
        })
    }
}

fn file_response(output: ConversionOutput) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, output.content_type()),
            (header::CONTENT_DISPOSITION, output.content_disposition()),
        ],
        output.bytes,
    )
        .into_response()
}

fn upload_limit(state: &AppState) -> u64 {
    state.config().max_request_bytes
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse {
        status: HEALTHZ_STATUS,
    })
}

async fn pdf_to_word(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart?, upload_limit(&state)).await?;
    let range = form.page_range()?;
    let output = state.pdf_to_word(form.take_file(UploadField::Pdf), range).await?;
    Ok(file_response(output))
}

async fn pdf_to_pptx(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart?, upload_limit(&state)).await?;
    let output = state.pdf_to_pptx(form.take_file(UploadField::Pdf)).await?;
    Ok(file_response(output))
}

async fn pdf_to_excel(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart?, upload_limit(&state)).await?;
    let output = state.pdf_to_excel(form.take_file(UploadField::Pdf)).await?;
    Ok(file_response(output))
}

async fn word_to_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart?, upload_limit(&state)).await?;
    let output = state.word_to_pdf(form.take_file(UploadField::Word)).await?;
    Ok(file_response(output))
}

async fn image_to_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart?, upload_limit(&state)).await?;
    let options = form.image_options()?;
    let output = state
        .images_to_pdf(form.take_files(UploadField::Images), options)
        .await?;
    Ok(file_response(output))
}

async fn image_to_excel(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart?, upload_limit(&state)).await?;
    let output = state.image_to_excel(form.take_file(UploadField::Image)).await?;
    Ok(file_response(output))
}

async fn method_not_allowed_handler(request: Request<Body>) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    ApiError::method_not_allowed(&method, &path).into_response()
}

async fn not_found_handler(request: Request<Body>) -> Response {
    ApiError::resource_not_found(request.uri().path()).into_response()
}

// ── Router ───────────────────────────────────────────────────────────────

/// The complete application: routes, body limit, tracing and request ids.
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    let body_limit = usize::try_from(orchestrator.config().max_request_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let path = matched_path_or_uri(request);
            let request_id =
                header_request_id(request.headers()).unwrap_or_else(|| "-".to_string());
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                path = %path,
                request_id = %request_id
            )
        })
        .on_response(|response: &Response, latency: Duration, span: &tracing::Span| {
            let status = response.status().as_u16();
            let latency_ms = latency.as_millis().min(u128::from(u64::MAX)) as u64;
            tracing::info!(parent: span, status, latency_ms, "request completed");
        })
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, span: &tracing::Span| {
                let latency_ms = latency.as_millis().min(u128::from(u64::MAX)) as u64;
                tracing::error!(parent: span, latency_ms, error = %error, "request failed");
            },
        );

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route(
            HEALTHZ_PATH,
            get(healthz).fallback(method_not_allowed_handler),
        )
        .route(
            "/pdf_to_word",
            post(pdf_to_word).fallback(method_not_allowed_handler),
        )
        .route(
            "/pdf_to_pptx",
            post(pdf_to_pptx).fallback(method_not_allowed_handler),
        )
        .route(
            "/pdf_to_excel",
            post(pdf_to_excel).fallback(method_not_allowed_handler),
        )
        .route(
            "/word_to_pdf",
            post(word_to_pdf).fallback(method_not_allowed_handler),
        )
        .route(
            "/image_to_pdf",
            post(image_to_pdf).fallback(method_not_allowed_handler),
        )
        .route(
            "/image_to_excel",
            post(image_to_excel).fallback(method_not_allowed_handler),
        )
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(
            request_id_header,
            MakeRequestUuid::default(),
        ))
        .with_state(orchestrator)
}

/// Bind the configured address and serve until Ctrl-C or SIGTERM.
pub async fn serve(orchestrator: Arc<Orchestrator>) -> Result<(), ServerError> {
    let listen_addr = parse_listen_addr(&orchestrator.config().listen_addr)?;
    let listener = bind_listener(listen_addr).await?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::LocalAddr { source })?;
    tracing::info!(
        %local_addr,
        storage = %orchestrator.store().root().display(),
        max_request_bytes = orchestrator.config().max_request_bytes,
        "docconvert listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownEvent::Pending);
    let app = build_router(orchestrator);

    let mut server_future = Box::pin(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(broadcast_shutdown(shutdown_tx))
            .await
    });
    let mut drain_timeout = Box::pin(drain_timeout_future(shutdown_rx.clone()));

    tokio::select! {
        result = server_future.as_mut() => {
            if let Err(source) = result {
                return Err(ServerError::Serve { source });
            }
        }
        _ = drain_timeout.as_mut() => {}
    }

    let final_event = *shutdown_rx.borrow();
    tracing::info!(?final_event, "server shutdown complete");
    Ok(())
}

fn matched_path_or_uri<B>(request: &Request<B>) -> String {
    match request.extensions().get::<MatchedPath>() {
        Some(path) => path.as_str().to_string(),
        None => request.uri().path().to_string(),
    }
}

fn header_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(ServerError::EmptyListenAddr);
    }
    trimmed
        .parse()
        .map_err(|source| ServerError::InvalidListenAddr {
            address: trimmed.to_string(),
            source,
        })
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })
}

async fn wait_for_shutdown() -> ShutdownEvent {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownEvent::CtrlC,
            Err(error) => {
                tracing::warn!(%error, "failed to capture Ctrl+C signal");
                ShutdownEvent::ListenerFailed
            }
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => match term.recv().await {
                Some(()) => ShutdownEvent::SigTerm,
                None => ShutdownEvent::ListenerFailed,
            },
            Err(error) => {
                tracing::warn!(%error, "failed to capture SIGTERM");
                ShutdownEvent::ListenerFailed
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<ShutdownEvent>();

    tokio::select! {
        event = ctrl_c => event,
        event = sigterm => event,
    }
}

fn broadcast_shutdown(
    sender: watch::Sender<ShutdownEvent>,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let event = wait_for_shutdown().await;
        if let Err(error) = sender.send(event) {
            tracing::warn!(?event, %error, "failed to broadcast shutdown event");
        }
    }
}

fn drain_timeout_future(
    mut receiver: watch::Receiver<ShutdownEvent>,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        if receiver.changed().await.is_ok() {
            let event = *receiver.borrow_and_update();
            tracing::info!(?event, "shutdown signal received; draining connections");
            tokio::time::sleep(DRAIN_TIMEOUT).await;
            tracing::warn!(
                ?event,
                seconds = DRAIN_TIMEOUT.as_secs(),
                "graceful shutdown timed out; continuing shutdown"
            );
        }
    }
}
