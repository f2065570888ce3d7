//! # darkroom: Image Ingestion Service
//!
//! `darkroom` is a small self-hostable service that accepts image uploads over HTTP, develops
//! them into pixel data, and stores the result at a fixed local path. It exists for setups where
//! exactly one image matters: a photo frame, a status screen, a camera drop box, a "current
//! wallpaper" endpoint. Clients submit a form, the service decodes whatever arrived, and the
//! configured output file is replaced atomically.
//!
//! ## Overview
//!
//! The service exposes a single ingestion endpoint, `POST /api/image`, accepting both body
//! encodings browsers produce for form submissions: `multipart/form-data` and
//! `application/x-www-form-urlencoded`. The image payload travels in the `image` form field. The
//! source format is sniffed from the payload's magic bytes, so clients don't need to declare (or
//! know) what they're sending.
//!
//! ### What It Does
//!
//! When an upload arrives, the request body is parsed and the `image` field is buffered, with the
//! configured size limit enforced as chunks stream in. The payload is then developed on a blocking
//! worker thread: the imaging library identifies the format, decodes the pixels, and re-encodes
//! them into the format named by the storage path's extension (transparent uploads are flattened
//! when the target is JPEG). The encoded file is written next to the target and renamed over it,
//! so readers of the output path never observe a partial image. The response reports the developed
//! image's dimensions, detected format, and stored size.
//!
//! Requests without image data are answered with `400`; payloads the decoder cannot make sense of,
//! and any storage failure, are reported as `500` with the failure's description in the body.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer. There
//! is no database: the single output file is the entire persistent state.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) holds the upload extractor, the handler, and the response models.
//! The extractor ([`api::extract::ImageUpload`]) dispatches on the request's content type and
//! normalizes both form encodings into one payload type.
//!
//! The **develop step** ([`develop`]) turns raw bytes into pixels plus a detected format, and the
//! **storage layer** ([`storage`]) owns the output path, the target encoding, and the atomic
//! replace.
//!
//! **Telemetry** ([`telemetry`]) wires up structured logging and optional OpenTelemetry trace
//! export, and Prometheus metrics are served at `/internal/metrics` when enabled.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use darkroom::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Parse CLI arguments and load configuration
//!     let args = darkroom::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     // Initialize telemetry (structured logging and optional OpenTelemetry)
//!     darkroom::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     // Create and start the application
//!     let app = Application::new(config)?;
//!
//!     // Run with graceful shutdown on Ctrl+C
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod config;
pub mod develop;
pub mod errors;
mod openapi;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use crate::config::CorsOrigin;
use crate::openapi::ApiDoc;
use crate::storage::ImageStore;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use axum::{
    Router,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `config`: Application configuration loaded from file/environment
/// - `store`: Handle to the single output path developed images are written to
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: ImageStore,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    // A literal "*" is not a valid entry in an origin list, so wildcard configs
    // take the Any path instead
    let has_wildcard = config.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));

    let allow_origin = if has_wildcard {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut exposed_headers = Vec::new();
    for header in &config.cors.exposed_headers {
        exposed_headers.push(header.parse::<HeaderName>()?);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(exposed_headers);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// This function constructs the complete Axum router with:
/// - The image ingestion endpoint at `POST /api/image`
/// - Health check at `/healthz`
/// - Interactive API documentation at `/docs`
/// - Optional Prometheus metrics at `/internal/metrics`
/// - CORS configuration
/// - Tracing middleware
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // Image upload route with its own body limit. The transport limit sits above
    // the configured maximum so the extractor's size check is the one that answers.
    let body_limit = (state.config.upload.max_bytes as usize).saturating_add(64 * 1024);
    let image_routes = Router::new()
        .route(
            "/image",
            post(api::handlers::images::upload_image).layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", image_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    // Add Prometheus metrics if enabled
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] opens the image store and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, in-flight requests drain before exit
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting darkroom with configuration: {:#?}", config);

        let store = ImageStore::open(&config.storage)?;

        let app_state = AppState::builder().config(config.clone()).store(store).build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Darkroom listening on http://{}, developing into '{}'",
            bind_addr,
            self.config.storage.path.display()
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        // Shutdown telemetry
        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
