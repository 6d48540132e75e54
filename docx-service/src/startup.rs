use crate::config::DocxConfig;
use crate::handlers;
use crate::services::{DocumentComposer, DocumentStore, LocalStorage};
use axum::{
    extract::DefaultBodyLimit,
    http::Request,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: DocxConfig,
    pub store: Arc<dyn DocumentStore>,
    pub composer: DocumentComposer,
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_request_bytes;

    Router::new()
        .route("/", get(handlers::root_status))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/api/WordDocument/insertar-header-footer",
            post(handlers::insert_header_footer),
        )
        .route(
            "/api/WordDocument/obtener-archivo",
            post(handlers::retrieve_document),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    pub async fn build(config: DocxConfig) -> Result<Self, AppError> {
        let store: Arc<dyn DocumentStore> = Arc::new(
            LocalStorage::new(&config.storage.local_path)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        config.storage.local_path.display(),
                        e
                    );
                    e
                })?,
        );

        Self::build_with_store(config, store).await
    }

    pub async fn build_with_store(
        config: DocxConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, AppError> {
        let state = AppState {
            composer: DocumentComposer::new(&config.templates_dir)
                .with_limits(config.package_limits()),
            config: config.clone(),
            store,
        };

        let app = build_router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router: app,
            state,
        })
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.state.store.clone()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }

    /// Serve until `signal` resolves, letting in-flight requests finish.
    pub async fn run_until<F>(self, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await
    }
}
