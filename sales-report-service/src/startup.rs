use crate::config::ReportConfig;
use crate::handlers;
use crate::services::{DocumentStore, MongoDb, ReportPipeline};
use axum::{middleware::from_fn, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{http_request_span, request_id_middleware};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: ReportConfig,
    pub store: Arc<dyn DocumentStore>,
    pub pipeline: Arc<ReportPipeline>,
}

impl AppState {
    pub fn new(config: ReportConfig, store: Arc<dyn DocumentStore>) -> Self {
        let pipeline = Arc::new(ReportPipeline::new(
            store.clone(),
            config.report.fetch_returns,
        ));
        Self {
            config,
            store,
            pipeline,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/reports/line-items", get(handlers::list_line_items))
        .route("/reports/line-items/export", get(handlers::export_line_items))
        .route("/reports/:dimension", get(handlers::get_report))
        .route("/reports/:dimension/export", get(handlers::export_report))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(http_request_span::<axum::body::Body>))
        .with_state(state)
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: ReportConfig) -> Result<Self, AppError> {
        let db = MongoDb::connect(&config.database.uri, &config.database.name).await?;
        let store: Arc<dyn DocumentStore> = Arc::new(db);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let router = build_router(AppState::new(config, store));

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        tracing::info!("Listening on port {}", self.port);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
