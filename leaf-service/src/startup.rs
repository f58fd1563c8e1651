//! Application startup and lifecycle management.

use crate::classifier::Classifier;
use crate::config::{LeafConfig, WebSettings};
use crate::handlers::{
    api,
    app::{health_check, metrics, readiness_check},
    leaf::{ask, index, predict, upload},
};
use crate::knowledge::BenefitsTable;
use crate::services::providers::groq::GroqChatProvider;
use crate::services::ChatProvider;
use crate::session::{BoundedMemoryStore, SessionController};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer};

/// How often expired sessions are dropped from memory.
pub const SESSION_SWEEP_PERIOD: std::time::Duration = std::time::Duration::from_secs(60);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub controller: SessionController,
}

pub fn build_router(state: AppState, web: &WebSettings, store: BoundedMemoryStore) -> Router {
    let session_layer = SessionManagerLayer::new(store)
        .with_secure(web.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            web.session_inactivity_hours,
        )));

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/predict", post(predict))
        .route("/ask", post(ask))
        .route("/api/classify", post(api::classify))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest_service("/static", ServeDir::new(&web.static_dir))
        .layer(DefaultBodyLimit::max(web.max_upload_bytes))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
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
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Load the classifier artifacts, create the Groq client and bind.
    pub async fn build(config: LeafConfig) -> Result<Self, AppError> {
        let classifier = Classifier::load(&config.classifier).map_err(|e| {
            tracing::error!(
                model_path = %config.classifier.model_path.display(),
                class_names_path = %config.classifier.class_names_path.display(),
                "Failed to load leaf classifier: {}",
                e
            );
            AppError::ConfigError(anyhow::Error::new(e))
        })?;

        let provider = GroqChatProvider::new(config.assistant.groq_config())
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

        if config.assistant.api_key.is_none() {
            tracing::warn!("GROQ_API_KEY is not set, questions will fail until it is configured");
        }

        tracing::info!(
            model = %config.assistant.model,
            "Initialized Groq chat provider"
        );

        Self::build_with(config, classifier, Arc::new(provider)).await
    }

    /// Build around an already loaded classifier and provider.
    pub async fn build_with(
        config: LeafConfig,
        classifier: Classifier,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self, AppError> {
        let benefits = BenefitsTable::builtin();

        let missing = benefits.missing(classifier.labels().iter());
        if !missing.is_empty() {
            tracing::warn!(
                missing = ?missing,
                "Class names without a benefits entry will show the fallback text"
            );
        }

        let controller = SessionController::new(
            Arc::new(classifier),
            Arc::new(benefits),
            provider,
            config.web.display_size,
        );
        let store = BoundedMemoryStore::new(config.web.session_capacity);
        store.spawn_sweeper(SESSION_SWEEP_PERIOD);
        tracing::info!(
            capacity = store.capacity(),
            inactivity_hours = config.web.session_inactivity_hours,
            "Session store ready"
        );

        let router = build_router(AppState { controller }, &config.web, store);

        // Port 0 = random port for testing
        let address = config.common.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("leaf-service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
