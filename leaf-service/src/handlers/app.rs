use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness check.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "leaf-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness check. The classifier is loaded before the listener binds, so
/// reaching this handler means it is ready; a missing chat key is reported
/// but does not fail the check.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let provider = state.controller.provider();
    let configured = provider.health_check().await.is_ok();

    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "classes": state.controller.classifier().labels().len(),
            "chat_provider": {
                "name": provider.name(),
                "model": provider.model(),
                "configured": configured
            }
        })),
    )
}

pub async fn metrics() -> impl IntoResponse {
    service_core::observability::render_metrics()
}
