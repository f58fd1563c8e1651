use super::read_leaf_field;
use crate::session::Prediction;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use service_core::error::AppError;

/// Stateless classification: multipart `leaf` in, `{label, benefits}` out.
pub async fn classify(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Prediction>, AppError> {
    let file = read_leaf_field(multipart).await?;

    tracing::debug!(
        file_name = ?file.file_name,
        size_bytes = file.bytes.len(),
        "Classifying via API"
    );

    let prediction = state.controller.classify(file.bytes).await?;
    Ok(Json(prediction))
}
