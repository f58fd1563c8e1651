pub mod api;
pub mod app;
pub mod leaf;

use axum::extract::Multipart;
use axum::http::StatusCode;
use service_core::error::AppError;

/// Multipart field carrying the leaf photo.
pub const LEAF_FIELD: &str = "leaf";

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Pull the `leaf` field out of a multipart body. Other fields are skipped.
/// A field with no content counts as missing.
pub async fn read_leaf_field(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(LEAF_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        if bytes.is_empty() {
            break;
        }

        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::UnprocessableEntity(anyhow::anyhow!(
        "Choose a leaf image to upload."
    )))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("The image is larger than the upload limit.".to_string())
    } else {
        tracing::warn!(error = %err, "Failed to read multipart upload");
        AppError::BadRequest(anyhow::anyhow!("The upload could not be read."))
    }
}

/// Message for the page banner when reading an upload fails.
pub fn upload_error_message(err: &AppError) -> String {
    match err {
        AppError::PayloadTooLarge(msg) => msg.clone(),
        AppError::UnprocessableEntity(e) | AppError::BadRequest(e) => e.to_string(),
        _ => "The upload could not be read.".to_string(),
    }
}
