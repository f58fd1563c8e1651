//! Per-browser interaction state and the controller that drives it.
//!
//! A [`LeafSession`] moves `Idle → ImageLoaded → Classified`. Once a label
//! has been stored it stays until a later prediction replaces it, so
//! questions keep working while a new photo is uploaded.

pub mod controller;
pub mod store;

pub use controller::{ConversationTurn, ControllerError, Prediction, Preview, SessionController};
pub use store::BoundedMemoryStore;

use crate::classifier::Label;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Key under which the session lives in the tower-sessions store.
pub const SESSION_KEY: &str = "leaf_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    ImageLoaded,
    Classified,
}

/// Last upload, reduced to the model's square RGB input.
///
/// Classifying the canonical pixels gives the same label as the original
/// file, and the stored size depends only on the model input and display
/// sizes, never on the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    /// Side of the square canonical image.
    size: u32,
    /// Row-major RGB bytes, base64.
    pixels: String,
    /// PNG data URL of the display-sized copy.
    pub preview_data_url: String,
}

impl UploadedImage {
    pub fn new(
        canonical: &RgbImage,
        file_name: Option<String>,
        content_type: Option<String>,
        preview_data_url: String,
    ) -> Self {
        Self {
            file_name,
            content_type,
            size: canonical.width(),
            pixels: BASE64.encode(canonical.as_raw()),
            preview_data_url,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Rebuild the canonical image.
    pub fn canonical(&self) -> Result<RgbImage, String> {
        let raw = BASE64.decode(&self.pixels).map_err(|e| e.to_string())?;
        RgbImage::from_raw(self.size, self.size, raw).ok_or_else(|| {
            format!("pixel data does not fill a {0}x{0} RGB image", self.size)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafSession {
    image: Option<UploadedImage>,
    predicted_leaf: Option<Label>,
}

impl LeafSession {
    pub fn phase(&self) -> SessionPhase {
        match (&self.image, &self.predicted_leaf) {
            (_, Some(_)) => SessionPhase::Classified,
            (Some(_), None) => SessionPhase::ImageLoaded,
            (None, None) => SessionPhase::Idle,
        }
    }

    pub fn image(&self) -> Option<&UploadedImage> {
        self.image.as_ref()
    }

    pub fn predicted_leaf(&self) -> Option<&Label> {
        self.predicted_leaf.as_ref()
    }

    /// Replace the uploaded image. A stored label is kept.
    pub fn set_image(&mut self, image: UploadedImage) {
        self.image = Some(image);
    }

    pub fn set_predicted_leaf(&mut self, label: Label) {
        self.predicted_leaf = Some(label);
    }

    /// Read from the request's session, or start fresh.
    pub async fn load(session: &tower_sessions::Session) -> Result<Self, ControllerError> {
        session
            .get::<LeafSession>(SESSION_KEY)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| ControllerError::Session(e.to_string()))
    }

    pub async fn save(&self, session: &tower_sessions::Session) -> Result<(), ControllerError> {
        session
            .insert(SESSION_KEY, self)
            .await
            .map_err(|e| ControllerError::Session(e.to_string()))
    }
}
