use super::{LeafSession, UploadedImage};
use crate::classifier::{preprocess, Classifier, ClassifierError, Label};
use crate::knowledge::BenefitsTable;
use crate::services::{answer_question, metrics, Answer, ChatProvider};
use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbImage};
use serde::Serialize;
use service_core::error::AppError;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

/// Longest question forwarded to the chat provider, in characters.
pub const MAX_QUESTION_CHARS: u64 = 1000;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Upload a leaf image before predicting.")]
    NoImage,

    #[error("Predict the leaf before asking questions about it.")]
    NotClassified,

    #[error("{0}")]
    InvalidQuestion(String),

    #[error("Could not classify the image: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Session storage failed: {0}")]
    Session(String),
}

impl ControllerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ControllerError::NoImage | ControllerError::InvalidQuestion(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ControllerError::NotClassified => StatusCode::CONFLICT,
            ControllerError::Classifier(e) if e.is_bad_input() => StatusCode::UNPROCESSABLE_ENTITY,
            ControllerError::Classifier(_) | ControllerError::Session(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text for the page. Storage and internal inference failures are
    /// reported generically.
    pub fn user_message(&self) -> String {
        match self {
            ControllerError::Session(_) => "Something went wrong, please try again.".to_string(),
            ControllerError::Classifier(e) if !e.is_bad_input() => {
                "The classifier failed on this image, please try another photo.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<ControllerError> for AppError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::NoImage | ControllerError::InvalidQuestion(_) => {
                AppError::UnprocessableEntity(anyhow::anyhow!(err.to_string()))
            }
            ControllerError::NotClassified => AppError::Conflict(anyhow::anyhow!(err.to_string())),
            ControllerError::Classifier(ref e) if e.is_bad_input() => {
                AppError::UnprocessableEntity(anyhow::anyhow!(err.to_string()))
            }
            ControllerError::Classifier(_) | ControllerError::Session(_) => {
                AppError::InternalError(anyhow::Error::new(err))
            }
        }
    }
}

/// Display copy of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub label: Label,
    pub benefits: String,
}

/// One question and its answer. Rendered once, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: Answer,
}

#[derive(Debug, Validate)]
struct Question {
    #[validate(length(min = 1, max = MAX_QUESTION_CHARS))]
    text: String,
}

/// Drives uploads, predictions and questions for one session at a time.
/// Cheap to clone; everything shared is behind `Arc`.
#[derive(Clone)]
pub struct SessionController {
    classifier: Arc<Classifier>,
    benefits: Arc<BenefitsTable>,
    provider: Arc<dyn ChatProvider>,
    display_size: u32,
}

impl SessionController {
    pub fn new(
        classifier: Arc<Classifier>,
        benefits: Arc<BenefitsTable>,
        provider: Arc<dyn ChatProvider>,
        display_size: u32,
    ) -> Self {
        Self {
            classifier,
            benefits,
            provider,
            display_size,
        }
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    pub fn benefits(&self) -> &BenefitsTable {
        &self.benefits
    }

    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    /// Label and benefits for whatever the session currently holds.
    pub fn current_prediction(&self, session: &LeafSession) -> Option<Prediction> {
        session.predicted_leaf().map(|label| self.prediction_for(label.clone()))
    }

    fn prediction_for(&self, label: Label) -> Prediction {
        let benefits = self.benefits.get_or_default(&label).to_string();
        Prediction { label, benefits }
    }

    /// Decode an upload once, then store its canonical model input and a
    /// display preview. The session is left untouched when the bytes are
    /// not an image.
    pub async fn upload(
        &self,
        session: &mut LeafSession,
        bytes: Vec<u8>,
        file_name: Option<String>,
        content_type: Option<String>,
    ) -> Result<Preview, ControllerError> {
        let display_size = self.display_size;
        let input_size = self.classifier.input_size();
        let size_bytes = bytes.len();

        let (canonical, preview) =
            tokio::task::spawn_blocking(move || -> Result<_, ClassifierError> {
                let image = preprocess::decode(&bytes)?;
                let canonical = preprocess::canonicalize(&image, input_size);
                let preview = render_preview(&image, display_size)?;
                Ok((canonical, preview))
            })
            .await
            .map_err(|e| ClassifierError::Join(e.to_string()))??;

        tracing::info!(file_name = ?file_name, size_bytes, "Leaf image uploaded");

        session.set_image(UploadedImage::new(
            &canonical,
            file_name,
            content_type,
            preview.data_url.clone(),
        ));

        Ok(preview)
    }

    /// Classify the stored upload and remember the label.
    pub async fn predict(&self, session: &mut LeafSession) -> Result<Prediction, ControllerError> {
        let image = session.image().ok_or(ControllerError::NoImage)?;
        let canonical = image
            .canonical()
            .map_err(|e| ControllerError::Session(format!("stored image is corrupt: {}", e)))?;

        let result = self
            .classifier
            .classify_image_blocking(DynamicImage::ImageRgb8(canonical))
            .await;
        let label = self.observe(result)?;

        let prediction = self.prediction_for(label);
        session.set_predicted_leaf(prediction.label.clone());
        Ok(prediction)
    }

    /// Classify bytes without touching any session.
    pub async fn classify(&self, bytes: Vec<u8>) -> Result<Prediction, ControllerError> {
        let label = self.observe(self.classifier.classify_blocking(bytes).await)?;
        Ok(self.prediction_for(label))
    }

    fn observe(&self, result: Result<Label, ClassifierError>) -> Result<Label, ControllerError> {
        match result {
            Ok(label) => {
                tracing::info!(label = %label, "Leaf classified");
                metrics::record_prediction(label.as_str());
                Ok(label)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "Leaf classification failed");
                metrics::record_classification_failure(e.kind());
                Err(e.into())
            }
        }
    }

    /// Answer one question about the stored label. Provider failures are part
    /// of the returned turn and leave the session as it was.
    pub async fn ask(
        &self,
        session: &LeafSession,
        question: &str,
    ) -> Result<ConversationTurn, ControllerError> {
        let label = session
            .predicted_leaf()
            .ok_or(ControllerError::NotClassified)?;

        let question = validate_question(question)?;
        let answer = answer_question(self.provider.as_ref(), label, &question).await;

        Ok(ConversationTurn { question, answer })
    }
}

fn validate_question(raw: &str) -> Result<String, ControllerError> {
    let question = Question {
        text: raw.trim().to_string(),
    };

    question.validate().map_err(|_| {
        ControllerError::InvalidQuestion(format!(
            "Questions must be between 1 and {} characters.",
            MAX_QUESTION_CHARS
        ))
    })?;

    Ok(question.text)
}

/// Encode a `size` x `size` RGB PNG data URL for display.
fn render_preview(image: &DynamicImage, size: u32) -> Result<Preview, ClassifierError> {
    let resized: RgbImage = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(resized)
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| ClassifierError::Decode(format!("failed to encode preview: {}", e)))?;

    Ok(Preview {
        data_url: format!("data:image/png;base64,{}", BASE64.encode(png.into_inner())),
        width: size,
        height: size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::preprocess::InputTensor;
    use crate::classifier::{ImageModel, LabelSet};
    use crate::knowledge::BENEFITS_UNAVAILABLE;
    use crate::services::providers::mock::MockChatProvider;
    use crate::services::providers::ProviderError;
    use image::Rgb;

    /// Always votes for the class at `index`.
    struct Always(usize, usize);

    impl ImageModel for Always {
        fn forward(&self, _input: &InputTensor) -> Result<Vec<f32>, ClassifierError> {
            let mut scores = vec![0.0; self.1];
            scores[self.0] = 1.0;
            Ok(scores)
        }

        fn num_outputs(&self) -> Option<usize> {
            Some(self.1)
        }
    }

    fn png() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([30, 160, 60])))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn controller(label_index: usize, provider: Arc<MockChatProvider>) -> SessionController {
        let labels = LabelSet::new([
            "Ocimum Tenuiflorum (Tulsi)",
            "Aloe Barbadensis (Aloe Vera)",
        ])
        .unwrap();
        let classifier = Classifier::new(Arc::new(Always(label_index, 2)), labels, 224).unwrap();

        SessionController::new(
            Arc::new(classifier),
            Arc::new(BenefitsTable::builtin()),
            provider,
            300,
        )
    }

    async fn classified(controller: &SessionController) -> LeafSession {
        let mut session = LeafSession::default();
        controller
            .upload(&mut session, png(), Some("leaf.png".into()), None)
            .await
            .unwrap();
        controller.predict(&mut session).await.unwrap();
        session
    }

    #[tokio::test]
    async fn upload_builds_display_sized_preview() {
        let controller = controller(0, Arc::new(MockChatProvider::replying("ok")));
        let mut session = LeafSession::default();

        let preview = controller
            .upload(&mut session, png(), None, Some("image/png".into()))
            .await
            .unwrap();

        assert_eq!((preview.width, preview.height), (300, 300));
        assert!(preview.data_url.starts_with("data:image/png;base64,"));

        let stored = session.image().unwrap();
        assert_eq!(stored.preview_data_url, preview.data_url);
        let canonical = stored.canonical().unwrap();
        assert_eq!(canonical.dimensions(), (224, 224));
        assert_eq!(canonical.get_pixel(100, 100), &Rgb([30, 160, 60]));
    }

    /// Pseudo-random pixels so PNG compression cannot shrink the upload.
    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let mut state: u32 = 0x9e37_79b9;
        let img = RgbImage::from_fn(width, height, |_, _| {
            let mut channel = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            };
            Rgb([channel(), channel(), channel()])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn stored_session_size_does_not_grow_with_upload_size() {
        let controller = controller(0, Arc::new(MockChatProvider::replying("ok")));
        // 224^2 RGB pixels plus a 300^2 RGB PNG, both base64, with headroom
        const SESSION_JSON_BOUND: usize = 600_000;

        let mut sizes = Vec::new();
        for side in [256, 1100] {
            let upload = noisy_png(side, side);
            let mut session = LeafSession::default();
            controller
                .upload(&mut session, upload.clone(), Some("noise.png".into()), None)
                .await
                .unwrap();

            let stored = serde_json::to_vec(&session).unwrap().len();
            assert!(
                stored < SESSION_JSON_BOUND,
                "session for a {side}px upload is {stored} bytes"
            );
            sizes.push((upload.len(), stored));
        }

        let (small_upload, small_session) = sizes[0];
        let (large_upload, large_session) = sizes[1];
        assert!(large_upload > 10 * small_upload);
        assert!(large_session < small_session + small_session / 2);
    }

    #[tokio::test]
    async fn predict_uses_stored_pixels_not_the_upload() {
        let controller = controller(0, Arc::new(MockChatProvider::replying("ok")));
        let mut session = LeafSession::default();
        controller
            .upload(&mut session, png(), None, None)
            .await
            .unwrap();

        let canonical = session.image().unwrap().canonical().unwrap();
        let direct = controller
            .classifier()
            .classify_image(&DynamicImage::ImageRgb8(canonical))
            .unwrap();

        let prediction = controller.predict(&mut session).await.unwrap();
        assert_eq!(prediction.label, direct);
    }

    #[tokio::test]
    async fn rejected_upload_leaves_session_untouched() {
        let controller = controller(0, Arc::new(MockChatProvider::replying("ok")));
        let mut session = classified(&controller).await;
        let before = session.clone();

        let err = controller
            .upload(&mut session, b"%PDF-1.7".to_vec(), None, None)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn predict_requires_an_upload() {
        let controller = controller(0, Arc::new(MockChatProvider::replying("ok")));
        let err = controller
            .predict(&mut LeafSession::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::NoImage));
    }

    #[tokio::test]
    async fn predict_stores_label_and_benefits() {
        let controller = controller(0, Arc::new(MockChatProvider::replying("ok")));
        let mut session = LeafSession::default();
        controller.upload(&mut session, png(), None, None).await.unwrap();

        let prediction = controller.predict(&mut session).await.unwrap();

        assert_eq!(prediction.label.as_str(), "Ocimum Tenuiflorum (Tulsi)");
        assert_eq!(
            prediction.benefits,
            "Boosts immunity, good for respiratory health."
        );
        assert_eq!(session.predicted_leaf(), Some(&prediction.label));
        assert_eq!(controller.current_prediction(&session), Some(prediction));
    }

    #[tokio::test]
    async fn label_without_table_entry_gets_fallback() {
        let controller = controller(1, Arc::new(MockChatProvider::replying("ok")));
        let mut session = LeafSession::default();
        controller.upload(&mut session, png(), None, None).await.unwrap();

        let prediction = controller.predict(&mut session).await.unwrap();
        assert_eq!(prediction.benefits, BENEFITS_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ask_before_prediction_is_rejected() {
        let provider = Arc::new(MockChatProvider::replying("ok"));
        let controller = controller(0, provider.clone());

        let err = controller
            .ask(&LeafSession::default(), "Is it safe?")
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::NotClassified));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn ask_sends_label_and_verbatim_question() {
        let provider = Arc::new(MockChatProvider::replying("<b>Yes</b>, in moderation."));
        let controller = controller(0, provider.clone());
        let session = classified(&controller).await;

        let turn = controller
            .ask(&session, "Is it safe for children?")
            .await
            .unwrap();

        assert_eq!(turn.question, "Is it safe for children?");
        assert_eq!(turn.answer.display_text(), "<b>Yes</b>, in moderation.");

        let sent = provider.last_request().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].content.contains("Plant: Ocimum Tenuiflorum (Tulsi)"));
        assert!(sent[1].content.contains("User's Question: Is it safe for children?"));
    }

    #[tokio::test]
    async fn provider_failure_keeps_session_usable() {
        let provider = Arc::new(MockChatProvider::failing(ProviderError::NetworkError(
            "dns lookup failed".into(),
        )));
        let controller = controller(0, provider.clone());
        let session = classified(&controller).await;
        let before = session.clone();

        let turn = controller.ask(&session, "Dosage?").await.unwrap();
        assert!(turn.answer.is_failed());
        assert!(turn.answer.display_text().contains("dns lookup failed"));
        assert_eq!(session, before);

        provider.set_behavior(crate::services::providers::mock::MockBehavior::Reply(
            "Two leaves a day.".into(),
        ));
        let retry = controller.ask(&session, "Dosage?").await.unwrap();
        assert_eq!(retry.answer.display_text(), "Two leaves a day.");
    }

    #[tokio::test]
    async fn blank_and_oversized_questions_are_rejected() {
        let provider = Arc::new(MockChatProvider::replying("ok"));
        let controller = controller(0, provider.clone());
        let session = classified(&controller).await;

        let long = "a".repeat(MAX_QUESTION_CHARS as usize + 1);
        for question in ["", "   \n", long.as_str()] {
            let err = controller.ask(&session, question).await.unwrap_err();
            assert!(matches!(err, ControllerError::InvalidQuestion(_)));
        }
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn question_at_the_character_limit_is_accepted() {
        let provider = Arc::new(MockChatProvider::replying("ok"));
        let controller = controller(0, provider.clone());
        let session = classified(&controller).await;

        // multi-byte characters count once each
        let question = "é".repeat(MAX_QUESTION_CHARS as usize);
        let turn = controller.ask(&session, &question).await.unwrap();
        assert_eq!(turn.question.chars().count(), 1000);
        assert_eq!(provider.requests().len(), 1);

        let err = controller
            .ask(&session, &format!("{question}é"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidQuestion(_)));
        assert_eq!(provider.requests().len(), 1);
    }

    #[test]
    fn internal_classifier_errors_are_not_leaked_to_users() {
        let err = ControllerError::Classifier(ClassifierError::Inference("shape [1,3]".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("shape"));
    }
}
