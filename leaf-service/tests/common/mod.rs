//! Shared helpers for leaf-service integration tests.
//!
//! The ONNX artifact and the Groq API are replaced by stub models and
//! `MockChatProvider`, so these tests need no network and no model file.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use leaf_service::classifier::preprocess::InputTensor;
use leaf_service::classifier::{Classifier, ClassifierError, ImageModel, LabelSet};
use leaf_service::config::WebSettings;
use leaf_service::knowledge::BenefitsTable;
use leaf_service::services::ChatProvider;
use leaf_service::session::{BoundedMemoryStore, SessionController};
use leaf_service::startup::{build_router, AppState};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

pub const TULSI: &str = "Ocimum Tenuiflorum (Tulsi)";
pub const BOUNDARY: &str = "leaf-test-boundary";

/// Always votes for one class.
pub struct FixedModel {
    pub index: usize,
    pub classes: usize,
}

impl ImageModel for FixedModel {
    fn forward(&self, _input: &InputTensor) -> Result<Vec<f32>, ClassifierError> {
        let mut scores = vec![0.0; self.classes];
        scores[self.index] = 1.0;
        Ok(scores)
    }

    fn num_outputs(&self) -> Option<usize> {
        Some(self.classes)
    }
}

/// Fails every forward pass.
pub struct BrokenModel {
    pub classes: usize,
}

impl ImageModel for BrokenModel {
    fn forward(&self, _input: &InputTensor) -> Result<Vec<f32>, ClassifierError> {
        Err(ClassifierError::Inference("graph evaluation failed".to_string()))
    }

    fn num_outputs(&self) -> Option<usize> {
        Some(self.classes)
    }
}

pub fn labels() -> LabelSet {
    LabelSet::from_json_str(include_str!("../../artifacts/class_names.json"))
        .expect("bundled class names are valid")
}

/// Classifier that always answers `label`.
pub fn classifier_for(label: &str) -> Classifier {
    let labels = labels();
    let index = labels
        .iter()
        .position(|l| l.as_str() == label)
        .expect("label is in the bundled class list");
    let model = FixedModel {
        index,
        classes: labels.len(),
    };
    Classifier::new(Arc::new(model), labels, 224).expect("stub matches labels")
}

pub fn broken_classifier() -> Classifier {
    let labels = labels();
    let model = BrokenModel {
        classes: labels.len(),
    };
    Classifier::new(Arc::new(model), labels, 224).expect("stub matches labels")
}

pub fn web_settings() -> WebSettings {
    WebSettings {
        static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        ..WebSettings::default()
    }
}

pub fn test_app(classifier: Classifier, provider: Arc<dyn ChatProvider>) -> Router {
    let store = BoundedMemoryStore::new(web_settings().session_capacity);
    test_app_with_store(classifier, provider, store)
}

/// Router over a caller-owned session store, so tests can inspect it.
pub fn test_app_with_store(
    classifier: Classifier,
    provider: Arc<dyn ChatProvider>,
    store: BoundedMemoryStore,
) -> Router {
    let web = web_settings();
    let controller = SessionController::new(
        Arc::new(classifier),
        Arc::new(BenefitsTable::builtin()),
        provider,
        web.display_size,
    );
    build_router(AppState { controller }, &web, store)
}

pub fn leaf_png() -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(480, 360, Rgb([40, 150, 55])))
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

/// Valid PNG header announcing a frame wider than the decoder accepts.
pub fn oversized_dimension_png() -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image::GrayImage::new(9000, 1))
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, body: Vec<u8>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn form_request(uri: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// `name=value` pair of the session cookie, if the response set one.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}
