//! The single-page form: upload, predict, ask.
//!
//! Every handler loads the [`LeafSession`], runs one controller operation,
//! saves the session when the operation changed it and re-renders the page.

use super::{read_leaf_field, upload_error_message};
use crate::session::controller::MAX_QUESTION_CHARS;
use crate::session::{
    ConversationTurn, ControllerError, LeafSession, Prediction, SessionController,
};
use crate::startup::AppState;
use askama::Template;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub preview: Option<String>,
    pub file_name: Option<String>,
    pub can_predict: bool,
    pub prediction: Option<Prediction>,
    pub turn: Option<ConversationTurn>,
    pub error: Option<String>,
    pub max_question_chars: u64,
}

impl IndexTemplate {
    pub fn for_session(controller: &SessionController, session: &LeafSession) -> Self {
        let image = session.image();

        Self {
            preview: image.map(|i| i.preview_data_url.clone()),
            file_name: image.and_then(|i| i.file_name.clone()),
            can_predict: image.is_some(),
            prediction: controller.current_prediction(session),
            turn: None,
            error: None,
            max_question_chars: MAX_QUESTION_CHARS,
        }
    }

    fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    fn with_turn(mut self, turn: ConversationTurn) -> Self {
        self.turn = Some(turn);
        self
    }

    fn respond(self, status: StatusCode) -> Response {
        (status, self).into_response()
    }
}

fn error_page(
    controller: &SessionController,
    session: &LeafSession,
    err: ControllerError,
) -> Response {
    if err.status_code().is_server_error() {
        tracing::error!(error = %err, "Leaf page request failed");
    }

    IndexTemplate::for_session(controller, session)
        .with_error(err.user_message())
        .respond(err.status_code())
}

async fn load(state: &AppState, session: &Session) -> Result<LeafSession, Response> {
    LeafSession::load(session)
        .await
        .map_err(|e| error_page(&state.controller, &LeafSession::default(), e))
}

pub async fn index(State(state): State<AppState>, session: Session) -> Response {
    let leaf = match load(&state, &session).await {
        Ok(leaf) => leaf,
        Err(page) => return page,
    };

    IndexTemplate::for_session(&state.controller, &leaf).respond(StatusCode::OK)
}

pub async fn upload(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Response {
    let controller = &state.controller;
    let mut leaf = match load(&state, &session).await {
        Ok(leaf) => leaf,
        Err(page) => return page,
    };

    let file = match read_leaf_field(multipart).await {
        Ok(file) => file,
        Err(e) => {
            return IndexTemplate::for_session(controller, &leaf)
                .with_error(upload_error_message(&e))
                .respond(e.status_code());
        }
    };

    let result = controller
        .upload(&mut leaf, file.bytes, file.file_name, file.content_type)
        .await;

    if let Err(e) = result {
        return error_page(controller, &leaf, e);
    }
    if let Err(e) = leaf.save(&session).await {
        return error_page(controller, &leaf, e);
    }

    IndexTemplate::for_session(controller, &leaf).respond(StatusCode::OK)
}

pub async fn predict(State(state): State<AppState>, session: Session) -> Response {
    let controller = &state.controller;
    let mut leaf = match load(&state, &session).await {
        Ok(leaf) => leaf,
        Err(page) => return page,
    };

    if let Err(e) = controller.predict(&mut leaf).await {
        return error_page(controller, &leaf, e);
    }
    if let Err(e) = leaf.save(&session).await {
        return error_page(controller, &leaf, e);
    }

    IndexTemplate::for_session(controller, &leaf).respond(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct AskForm {
    #[serde(default)]
    pub question: String,
}

pub async fn ask(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AskForm>,
) -> Response {
    let controller = &state.controller;
    let leaf = match load(&state, &session).await {
        Ok(leaf) => leaf,
        Err(page) => return page,
    };

    match controller.ask(&leaf, &form.question).await {
        Ok(turn) => IndexTemplate::for_session(controller, &leaf)
            .with_turn(turn)
            .respond(StatusCode::OK),
        Err(e) => error_page(controller, &leaf, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;
    use crate::services::Answer;

    fn page() -> IndexTemplate {
        IndexTemplate {
            preview: None,
            file_name: None,
            can_predict: false,
            prediction: None,
            turn: None,
            error: None,
            max_question_chars: MAX_QUESTION_CHARS,
        }
    }

    #[test]
    fn idle_page_has_upload_form_only() {
        let html = page().render().unwrap();
        assert!(html.contains(r#"name="leaf""#));
        assert!(!html.contains(r#"action="/predict""#));
        assert!(!html.contains(r#"name="question""#));
    }

    #[test]
    fn classified_page_shows_label_benefits_and_chat() {
        let mut view = page();
        view.can_predict = true;
        view.preview = Some("data:image/png;base64,AAAA".into());
        view.prediction = Some(Prediction {
            label: Label::from("Mentha (Mint)"),
            benefits: "Aids digestion, relieves headaches.".into(),
        });

        let html = view.render().unwrap();
        assert!(html.contains("Mentha (Mint)"));
        assert!(html.contains("Aids digestion, relieves headaches."));
        assert!(html.contains(r#"src="data:image/png;base64,AAAA""#));
        assert!(html.contains(r#"name="question""#));
    }

    #[test]
    fn answer_markup_is_kept_and_question_is_escaped() {
        let mut view = page();
        view.prediction = Some(Prediction {
            label: Label::from("Mentha (Mint)"),
            benefits: "x".into(),
        });
        view.turn = Some(ConversationTurn {
            question: "<i>dose</i>?".into(),
            answer: Answer::Text {
                text: "<ul><li>Two leaves</li></ul>".into(),
            },
        });

        let html = view.render().unwrap();
        assert!(html.contains("<ul><li>Two leaves</li></ul>"));
        assert!(html.contains("&lt;i&gt;dose"));
        assert!(!html.contains("<i>dose"));
    }

    #[test]
    fn error_banner_is_rendered() {
        let html = page().with_error("Upload a leaf image").render().unwrap();
        assert!(html.contains(r#"class="error""#));
        assert!(html.contains("Upload a leaf image"));
    }
}
