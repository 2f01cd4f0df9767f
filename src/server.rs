//! Upload page: one form, one prediction at a time, chart rendered inline.

use crate::{
    backend::{Backend, CycleError, predict_and_render},
    chart::SvgRenderer,
    error::PredictError,
    local::Classifier,
    xray::XrayImage,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
};
use base64::Engine;
use serde_json::json;
use std::sync::{Arc, Mutex};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const PAGE_TITLE: &str = "Respiratory disease detection";

/// Whether the page is currently working on an upload.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    Idle,
    Processing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Processing => "processing",
        }
    }
}

/// Shared state behind the upload page.
pub struct AppState<M> {
    backend: Backend<M>,
    state: Arc<Mutex<SessionState>>,
}

impl<M> AppState<M> {
    pub fn new(backend: Backend<M>) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Marks the session as processing until dropped.
struct Processing {
    state: Arc<Mutex<SessionState>>,
}

impl Processing {
    fn begin(state: &Arc<Mutex<SessionState>>) -> Option<Self> {
        let mut current = state.lock().unwrap_or_else(|e| e.into_inner());
        if *current != SessionState::Idle {
            return None;
        }
        *current = SessionState::Processing;
        Some(Self {
            state: state.clone(),
        })
    }
}

impl Drop for Processing {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = SessionState::Idle;
    }
}

/// Builds the page routes: `GET /` for the form, `GET /status` for the
/// session state and `POST /predict` for a multipart upload in field `file`.
pub fn router<M>(app: Arc<AppState<M>>) -> Router
where
    M: Classifier,
{
    Router::new()
        .route("/", get(index))
        .route("/status", get(status::<M>))
        .route("/predict", post(post_predict::<M>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(app)
}

/// Binds `addr` and serves [`router`] until the process is stopped.
pub async fn serve<M>(addr: &str, app: Arc<AppState<M>>) -> std::io::Result<()>
where
    M: Classifier,
{
    log::info!("Starting the server with the {} backend", app.backend.name());
    log::info!("Listening on: {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(app)).await
}

async fn index() -> Html<String> {
    Html(page(UPLOAD_FORM))
}

async fn status<M>(State(app): State<Arc<AppState<M>>>) -> Json<serde_json::Value>
where
    M: Classifier,
{
    Json(json!({ "status": app.state().as_str(), "backend": app.backend.name() }))
}

async fn post_predict<M>(
    State(app): State<Arc<AppState<M>>>,
    multipart: Multipart,
) -> (StatusCode, Html<String>)
where
    M: Classifier,
{
    let Some(_processing) = Processing::begin(&app.state) else {
        log::warn!("Rejected upload while a prediction is in flight");
        return (
            StatusCode::CONFLICT,
            Html(page(&banner("error", "Still processing the previous image"))),
        );
    };

    let bytes = match read_upload(multipart).await {
        Ok(bytes) => bytes,
        Err(message) => return (StatusCode::BAD_REQUEST, Html(page(&banner("error", &message)))),
    };

    let image = match XrayImage::from_bytes(&bytes) {
        Ok(image) => image,
        Err(e) => {
            let message = PredictError::from(e).user_message();
            return (StatusCode::BAD_REQUEST, Html(page(&banner("error", &message))));
        }
    };

    match predict_and_render(&app.backend, &image, &mut SvgRenderer::new()).await {
        Ok(cycle) => {
            let body = format!(
                "{}{}\n{}\n<div class=\"chart\">{}</div>",
                banner("success", "Prediction completed"),
                UPLOAD_FORM,
                preview(&image, &bytes),
                cycle.rendered
            );
            (StatusCode::OK, Html(page(&body)))
        }
        Err(e) => {
            log::error!("Prediction cycle failed: {e}");
            let code = match &e {
                CycleError::Predict(
                    PredictError::Status(_)
                    | PredictError::Transport(_)
                    | PredictError::MalformedResponse(_),
                ) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let body = format!(
                "{}{}\n{}",
                banner("error", &e.user_message()),
                UPLOAD_FORM,
                preview(&image, &bytes)
            );
            (code, Html(page(&body)))
        }
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Invalid upload: {e}"))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| format!("Invalid upload: {e}"))?;
            return Ok(bytes.to_vec());
        }
    }
    Err("No file uploaded".to_string())
}

const UPLOAD_FORM: &str = r#"<form action="/predict" method="post" enctype="multipart/form-data">
  <label>Choose a chest X-ray image showing the lung region</label>
  <input type="file" name="file" accept=".jpg,.jpeg,.png" required>
  <button type="submit">Predict</button>
</form>"#;

/// Inlines the uploaded bytes as a data URI so the page shows what was sent.
fn preview(image: &XrayImage, bytes: &[u8]) -> String {
    format!(
        "<div class=\"preview\"><img alt=\"Uploaded X-ray\" src=\"data:{};base64,{}\"></div>",
        image.format.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn banner(kind: &str, message: &str) -> String {
    format!(
        "<div class=\"banner {kind}\">{}</div>\n",
        escape_html(message)
    )
}

fn page(body: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{PAGE_TITLE}</title>\n\
         <style>.banner{{padding:8px;animation:fade 2s 2s forwards}}\
         .success{{background:#d4edda}}.error{{background:#f8d7da}}\
         @keyframes fade{{to{{opacity:0}}}}</style></head>\n\
         <body><h1>{PAGE_TITLE}</h1>\n{body}\n</body></html>\n"
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banners_escape_messages() {
        assert_eq!(
            banner("error", "API error: <500>"),
            "<div class=\"banner error\">API error: &lt;500&gt;</div>\n"
        );
    }

    #[test]
    fn preview_embeds_upload_bytes() {
        let image = XrayImage {
            format: crate::xray::XrayFormat::Jpeg,
            image: image::DynamicImage::new_rgb8(1, 1),
        };
        assert_eq!(
            preview(&image, b"xray"),
            "<div class=\"preview\"><img alt=\"Uploaded X-ray\" src=\"data:image/jpeg;base64,eHJheQ==\"></div>"
        );
    }

    #[test]
    fn only_one_prediction_in_flight() {
        let state = Arc::new(Mutex::new(SessionState::Idle));
        let first = Processing::begin(&state).unwrap();
        assert_eq!(*state.lock().unwrap(), SessionState::Processing);
        assert!(Processing::begin(&state).is_none());
        drop(first);
        assert_eq!(*state.lock().unwrap(), SessionState::Idle);
        assert!(Processing::begin(&state).is_some());
    }
}
