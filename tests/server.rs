use axum::{Router, http::StatusCode, routing::post};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pneumo::{
    Backend, Classification, Classifier, LocalPredictor, ModelArtifact, RemoteClient, server,
    local::ClassScore,
};
use reqwest::multipart::{Form, Part};
use std::{
    io::Cursor,
    sync::Arc,
    time::{Duration, Instant},
};

#[cfg(feature = "onnx")]
type AnyModel = pneumo::local::onnx::OnnxClassifier;
#[cfg(not(feature = "onnx"))]
type AnyModel = pneumo::local::UnavailableClassifier;

async fn bind(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Remote API stub that always answers with `status` and a fixed prediction.
async fn spawn_api(status: StatusCode) -> String {
    let app = Router::new().route(
        "/predict",
        post(move || async move {
            (
                status,
                [("content-type", "application/json")],
                r#"{"prediction": {"Tuberculosis": 5.0, "Pneumonia": 64.25}}"#,
            )
        }),
    );
    bind(app).await
}

async fn spawn_page(api_status: StatusCode) -> String {
    let api = spawn_api(api_status).await;
    let backend: Backend<AnyModel> = Backend::Remote(RemoteClient::new(api, None).unwrap());
    bind(server::router(Arc::new(server::AppState::new(backend)))).await
}

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(20, 20, Rgb([120, 120, 120]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

async fn upload(page: &str, field: &str, bytes: Vec<u8>) -> (StatusCode, String) {
    let part = Part::bytes(bytes)
        .file_name("scan.png")
        .mime_str("image/png")
        .unwrap();
    let response = reqwest::Client::new()
        .post(format!("{page}/predict"))
        .multipart(Form::new().part(field.to_string(), part))
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn index_serves_upload_form() {
    let page = spawn_page(StatusCode::OK).await;
    let body = reqwest::get(format!("{page}/")).await.unwrap().text().await.unwrap();
    assert!(body.contains("Respiratory disease detection"));
    assert!(body.contains(r#"name="file""#));
}

#[tokio::test]
async fn status_reports_idle() {
    let page = spawn_page(StatusCode::OK).await;
    let status: serde_json::Value = reqwest::get(format!("{page}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "idle");
    assert_eq!(status["backend"], "remote");
}

#[tokio::test]
async fn upload_renders_chart_in_prediction_order() {
    let page = spawn_page(StatusCode::OK).await;
    let (status, body) = upload(&page, "file", png_bytes()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Prediction completed"));
    assert!(body.contains("<svg"));
    assert!(body.contains(r#"<img alt="Uploaded X-ray" src="data:image/png;base64,"#));
    let tb = body.find("5.00%").unwrap();
    let pn = body.find("64.25%").unwrap();
    assert!(tb < pn);
}

#[tokio::test]
async fn api_failure_shows_status_banner() {
    let page = spawn_page(StatusCode::SERVICE_UNAVAILABLE).await;
    let (status, body) = upload(&page, "file", png_bytes()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("API error: 503"));
    assert!(!body.contains("<svg"));
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let page = spawn_page(StatusCode::OK).await;
    let (status, body) = upload(&page, "image", png_bytes()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No file uploaded"));
}

#[tokio::test]
async fn undecodable_upload_is_rejected() {
    let page = spawn_page(StatusCode::OK).await;
    let (status, body) = upload(&page, "file", b"not an image".to_vec()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Error making prediction"));
}

const SLOW_INFERENCE: Duration = Duration::from_millis(1500);

/// Local model that takes a while to answer.
struct SlowModel;

#[derive(Debug, thiserror::Error)]
#[error("slow model")]
struct SlowModelError;

impl Classifier for SlowModel {
    type Error = SlowModelError;

    fn load(_artifact: &ModelArtifact) -> Result<Self, Self::Error> {
        Ok(SlowModel)
    }

    fn classify(&self, _image: &DynamicImage) -> Result<Classification, Self::Error> {
        std::thread::sleep(SLOW_INFERENCE);
        Ok(Classification {
            classes: vec![ClassScore {
                label: "Normal".into(),
                confidence: 0.9,
            }],
        })
    }
}

#[tokio::test]
async fn status_answers_while_local_inference_runs() {
    let backend = Backend::local(LocalPredictor::<SlowModel>::new(ModelArtifact::new("unused")));
    let page = bind(server::router(Arc::new(server::AppState::new(backend)))).await;

    let uploading = tokio::spawn({
        let page = page.clone();
        async move { upload(&page, "file", png_bytes()).await }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let asked = Instant::now();
    let status: serde_json::Value = reqwest::get(format!("{page}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "processing");
    assert!(asked.elapsed() < SLOW_INFERENCE / 2);

    let (code, body) = uploading.await.unwrap();
    assert_eq!(code, StatusCode::OK);
    assert!(body.contains("90.00%"));
}
