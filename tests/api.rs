use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::Engine;
use face_landmark_service::{
    detection::{BoundingBox, DetectionResult, Faces, NormalizedLandmark, NO_FACE_DETECTED},
    models::{FaceDetector, MeshModel, ModelManager},
    samples::ImageInfo,
    web::{create_app, AppState},
    Config, Result,
};
use http_body_util::BodyExt;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const MESH_POINTS: usize = 468;

/// Reports one centred face covering half of any image that is not uniform.
struct CentredFace;

impl FaceDetector for CentredFace {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<BoundingBox>> {
        let first = gray.get_pixel(0, 0);
        if gray.pixels().all(|p| p == first) {
            return Ok(Vec::new());
        }
        let (w, h) = gray.dimensions();
        Ok(vec![BoundingBox { x: w / 4, y: h / 4, width: w / 2, height: h / 2 }])
    }
}

/// Dense fake mesh: a grid of points inside the central face region.
struct GridMesh;

impl MeshModel for GridMesh {
    fn detect(&self, rgb: &RgbImage) -> Result<Vec<Vec<NormalizedLandmark>>> {
        let gray = image::imageops::grayscale(rgb);
        if CentredFace.detect(&gray)?.is_empty() {
            return Ok(Vec::new());
        }
        let points = (0..MESH_POINTS)
            .map(|i| NormalizedLandmark {
                x: 0.25 + 0.5 * (i % 26) as f32 / 26.0,
                y: 0.25 + 0.5 * (i / 26) as f32 / 18.0,
            })
            .collect();
        Ok(vec![points])
    }
}

fn config(res_dir: &Path) -> Config {
    Config::new(
        "127.0.0.1:0".into(),
        "models".into(),
        res_dir.display().to_string(),
        false,
    )
    .unwrap()
}

fn app_with(res_dir: &Path, mesh: bool) -> Router {
    app_from(config(res_dir), mesh)
}

fn app_from(config: Config, mesh: bool) -> Router {
    let mesh: Option<Arc<dyn MeshModel>> = if mesh { Some(Arc::new(GridMesh)) } else { None };
    let models = ModelManager::from_parts(Arc::new(CentredFace), mesh);
    create_app(AppState::new(config, models))
}

fn app() -> Router {
    app_with(Path::new("res"), true)
}

/// PNG with a dark square in the middle of a light background.
fn face_png(width: u32, height: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| {
        let inside = x >= width / 4 && x < 3 * width / 4 && y >= height / 4 && y < 3 * height / 4;
        Luma([if inside { 40 } else { 220 }])
    });
    encode(DynamicImage::ImageLuma8(img))
}

fn uniform_png(value: u8) -> Vec<u8> {
    encode(DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([value]))))
}

fn encode(image: DynamicImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn multipart_body(boundary: &str, image: &[u8], content_type: &str, model: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(model) = model {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\n{model}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"face.png\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body)
}

async fn predict_raw(app: Router, uri: &str, image: Vec<u8>) -> DetectionResult {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(image))
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn cascade_returns_one_box_for_one_face() {
    let result = predict_raw(app(), "/predict?model=haar", face_png(120, 80)).await;

    assert_eq!(result.face_count, 1);
    assert!(result.error.is_none());
    match result.faces {
        Faces::Boxes(boxes) => {
            assert_eq!(boxes.len(), 1);
            assert!(boxes[0].width > 0 && boxes[0].height > 0);
            assert_eq!(boxes[0], BoundingBox { x: 30, y: 20, width: 60, height: 40 });
        }
        other => panic!("expected boxes, got {:?}", other),
    }
}

#[tokio::test]
async fn cascade_can_return_five_point_landmarks() {
    let result = predict_raw(app(), "/detect_landmarks?model=haar&output=landmarks", face_png(120, 80)).await;

    assert_eq!(result.face_count, 1);
    match result.faces {
        Faces::Landmarks(faces) => assert_eq!(faces[0].len(), 5),
        other => panic!("expected landmarks, got {:?}", other),
    }
}

#[tokio::test]
async fn uniform_images_report_no_face() {
    for value in [0u8, 255] {
        for model in ["haar", "mediapipe"] {
            let uri = format!("/predict?model={}", model);
            let result = predict_raw(app(), &uri, uniform_png(value)).await;

            assert_eq!(result.face_count, 0);
            assert!(result.faces.is_empty());
            assert_eq!(result.error.as_deref(), Some(NO_FACE_DETECTED));
        }
    }
}

#[tokio::test]
async fn mesh_points_lie_inside_image() {
    let (width, height) = (160, 96);
    let result = predict_raw(app(), "/predict", face_png(width, height)).await;

    assert_eq!(result.face_count, 1);
    let Faces::Landmarks(faces) = result.faces else {
        panic!("mesh must return landmarks");
    };
    assert_eq!(faces[0].len(), MESH_POINTS);
    for point in &faces[0] {
        assert!(point.x >= 0 && point.x < width as i32);
        assert!(point.y >= 0 && point.y < height as i32);
    }
}

#[tokio::test]
async fn multipart_form_selects_backend() {
    let boundary = "XfaceBoundary";
    let body = multipart_body(boundary, &face_png(100, 100), "image/png", Some("haar"));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict?model=mediapipe")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::OK);
    let result: DetectionResult = serde_json::from_slice(&body).unwrap();
    assert!(matches!(result.faces, Faces::Boxes(_)));
}

#[tokio::test]
async fn multipart_part_content_type_is_not_trusted() {
    let boundary = "XfaceBoundary";
    let body = multipart_body(boundary, &face_png(100, 100), "text/plain", Some("haar"));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::OK);
    let result: DetectionResult = serde_json::from_slice(&body).unwrap();
    assert_eq!(result.face_count, 1);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn oversized_body_gets_error_envelope() {
    let mut config = config(Path::new("res"));
    config.server_config.max_request_size = 1024;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict?model=haar")
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(vec![0u8; 4096]))
        .unwrap();

    let (status, body) = send(app_from(config, true), request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "BODY_TOO_LARGE");
}

#[tokio::test]
async fn multipart_without_image_is_rejected() {
    let boundary = "XfaceBoundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\nhaar\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn undecodable_image_is_reported_in_band() {
    let result = predict_raw(app(), "/predict?model=haar", b"\x89PNG\r\n\x1a\nbroken".to_vec()).await;

    assert_eq!(result.face_count, 0);
    assert!(result.faces.is_empty());
    assert!(result.error.is_some());
}

#[tokio::test]
async fn missing_mesh_model_is_reported_in_band() {
    let app = app_with(Path::new("res"), false);
    let result = predict_raw(app, "/predict?model=mediapipe", face_png(64, 64)).await;

    assert_eq!(result.face_count, 0);
    assert!(result.error.unwrap().contains("mesh"));
}

#[tokio::test]
async fn unknown_model_is_a_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict?model=dlib")
        .body(Body::from(face_png(64, 64)))
        .unwrap();

    let (status, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_endpoint_accepts_base64() {
    let encoded = base64::engine::general_purpose::STANDARD.encode(face_png(80, 80));
    let payload = serde_json::json!({ "image": encoded, "model": "haar" });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict/json")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::OK);
    let result: DetectionResult = serde_json::from_slice(&body).unwrap();
    assert_eq!(result.face_count, 1);
}

#[tokio::test]
async fn json_endpoint_validates_body() {
    let payload = serde_json::json!({ "image": "" });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict/json")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let (status, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn response_round_trips_through_json() {
    let result = predict_raw(app(), "/predict", face_png(90, 90)).await;
    let encoded = serde_json::to_string(&result).unwrap();
    let decoded: DetectionResult = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, result);

    let raw: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert!(raw.get("faceCount").is_some());
    assert!(raw.get("faces").is_some());
    assert!(raw.get("error").is_some());
}

#[tokio::test]
async fn concurrent_requests_do_not_interfere() {
    let app = app();
    let sizes: Vec<(u32, u32)> = (0..16).map(|i| (64 + i * 8, 48 + i * 4)).collect();

    let tasks: Vec<_> = sizes
        .iter()
        .map(|&(w, h)| {
            let app = app.clone();
            tokio::spawn(async move {
                let result = predict_raw(app, "/predict?model=haar", face_png(w, h)).await;
                (w, h, result)
            })
        })
        .collect();

    for task in tasks {
        let (w, h, result) = task.await.unwrap();
        assert_eq!(
            result.faces,
            Faces::Boxes(vec![BoundingBox { x: w / 4, y: h / 4, width: w / 2, height: h / 2 }])
        );
    }
}

#[tokio::test]
async fn lists_sample_images() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.png", "b.txt", "C.JPG"] {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }

    let request = Request::builder().uri("/list_images").body(Body::empty()).unwrap();
    let (status, body) = send(app_with(dir.path(), true), request).await;

    assert_eq!(status, StatusCode::OK);
    let images: Vec<ImageInfo> = serde_json::from_slice(&body).unwrap();
    let names: Vec<&str> = images.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["C.JPG", "a.png"]);
    assert_eq!(images[1].url, "/res/a.png");
}

#[tokio::test]
async fn missing_sample_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder().uri("/list_images").body(Body::empty()).unwrap();
    let (status, body) = send(app_with(&dir.path().join("missing"), true), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn serves_sample_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("face.png"), face_png(32, 32)).unwrap();

    let request = Request::builder().uri("/res/face.png").body(Body::empty()).unwrap();
    let (status, body) = send(app_with(dir.path(), true), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, face_png(32, 32));
}

#[tokio::test]
async fn cors_preflight_uses_configured_origin() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/predict")
        .header(header::ORIGIN, "http://localhost:3001")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3001"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
    assert_eq!(headers.get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "1200");
}

#[tokio::test]
async fn dev_mode_preflight_allows_any_origin() {
    let config = Config::new("127.0.0.1:0".into(), "models".into(), "res".into(), true).unwrap();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/predict")
        .header(header::ORIGIN, "http://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app_from(config, true).oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
}

#[tokio::test]
async fn health_reports_loaded_backends() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app_with(Path::new("res"), false), request).await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["models"]["has_cascade"], true);
    assert_eq!(json["models"]["has_mesh"], false);
}
