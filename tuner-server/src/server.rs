use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::{net::SocketAddr, path::Path, sync::Arc};
use thiserror::Error;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tuner_core::{batch, decode, AnalysisConfig, BatchReport, TunerError};

use crate::config::ServerConfig;
use crate::storage::{TempDirStore, UploadStore};

/// Multipart field carrying the recording.
pub const UPLOAD_FIELD: &str = "music";

#[derive(Clone)]
pub struct AppState {
    pub analysis: Arc<AnalysisConfig>,
    pub store: Arc<dyn UploadStore>,
}

/// A request failure and the status it maps to.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Tuner(#[from] TunerError),

    #[error("Malformed upload: {}", .0.body_text())]
    Multipart(#[from] MultipartError),

    #[error("Processing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Not found")]
    NotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Tuner(TunerError::InputMissing) => StatusCode::BAD_REQUEST,
            // Body-limit overruns carry 413, other parse failures 400.
            ApiError::Multipart(e) => e.status(),
            ApiError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// The recording taken from a request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    /// Lowercased extension of the client-side file name, if any.
    pub extension: Option<String>,
}

/// CORS policy for the browser client.
///
/// With a configured origin only that origin is allowed, with credentials.
/// Without one any origin is allowed and credentials are not.
fn cors_layer(cors_origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    Ok(match cors_origin {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin)
                .map_err(|e| anyhow::anyhow!("Invalid cors_origin {origin:?}: {e}"))?;
            layer.allow_origin(AllowOrigin::exact(origin)).allow_credentials(true)
        }
        None => layer.allow_origin(AllowOrigin::any()),
    })
}

pub fn router(state: AppState, cfg: &ServerConfig) -> anyhow::Result<Router> {
    Ok(Router::new()
        .route("/music/generate-tabs", post(generate_tabs))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(cfg.upload_limit_bytes))
        .layer(cors_layer(cfg.cors_origin.as_deref())?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

pub async fn run_server(cfg: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = cfg.listen_addr.parse()?;

    let state = AppState {
        analysis: Arc::new(cfg.analysis.clone()),
        store: Arc::new(TempDirStore::new(cfg.temp_dir())),
    };
    let app = router(state, &cfg)?;

    tracing::info!(%addr, cors_origin = ?cfg.cors_origin, "fretscope HTTP server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

// ═══════════════════════════════════════════════════════════════
// POST /music/generate-tabs
// ═══════════════════════════════════════════════════════════════

async fn generate_tabs(
    State(st): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchReport>, ApiError> {
    // A request that is not multipart at all carries no file.
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!(%rejection, "request body is not multipart");
        TunerError::InputMissing
    })?;
    let upload = read_upload(multipart).await?.ok_or(TunerError::InputMissing)?;
    tracing::info!(bytes = upload.bytes.len(), extension = ?upload.extension, "upload received");

    let report = tokio::task::spawn_blocking(move || {
        process_upload(st.store.as_ref(), &upload, &st.analysis)
    })
    .await??;

    Ok(Json(report))
}

/// Pulls the recording out of the multipart body, ignoring other fields.
///
/// An empty `music` field counts as no file.
async fn read_upload(mut multipart: Multipart) -> Result<Option<Upload>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let extension = field.file_name().and_then(file_extension);
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Upload { bytes: bytes.to_vec(), extension }));
    }
    Ok(None)
}

fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Spools the upload, decodes it and runs batch analysis.
///
/// The spooled file is removed before this returns, on success or failure.
pub fn process_upload(
    store: &dyn UploadStore,
    upload: &Upload,
    config: &AnalysisConfig,
) -> Result<BatchReport, TunerError> {
    let spooled = store.persist(&upload.bytes, upload.extension.as_deref())?;
    let buffer = decode::decode_file(spooled.path())?;
    Ok(batch::analyze(&buffer, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ScopedUpload;
    use std::path::PathBuf;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "fretscope-test-boundary";

    /// A multipart part: field name, optional file name, contents.
    type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

    fn part<'a>(name: &'a str, file_name: Option<&'a str>, data: &'a [u8]) -> Part<'a> {
        (name, file_name, data)
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
        Request::post("/music/generate-tabs")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn test_app(dir: &Path, cfg: ServerConfig) -> Router {
        let state = AppState {
            analysis: Arc::new(cfg.analysis.clone()),
            store: Arc::new(TempDirStore::new(dir)),
        };
        router(state, &cfg).unwrap()
    }

    /// A temp-dir store that remembers every path it hands out.
    struct RecordingStore {
        inner: TempDirStore,
        paths: Mutex<Vec<PathBuf>>,
    }

    impl RecordingStore {
        fn new(dir: &Path) -> Self {
            Self { inner: TempDirStore::new(dir), paths: Mutex::new(Vec::new()) }
        }
    }

    impl UploadStore for RecordingStore {
        fn persist(&self, bytes: &[u8], extension: Option<&str>) -> tuner_core::Result<ScopedUpload> {
            let upload = self.inner.persist(bytes, extension)?;
            self.paths.lock().unwrap().push(upload.path().to_path_buf());
            Ok(upload)
        }
    }

    /// 16-bit mono WAV at 8 kHz.
    fn wav_8k(samples: &[i16]) -> Vec<u8> {
        let sample_rate: u32 = 8000;
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    /// One second of a constant value.
    fn constant_wav(value: i16) -> Vec<u8> {
        wav_8k(&[value; 8000])
    }

    /// One second of a 110 Hz sine at half scale.
    fn open_a_wav() -> Vec<u8> {
        let samples: Vec<i16> = (0..8000)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * 110.0 * i as f32 / 8000.0;
                (phase.sin() * 16000.0) as i16
            })
            .collect();
        wav_8k(&samples)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn silent_upload_yields_nulls_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordingStore::new(dir.path());
        let upload = Upload { bytes: constant_wav(0), extension: Some("wav".into()) };

        let report = process_upload(&store, &upload, &AnalysisConfig::default()).unwrap();
        assert_eq!(report.matched_notes, vec![None; 4]);

        let paths = store.paths.lock().unwrap();
        assert_eq!(paths.len(), 1);
        assert!(!paths[0].exists());
    }

    #[test]
    fn undecodable_upload_fails_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordingStore::new(dir.path());
        let upload = Upload { bytes: b"not audio at all".to_vec(), extension: Some("mp3".into()) };

        let err = process_upload(&store, &upload, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, TunerError::Decode(_) | TunerError::UnsupportedFormat(_)));

        let paths = store.paths.lock().unwrap();
        assert_eq!(paths.len(), 1);
        assert!(!paths[0].exists());
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("riff.MP3"), Some("mp3".to_string()));
        assert_eq!(file_extension("noext"), None);
    }

    #[tokio::test]
    async fn missing_file_is_a_400() {
        let response = ApiError::from(TunerError::InputMissing).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "No file uploaded" }));
    }

    #[tokio::test]
    async fn decode_failure_is_a_500() {
        let response = ApiError::from(TunerError::Decode("bad frame".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("bad frame"));
    }

    #[tokio::test]
    async fn empty_post_is_a_400_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), ServerConfig::default());
        let request = Request::post("/music/generate-tabs").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "No file uploaded" }));
    }

    #[tokio::test]
    async fn json_post_is_a_400_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), ServerConfig::default());
        let request = Request::post("/music/generate-tabs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"music": "abc"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "No file uploaded" }));
    }

    #[tokio::test]
    async fn multipart_without_music_field_is_a_400_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), ServerConfig::default());
        let wav = constant_wav(0);
        let request = upload_request(&[part("recording", Some("take.wav"), &wav)]);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "No file uploaded" }));
    }

    #[tokio::test]
    async fn empty_music_field_is_a_400_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), ServerConfig::default());
        let request = upload_request(&[part("music", Some("take.wav"), b"")]);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "No file uploaded" }));
    }

    #[tokio::test]
    async fn upload_is_labelled_per_window() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), ServerConfig::default());
        let wav = open_a_wav();
        let request = upload_request(&[part("title", None, b"warm-up"), part("music", Some("Take.WAV"), &wav)]);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "matchedNotes": ["A0", "A0", "A0", "A0"] }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn silent_upload_is_all_null() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), ServerConfig::default());
        let wav = constant_wav(0);

        let response = app.oneshot(upload_request(&[part("music", Some("quiet.wav"), &wav)])).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "matchedNotes": [null, null, null, null] }));
    }

    #[tokio::test]
    async fn undecodable_upload_is_a_500_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), ServerConfig::default());

        let response = app
            .oneshot(upload_request(&[part("music", Some("song.mp3"), b"not audio at all")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"].is_string());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn oversize_upload_is_a_413() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ServerConfig { upload_limit_bytes: 1024, ..ServerConfig::default() };
        let app = test_app(dir.path(), cfg);
        let wav = constant_wav(0);

        let response = app.oneshot(upload_request(&[part("music", Some("big.wav"), &wav)])).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_is_a_404_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), ServerConfig::default());
        let request = Request::get("/music/tabs").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "error": "Not found" }));
    }

    #[tokio::test]
    async fn configured_origin_is_allowed_with_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ServerConfig { cors_origin: Some("http://localhost:3000".into()), ..ServerConfig::default() };
        let app = test_app(dir.path(), cfg);
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/music/generate-tabs")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn other_origins_get_no_cors_header() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ServerConfig { cors_origin: Some("http://localhost:3000".into()), ..ServerConfig::default() };
        let app = test_app(dir.path(), cfg);
        let request = Request::post("/music/generate-tabs")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn invalid_origin_is_rejected() {
        assert!(cors_layer(Some("bad\norigin")).is_err());
        assert!(cors_layer(None).is_ok());
    }
}
